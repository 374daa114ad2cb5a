//! Garbled DFA construction
//!
//! The builder validates the DFA, draws a fresh master secret and PER, and
//! hands out rows lazily. Nothing per cell is stored: every row (and every
//! 1-of-256 entry the server serves) is recomputed from the key schedule.

use std::sync::Arc;

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use subtle::{Choice, ConditionallySelectable};
use tracing::{debug, info};

use crate::cell::{seal, CellPlain};
use crate::dfa::Dfa;
use crate::error::{GdfaError, Result};
use crate::keys::KeySchedule;
use crate::package::{GdfaPackage, PackageHeader};
use crate::params::{Sparsity, CELL_LEN};
use crate::permutation::Permutation;
use crate::table::ServerTable;

/// Everything needed to regenerate rows and entries of one build
#[derive(Debug)]
pub(crate) struct Garbler {
    pub(crate) dfa: Dfa,
    pub(crate) keys: KeySchedule,
    pub(crate) perm: Permutation,
    pub(crate) sparsity: Sparsity,
}

impl Garbler {
    pub(crate) fn row_count(&self) -> u32 {
        self.perm.len() as u32
    }

    /// Real state behind `label`
    pub(crate) fn state_of(&self, label: u32) -> Result<u32> {
        self.perm
            .state_of(label)
            .ok_or_else(|| GdfaError::LabelOutOfRange {
                label,
                rows: self.row_count(),
            })
    }

    /// Plaintext of the cell for group `group` of `state`
    fn cell_plain(&self, state: u32, group: usize) -> CellPlain {
        let target = self.dfa.states[state as usize].groups[group].target;
        let attack_id = self.dfa.attack_id(target);
        CellPlain {
            // Targets were range-checked when the builder was created
            next_label: self.perm.label_of(target).unwrap_or_default(),
            terminal: attack_id != 0,
            attack_id,
        }
    }

    /// Write the encrypted row for `label` into `out` (`row_len` bytes).
    ///
    /// Each column computes both its real cell (from the group mapped there,
    /// or group 0) and a decoy, then selects without branching.
    pub(crate) fn fill_row(&self, label: u32, out: &mut [u8]) -> Result<()> {
        let row_len = self.sparsity.row_len();
        if out.len() != row_len {
            return Err(GdfaError::RowLengthMismatch {
                expected: row_len,
                got: out.len(),
            });
        }

        let state = self.state_of(label)?;
        let groups = &self
            .dfa
            .states
            .get(state as usize)
            .ok_or(GdfaError::StateOutOfRange {
                state,
                len: self.dfa.num_states(),
            })?
            .groups;
        let columns = self
            .keys
            .column_order(state, groups.len(), self.sparsity.outmax);

        let mut owner = vec![None; self.sparsity.outmax as usize];
        for (group, &col) in columns.iter().enumerate() {
            owner[col as usize] = Some(group);
        }

        for (col, chunk) in out.chunks_exact_mut(CELL_LEN).enumerate() {
            let col = col as u16;
            let group = owner[col as usize].unwrap_or(0);
            let is_real = Choice::from(owner[col as usize].is_some() as u8);

            let key = self.keys.cell_key(state, group as u16);
            let real = seal(&key, label, col, &self.cell_plain(state, group));
            let decoy = self.keys.decoy_cell(label, col);

            for (i, byte) in chunk.iter_mut().enumerate() {
                *byte = u8::conditional_select(&decoy[i], &real[i], is_real);
            }
        }
        Ok(())
    }

    pub(crate) fn row(&self, label: u32) -> Result<Vec<u8>> {
        let mut row = vec![0u8; self.sparsity.row_len()];
        self.fill_row(label, &mut row)?;
        Ok(row)
    }
}

/// Builds a garbled DFA from a validated DFA
pub struct GdfaBuilder {
    garbler: Garbler,
}

impl GdfaBuilder {
    /// Validate `dfa` against `sparsity` and draw fresh secrets from `rng`
    pub fn new<R: RngCore + CryptoRng>(dfa: Dfa, sparsity: Sparsity, rng: &mut R) -> Result<Self> {
        dfa.validate(&sparsity)?;

        let mut master = [0u8; 32];
        rng.fill_bytes(&mut master);
        let perm = Permutation::random(dfa.num_states(), rng);

        Ok(Self {
            garbler: Garbler {
                dfa,
                keys: KeySchedule::new(master),
                perm,
                sparsity,
            },
        })
    }

    /// Deterministic build for tests and reproducible deployments
    pub fn with_seed(dfa: Dfa, sparsity: Sparsity, seed: u64) -> Result<Self> {
        Self::new(dfa, sparsity, &mut ChaCha20Rng::seed_from_u64(seed))
    }

    /// Label of the start state
    pub fn start_label(&self) -> u32 {
        self.garbler
            .perm
            .label_of(self.garbler.dfa.start)
            .unwrap_or_default()
    }

    pub fn build(self) -> BuiltGdfa {
        let start_label = self.start_label();
        let garbler = Arc::new(self.garbler);
        let header = PackageHeader::new(garbler.sparsity, start_label, garbler.row_count());

        info!(
            states = garbler.row_count(),
            outmax = garbler.sparsity.outmax,
            cmax = garbler.sparsity.cmax,
            "garbled DFA ready"
        );

        BuiltGdfa {
            header,
            rows: RowStream {
                garbler: Arc::clone(&garbler),
                next: 0,
            },
            table: ServerTable::new(garbler),
        }
    }
}

/// Output of one build: the public header, the rows to publish and the
/// server-side table answering byte queries.
pub struct BuiltGdfa {
    pub header: PackageHeader,
    pub rows: RowStream,
    pub table: ServerTable,
}

impl BuiltGdfa {
    /// Materialize the package, building rows in parallel
    pub fn into_package(self) -> Result<(GdfaPackage, ServerTable)> {
        let rows = self.rows.collect_parallel()?;
        let package = GdfaPackage::from_rows(self.header, rows)?;
        Ok((package, self.table))
    }
}

/// Rows in label order, computed one at a time.
///
/// The stream ends after the first error.
pub struct RowStream {
    garbler: Arc<Garbler>,
    next: u32,
}

impl RowStream {
    /// Compute every remaining row on the rayon pool, in label order
    pub fn collect_parallel(self) -> Result<Vec<Vec<u8>>> {
        let garbler = self.garbler;
        let rows = (self.next..garbler.row_count())
            .into_par_iter()
            .map(|label| garbler.row(label))
            .collect::<Result<Vec<_>>>()?;
        debug!(rows = rows.len(), "rows built in parallel");
        Ok(rows)
    }
}

impl Iterator for RowStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.garbler.row_count() {
            return None;
        }
        let row = self.garbler.row(self.next);
        self.next = if row.is_ok() {
            self.next + 1
        } else {
            self.garbler.row_count()
        };
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.garbler.row_count() - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for RowStream {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::open;
    use crate::dfa::tests::{substring_dfa, three_state_dfa};
    use pretty_assertions::assert_eq;

    fn sparsity(outmax: u16, cmax: u16) -> Sparsity {
        Sparsity::new(outmax, cmax).unwrap()
    }

    #[test]
    fn test_rejects_oversized_dfa() {
        let result = GdfaBuilder::with_seed(substring_dfa(), sparsity(2, 2), 1);
        assert!(matches!(result, Err(GdfaError::TooManyGroups { .. })));
    }

    #[test]
    fn test_stream_matches_parallel() {
        let built = GdfaBuilder::with_seed(substring_dfa(), sparsity(4, 1), 11)
            .unwrap()
            .build();
        let streamed = built.rows.collect::<Result<Vec<_>>>().unwrap();

        let built = GdfaBuilder::with_seed(substring_dfa(), sparsity(4, 1), 11)
            .unwrap()
            .build();
        let parallel = built.rows.collect_parallel().unwrap();

        assert_eq!(streamed.len(), 4);
        assert_eq!(streamed, parallel);
    }

    #[test]
    fn test_stream_is_exact_and_finite() {
        let mut rows = GdfaBuilder::with_seed(three_state_dfa(), sparsity(2, 2), 3)
            .unwrap()
            .build()
            .rows;
        assert_eq!(rows.len(), 3);
        rows.next();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.by_ref().count(), 2);
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_stream_reports_garbling_error() {
        let builder = GdfaBuilder::with_seed(three_state_dfa(), sparsity(2, 1), 4).unwrap();
        let mut garbler = builder.garbler;
        // One label more than the DFA has states
        garbler.perm = Permutation::random(4, &mut ChaCha20Rng::seed_from_u64(4));
        let missing = garbler.perm.label_of(3).unwrap();

        let mut rows = RowStream {
            garbler: Arc::new(garbler),
            next: 0,
        };
        for _ in 0..missing {
            assert!(rows.next().unwrap().is_ok());
        }
        assert!(matches!(
            rows.next(),
            Some(Err(GdfaError::StateOutOfRange { state: 3, len: 3 }))
        ));
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_rows_have_fixed_width() {
        for (dfa, outmax) in [(three_state_dfa(), 4u16), (substring_dfa(), 4)] {
            let built = GdfaBuilder::with_seed(dfa, sparsity(outmax, 1), 2)
                .unwrap()
                .build();
            assert!(built
                .rows
                .into_iter()
                .all(|row| row.unwrap().len() == 4 * CELL_LEN));
        }
    }

    #[test]
    fn test_real_cells_decrypt() {
        let builder = GdfaBuilder::with_seed(three_state_dfa(), sparsity(3, 1), 8).unwrap();
        let start = builder.start_label();
        let garbler = &builder.garbler;
        let row = garbler.row(start).unwrap();

        let state = garbler.state_of(start).unwrap();
        assert_eq!(state, 0);
        let columns = garbler.keys.column_order(state, 2, 3);

        // Group 0 is 'A' -> attack state, group 1 is the sink
        let key = garbler.keys.cell_key(state, 0);
        let col = columns[0];
        let cell = open(&key, start, col, &row[col as usize * CELL_LEN..][..CELL_LEN]).unwrap();
        assert!(cell.terminal);
        assert_eq!(cell.attack_id, 7);
        assert_eq!(cell.next_label, garbler.perm.label_of(1).unwrap());

        // The unused column holds a decoy no real key opens
        let unused = (0..3u16).find(|c| !columns.contains(c)).unwrap();
        let decoy = &row[unused as usize * CELL_LEN..][..CELL_LEN];
        for group in 0..2 {
            let key = garbler.keys.cell_key(state, group);
            assert!(open(&key, start, unused, decoy).is_none());
        }
    }

    #[test]
    fn test_seeds_change_secrets() {
        let a = GdfaBuilder::with_seed(substring_dfa(), sparsity(3, 1), 1).unwrap();
        let b = GdfaBuilder::with_seed(substring_dfa(), sparsity(3, 1), 1).unwrap();
        let c = GdfaBuilder::with_seed(substring_dfa(), sparsity(3, 1), 2).unwrap();

        assert_eq!(a.garbler.row(0).unwrap(), b.garbler.row(0).unwrap());
        assert_ne!(a.garbler.row(0).unwrap(), c.garbler.row(0).unwrap());
    }
}

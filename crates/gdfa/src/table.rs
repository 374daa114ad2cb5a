//! Server-side slot table
//!
//! The 1-of-256 entry for byte `x` of a row carries `cmax` token slots.
//! The groups of the row's state that contain `x` fill the first positions
//! of a per-(state, byte) shuffle; the other positions carry decoy tokens.

use std::sync::Arc;

use subtle::ConstantTimeLess;

use oblivids_ot::{OtError, SlotTable, SLOTS};

use crate::builder::Garbler;
use crate::cell::TokenSlot;
use crate::error::Result;
use crate::params::TOKEN_SLOT_LEN;

/// Answers byte queries for one build; cheap to clone and share
#[derive(Debug, Clone)]
pub struct ServerTable {
    garbler: Arc<Garbler>,
}

impl ServerTable {
    pub(crate) fn new(garbler: Arc<Garbler>) -> Self {
        Self { garbler }
    }

    /// Entry for byte `x` of row `label`, as the client decodes it from OT.
    ///
    /// Used for local evaluation without the OT exchange.
    pub fn token(&self, label: u32, x: u8) -> Result<Vec<u8>> {
        let state = self.garbler.state_of(label)?;
        let real = self.real_slots(state);
        let mut entry = vec![0u8; self.garbler.sparsity.entry_len()];
        self.fill_entry(label, state, &real, x, &mut entry);
        Ok(entry)
    }

    /// Column and key of every group of `state`, in group order
    fn real_slots(&self, state: u32) -> Vec<TokenSlot> {
        let g = &self.garbler;
        let groups = g.dfa.states[state as usize].groups.len();
        let columns = g.keys.column_order(state, groups, g.sparsity.outmax);

        columns
            .iter()
            .enumerate()
            .map(|(group, &column)| TokenSlot {
                column,
                key: g.keys.cell_key(state, group as u16),
            })
            .collect()
    }

    fn fill_entry(&self, label: u32, state: u32, real: &[TokenSlot], x: u8, out: &mut [u8]) {
        let g = &self.garbler;
        let cmax = g.sparsity.cmax;
        let members: Vec<usize> = g.dfa.states[state as usize].groups_of(x).collect();
        let k = members.len().max(1);
        let order = g.keys.token_order(state, x, cmax);

        for (i, &position) in order.iter().enumerate() {
            let member = members.get(i.min(k - 1)).copied().unwrap_or(0);
            let (column, key) = g.keys.decoy_token(label, x, i as u16, g.sparsity.outmax);
            let decoy = TokenSlot { column, key };

            let is_real = (i as u32).ct_lt(&(members.len() as u32));
            let slot = TokenSlot::select(&decoy, &real[member], is_real);

            let start = position as usize * TOKEN_SLOT_LEN;
            slot.encode_into(&mut out[start..start + TOKEN_SLOT_LEN]);
        }
    }
}

impl SlotTable for ServerTable {
    fn entry_len(&self) -> usize {
        self.garbler.sparsity.entry_len()
    }

    fn row_count(&self) -> u32 {
        self.garbler.row_count()
    }

    fn fill_row(&self, label: u32, out: &mut [u8]) -> oblivids_ot::Result<()> {
        let state = self
            .garbler
            .state_of(label)
            .map_err(|_| OtError::InvalidIndex {
                index: label,
                max: self.row_count(),
            })?;
        let entry_len = self.entry_len();
        if out.len() != SLOTS * entry_len {
            return Err(OtError::InvalidInput(format!(
                "row buffer of {} bytes, expected {}",
                out.len(),
                SLOTS * entry_len
            )));
        }

        let real = self.real_slots(state);
        for (x, entry) in out.chunks_exact_mut(entry_len).enumerate() {
            self.fill_entry(label, state, &real, x as u8, entry);
        }
        Ok(())
    }
}

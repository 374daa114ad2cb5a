//! Sparsity parameters and fixed sizes of the garbled table

use crate::error::{GdfaError, Result};

/// Bytes of one garbled cell
pub const CELL_LEN: usize = 32;

/// Bytes of one cell key
pub const KEY_LEN: usize = 16;

/// Bytes of one token slot: column index (u16 LE) followed by a cell key
pub const TOKEN_SLOT_LEN: usize = 2 + KEY_LEN;

/// Package format version
pub const GDFA_VERSION: u16 = 1;

/// Largest value either sparsity bound may take
pub const MAX_SPARSITY: u16 = 256;

/// Most rows (DFA states) a package may carry
pub const MAX_ROWS: u32 = 1 << 20;

/// Sparsity bounds of a garbled DFA.
///
/// `outmax` is the number of cells in every row (character groups per state),
/// `cmax` the number of key slots the 1-of-256 entry of each byte carries
/// (groups a single byte may belong to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sparsity {
    pub outmax: u16,
    pub cmax: u16,
}

impl Sparsity {
    pub fn new(outmax: u16, cmax: u16) -> Result<Self> {
        let sparsity = Self { outmax, cmax };
        sparsity.validate()?;
        Ok(sparsity)
    }

    /// Check both bounds are in `1..=256`
    pub fn validate(&self) -> Result<()> {
        if self.outmax == 0 || self.outmax > MAX_SPARSITY {
            return Err(GdfaError::InvalidSparsity(format!(
                "outmax {} outside 1..={}",
                self.outmax, MAX_SPARSITY
            )));
        }
        if self.cmax == 0 || self.cmax > MAX_SPARSITY {
            return Err(GdfaError::InvalidSparsity(format!(
                "cmax {} outside 1..={}",
                self.cmax, MAX_SPARSITY
            )));
        }
        Ok(())
    }

    /// Bytes of one package row
    pub fn row_len(&self) -> usize {
        self.outmax as usize * CELL_LEN
    }

    /// Bytes of one 1-of-256 entry
    pub fn entry_len(&self) -> usize {
        self.cmax as usize * TOKEN_SLOT_LEN
    }
}

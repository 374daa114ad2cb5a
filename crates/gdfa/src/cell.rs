//! Cell and token-slot encodings

use subtle::{Choice, ConstantTimeEq};

use oblivids_ot::crypto::{prf_into, xor_in_place, Block, KAPPA_BYTES};

use crate::params::{CELL_LEN, TOKEN_SLOT_LEN};

const CELL_PAD: &[u8] = b"gdfa/cell-pad";

/// Bytes of the cell that carry data; the rest must be zero
const CELL_DATA_LEN: usize = 4 + 1 + 4;

/// Decrypted contents of one garbled cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPlain {
    /// Permuted label of the target state
    pub next_label: u32,
    /// Target state is accepting
    pub terminal: bool,
    /// Attack id of the target, 0 unless terminal
    pub attack_id: u32,
}

impl CellPlain {
    pub fn encode(&self) -> [u8; CELL_LEN] {
        let mut out = [0u8; CELL_LEN];
        out[0..4].copy_from_slice(&self.next_label.to_le_bytes());
        out[4] = self.terminal as u8;
        out[5..9].copy_from_slice(&self.attack_id.to_le_bytes());
        out
    }

    /// Parse a cell, rejecting anything a wrong key would produce
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != CELL_LEN {
            return None;
        }
        let zero = [0u8; CELL_LEN - CELL_DATA_LEN];
        let padding_ok: bool = bytes[CELL_DATA_LEN..].ct_eq(&zero).into();
        if !padding_ok || bytes[4] > 1 {
            return None;
        }

        let cell = Self {
            next_label: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            terminal: bytes[4] == 1,
            attack_id: u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
        };
        if cell.terminal != (cell.attack_id != 0) {
            return None;
        }
        Some(cell)
    }
}

/// One-time pad of column `col` in row `label` under `key`
fn pad(key: &Block, label: u32, col: u16) -> [u8; CELL_LEN] {
    let mut info = [0u8; 6];
    info[..4].copy_from_slice(&label.to_le_bytes());
    info[4..].copy_from_slice(&col.to_le_bytes());

    let mut out = [0u8; CELL_LEN];
    prf_into(key, CELL_PAD, &info, &mut out);
    out
}

/// Encrypt a cell for column `col` of row `label`
pub fn seal(key: &Block, label: u32, col: u16, cell: &CellPlain) -> [u8; CELL_LEN] {
    let mut out = cell.encode();
    xor_in_place(&mut out, &pad(key, label, col));
    out
}

/// Decrypt and parse a cell; `None` if the key does not fit
pub fn open(key: &Block, label: u32, col: u16, ciphertext: &[u8]) -> Option<CellPlain> {
    if ciphertext.len() != CELL_LEN {
        return None;
    }
    let mut plain = pad(key, label, col);
    xor_in_place(&mut plain, ciphertext);
    CellPlain::decode(&plain)
}

/// One `(column, key)` pair of a 1-of-256 entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSlot {
    pub column: u16,
    pub key: Block,
}

impl TokenSlot {
    pub fn encode_into(&self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.column.to_le_bytes());
        out[2..TOKEN_SLOT_LEN].copy_from_slice(&self.key);
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != TOKEN_SLOT_LEN {
            return None;
        }
        let mut key = [0u8; KAPPA_BYTES];
        key.copy_from_slice(&bytes[2..]);
        Some(Self {
            column: u16::from_le_bytes([bytes[0], bytes[1]]),
            key,
        })
    }

    /// Split a whole entry into its slots
    pub fn parse_entry(entry: &[u8]) -> Vec<TokenSlot> {
        entry
            .chunks_exact(TOKEN_SLOT_LEN)
            .filter_map(TokenSlot::decode)
            .collect()
    }

    /// Pick `a` when `choice` is 0 and `b` when it is 1, without branching
    pub fn select(a: &TokenSlot, b: &TokenSlot, choice: Choice) -> TokenSlot {
        use subtle::ConditionallySelectable;

        let mut key = [0u8; KAPPA_BYTES];
        for (i, k) in key.iter_mut().enumerate() {
            *k = u8::conditional_select(&a.key[i], &b.key[i], choice);
        }
        TokenSlot {
            column: u16::conditional_select(&a.column, &b.column, choice),
            key,
        }
    }
}

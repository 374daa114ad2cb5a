//! Per-build key schedule
//!
//! Every secret of a garbled table is derived from one 32-byte master with a
//! labelled PRF, so rows can be regenerated on demand instead of stored.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use oblivids_ot::crypto::{prf, prf_into, Block, KAPPA_BYTES};

use crate::params::{CELL_LEN, KEY_LEN};

const CELL_KEY: &[u8] = b"gdfa/cell-key";
const COLUMN_ORDER: &[u8] = b"gdfa/column-order";
const TOKEN_ORDER: &[u8] = b"gdfa/token-order";
const DECOY_CELL: &[u8] = b"gdfa/decoy-cell";
const DECOY_TOKEN: &[u8] = b"gdfa/decoy-token";

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeySchedule {
    master: [u8; 32],
}

impl KeySchedule {
    pub fn new(master: [u8; 32]) -> Self {
        Self { master }
    }

    /// Key of the cell for group `group` of real state `state`
    pub fn cell_key(&self, state: u32, group: u16) -> Block {
        let mut key = [0u8; KAPPA_BYTES];
        prf_into(&self.master, CELL_KEY, &info(&[state, group as u32]), &mut key);
        key
    }

    /// Column of each of the state's `n_groups` groups, injective into `0..outmax`
    pub fn column_order(&self, state: u32, n_groups: usize, outmax: u16) -> Vec<u16> {
        let mut columns: Vec<u16> = (0..outmax).collect();
        columns.shuffle(&mut self.stream(COLUMN_ORDER, &[state]));
        columns.truncate(n_groups);
        columns
    }

    /// Token positions for byte `x` of `state`; the groups containing `x`
    /// occupy the first entries.
    pub fn token_order(&self, state: u32, x: u8, cmax: u16) -> Vec<u16> {
        let mut order: Vec<u16> = (0..cmax).collect();
        order.shuffle(&mut self.stream(TOKEN_ORDER, &[state, x as u32]));
        order
    }

    /// Filler for column `col` of row `label`
    pub fn decoy_cell(&self, label: u32, col: u16) -> [u8; CELL_LEN] {
        let mut cell = [0u8; CELL_LEN];
        prf_into(&self.master, DECOY_CELL, &info(&[label, col as u32]), &mut cell);
        cell
    }

    /// Filler token slot: a column of the row and an unrelated key
    pub fn decoy_token(&self, label: u32, x: u8, slot: u16, outmax: u16) -> (u16, Block) {
        let bytes = prf(
            &self.master,
            DECOY_TOKEN,
            &info(&[label, x as u32, slot as u32]),
            2 + KEY_LEN,
        );
        let column = u16::from_le_bytes([bytes[0], bytes[1]]) % outmax.max(1);
        let mut key = [0u8; KAPPA_BYTES];
        key.copy_from_slice(&bytes[2..]);
        (column, key)
    }

    fn stream(&self, label: &[u8], words: &[u32]) -> ChaCha20Rng {
        let mut seed = [0u8; 32];
        prf_into(&self.master, label, &info(words), &mut seed);
        ChaCha20Rng::from_seed(seed)
    }
}

impl std::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeySchedule(..)")
    }
}

fn info(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(byte: u8) -> KeySchedule {
        KeySchedule::new([byte; 32])
    }

    #[test]
    fn test_cell_keys_are_distinct() {
        let keys = schedule(1);
        let a = keys.cell_key(0, 0);
        assert_eq!(a, keys.cell_key(0, 0));
        assert_ne!(a, keys.cell_key(0, 1));
        assert_ne!(a, keys.cell_key(1, 0));
        assert_ne!(a, schedule(2).cell_key(0, 0));
    }

    #[test]
    fn test_column_order_is_injective() {
        let keys = schedule(3);
        for state in 0..20 {
            let mut cols = keys.column_order(state, 5, 8);
            assert_eq!(cols.len(), 5);
            assert!(cols.iter().all(|&c| c < 8));
            cols.sort_unstable();
            cols.dedup();
            assert_eq!(cols.len(), 5);
        }
    }

    #[test]
    fn test_token_order_is_permutation() {
        let keys = schedule(4);
        let mut order = keys.token_order(7, b'q', 6);
        order.sort_unstable();
        assert_eq!(order, (0..6).collect::<Vec<u16>>());
    }

    #[test]
    fn test_decoy_columns_in_range() {
        let keys = schedule(5);
        for slot in 0..64 {
            let (col, _) = keys.decoy_token(1, 2, slot, 3);
            assert!(col < 3);
        }
    }

    #[test]
    fn test_debug_hides_master() {
        assert_eq!(format!("{:?}", schedule(9)), "KeySchedule(..)");
    }
}

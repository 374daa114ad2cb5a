//! PER: the random relabelling of DFA states

use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};

/// Uniform bijection between real state indices and row labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    /// label -> state
    forward: Vec<u32>,
    /// state -> label
    inverse: Vec<u32>,
}

impl Permutation {
    /// Fisher-Yates shuffle of `0..n`
    pub fn random<R: RngCore + CryptoRng>(n: usize, rng: &mut R) -> Self {
        let mut forward: Vec<u32> = (0..n as u32).collect();
        forward.shuffle(rng);

        let mut inverse = vec![0u32; n];
        for (label, &state) in forward.iter().enumerate() {
            inverse[state as usize] = label as u32;
        }
        Self { forward, inverse }
    }

    /// Real state stored under `label`
    pub fn state_of(&self, label: u32) -> Option<u32> {
        self.forward.get(label as usize).copied()
    }

    /// Row label of `state`
    pub fn label_of(&self, state: u32) -> Option<u32> {
        self.inverse.get(state as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

//! FIFO pool of random OTs
//!
//! Both parties append extension outputs in batch order and consume them in
//! lock step, so the n-th entry taken on one side pairs with the n-th on the
//! other.

use std::collections::VecDeque;

use crate::error::{OtError, Result};

/// Random OTs waiting to be derandomized
pub struct OtPool<T> {
    entries: VecDeque<T>,
    consumed: u64,
}

impl<T> OtPool<T> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            consumed: 0,
        }
    }

    /// Entries available
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries taken so far over the pool's lifetime
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Append a batch of fresh outputs
    pub fn refill(&mut self, batch: impl IntoIterator<Item = T>) {
        self.entries.extend(batch);
    }

    /// Pop the `n` oldest entries, or fail without consuming any
    pub fn take(&mut self, n: usize) -> Result<Vec<T>> {
        if self.entries.len() < n {
            return Err(OtError::PoolExhausted {
                needed: n,
                available: self.entries.len(),
            });
        }
        self.consumed += n as u64;
        Ok(self.entries.drain(..n).collect())
    }

    /// Drop every pending entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for OtPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

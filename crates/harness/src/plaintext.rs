//! Plaintext reference scanner
//!
//! Walks the DFA in the clear. Used to check the oblivious scan reports
//! the same verdict and stops at the same byte.

use oblivids_gdfa::{Dfa, Verdict};

use crate::error::{HarnessError, Result};

/// Outcome of a plaintext scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTrace {
    pub verdict: Verdict,
    /// States entered, one per consumed byte
    pub states: Vec<u32>,
    /// Index of the byte that entered the first accepting state
    pub first_match: Option<usize>,
}

impl ScanTrace {
    /// Bytes consumed before the scan stopped
    pub fn steps(&self) -> usize {
        self.states.len()
    }
}

/// Reference scanner over a plaintext DFA
pub struct PlaintextScanner {
    dfa: Dfa,
}

impl PlaintextScanner {
    pub fn new(dfa: Dfa) -> Self {
        Self { dfa }
    }

    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }

    /// Scan `input`, stopping at the first accepting state
    pub fn scan(&self, input: &[u8]) -> Result<ScanTrace> {
        let mut state = self.dfa.start;
        let mut states = Vec::with_capacity(input.len());

        for (i, &byte) in input.iter().enumerate() {
            state = self.dfa.next_state(state, byte).ok_or_else(|| {
                HarnessError::InvalidInput(format!("no transition from {} on 0x{:02x}", state, byte))
            })?;
            states.push(state);

            let attack_id = self.dfa.attack_id(state);
            if attack_id != 0 {
                return Ok(ScanTrace {
                    verdict: Verdict::Attack(attack_id),
                    states,
                    first_match: Some(i),
                });
            }
        }

        Ok(ScanTrace {
            verdict: Verdict::NoMatch,
            states,
            first_match: None,
        })
    }

    /// Verdict only
    pub fn verdict(&self, input: &[u8]) -> u32 {
        self.dfa.run(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oblivids_gdfa::DfaBuilder;

    fn scanner() -> PlaintextScanner {
        let mut builder = DfaBuilder::new();
        let s = builder.add_state();
        let hit = builder.add_state();
        builder.add_transition(s, b'!', hit);
        builder.add_transition(s, b'a'..=b'z', s);
        builder.set_accepting(hit, 11);
        PlaintextScanner::new(builder.build_with_reject_sink().unwrap())
    }

    #[test]
    fn test_match_position() {
        let trace = scanner().scan(b"abc!def").unwrap();
        assert_eq!(trace.verdict, Verdict::Attack(11));
        assert_eq!(trace.first_match, Some(3));
        assert_eq!(trace.steps(), 4);
    }

    #[test]
    fn test_sink_never_matches() {
        let scanner = scanner();
        let trace = scanner.scan(b"A!").unwrap();
        assert_eq!(trace.verdict, Verdict::NoMatch);
        assert_eq!(trace.steps(), 2);
        assert_eq!(scanner.verdict(b"A!"), 0);
    }
}

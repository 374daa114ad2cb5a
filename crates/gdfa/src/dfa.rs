//! Classical DFA over the byte alphabet
//!
//! Each state partitions the 256 bytes into character groups, and every group
//! names one target state. The garbled table has one cell per group, so the
//! number of groups bounds the row width (`outmax`) and the number of groups a
//! byte belongs to bounds the token width (`cmax`).

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{GdfaError, Result};
use crate::params::{Sparsity, MAX_ROWS, MAX_SPARSITY};

/// A set of bytes (256-bit bitmap)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct ByteSet([u64; 4]);

impl ByteSet {
    pub const fn empty() -> Self {
        Self([0; 4])
    }

    pub const fn full() -> Self {
        Self([u64::MAX; 4])
    }

    pub fn single(byte: u8) -> Self {
        let mut set = Self::empty();
        set.insert(byte);
        set
    }

    pub fn insert(&mut self, byte: u8) {
        self.0[(byte >> 6) as usize] |= 1 << (byte & 63);
    }

    pub fn contains(&self, byte: u8) -> bool {
        self.0[(byte >> 6) as usize] >> (byte & 63) & 1 == 1
    }

    pub fn len(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    pub fn union(&self, other: &ByteSet) -> ByteSet {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0.iter()) {
            *a |= b;
        }
        out
    }

    pub fn complement(&self) -> ByteSet {
        ByteSet(self.0.map(|w| !w))
    }

    /// Members in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=255u8).filter(move |&b| self.contains(b))
    }
}

impl From<u8> for ByteSet {
    fn from(byte: u8) -> Self {
        Self::single(byte)
    }
}

impl From<RangeInclusive<u8>> for ByteSet {
    fn from(range: RangeInclusive<u8>) -> Self {
        range.collect()
    }
}

impl From<&[u8]> for ByteSet {
    fn from(bytes: &[u8]) -> Self {
        bytes.iter().copied().collect()
    }
}

impl From<Vec<u8>> for ByteSet {
    fn from(bytes: Vec<u8>) -> Self {
        bytes.into_iter().collect()
    }
}

impl From<ByteSet> for Vec<u8> {
    fn from(set: ByteSet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<u8> for ByteSet {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut set = ByteSet::empty();
        for byte in iter {
            set.insert(byte);
        }
        set
    }
}

/// Bytes that move a state to `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharGroup {
    pub symbols: ByteSet,
    pub target: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub groups: Vec<CharGroup>,
    /// Rule identifier reported when this state is entered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_id: Option<u32>,
}

impl State {
    pub fn is_accepting(&self) -> bool {
        self.attack_id.is_some()
    }

    /// Indices of the groups containing `byte`
    pub fn groups_of(&self, byte: u8) -> impl Iterator<Item = usize> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(move |(_, g)| g.symbols.contains(byte))
            .map(|(i, _)| i)
    }
}

/// A deterministic automaton as handed over by the rule compiler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dfa {
    pub start: u32,
    pub states: Vec<State>,
}

impl Dfa {
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// Target of `state` on `byte`, if the byte is covered
    pub fn next_state(&self, state: u32, byte: u8) -> Option<u32> {
        let state = self.states.get(state as usize)?;
        state
            .groups_of(byte)
            .next()
            .map(|g| state.groups[g].target)
    }

    /// Attack id of `state`, 0 when it does not accept
    pub fn attack_id(&self, state: u32) -> u32 {
        self.states
            .get(state as usize)
            .and_then(|s| s.attack_id)
            .unwrap_or(0)
    }

    /// Plaintext scan: the attack id of the first accepting state entered,
    /// or 0 once the input is exhausted.
    pub fn run(&self, input: &[u8]) -> u32 {
        let mut state = self.start;
        for &byte in input {
            state = match self.next_state(state, byte) {
                Some(next) => next,
                None => return 0,
            };
            let id = self.attack_id(state);
            if id != 0 {
                return id;
            }
        }
        0
    }

    /// Smallest sparsity that admits this DFA.
    ///
    /// Fails when a state has more groups than a row can hold. `cmax` never
    /// exceeds the group count of a state, so it is bounded by the same check.
    pub fn min_sparsity(&self) -> Result<Sparsity> {
        let mut outmax = 1usize;
        let mut cmax = 1usize;
        for (index, state) in self.states.iter().enumerate() {
            if state.groups.len() > MAX_SPARSITY as usize {
                return Err(GdfaError::TooManyGroups {
                    state: index as u32,
                    groups: state.groups.len(),
                    outmax: MAX_SPARSITY,
                });
            }
            outmax = outmax.max(state.groups.len());
            for byte in 0..=255u8 {
                cmax = cmax.max(state.groups_of(byte).count());
            }
        }
        Sparsity::new(outmax as u16, cmax as u16)
    }

    /// Check the DFA is total, deterministic and fits `sparsity`
    pub fn validate(&self, sparsity: &Sparsity) -> Result<()> {
        sparsity.validate()?;

        let len = self.states.len();
        if len == 0 {
            return Err(GdfaError::EmptyDfa);
        }
        if len > MAX_ROWS as usize {
            return Err(GdfaError::InvalidPackage(format!(
                "{} states, at most {} supported",
                len, MAX_ROWS
            )));
        }
        if self.start as usize >= len {
            return Err(GdfaError::StateOutOfRange {
                state: self.start,
                len,
            });
        }

        for (index, state) in self.states.iter().enumerate() {
            let index = index as u32;

            if state.attack_id == Some(0) {
                return Err(GdfaError::ZeroAttackId { state: index });
            }
            if state.groups.len() > sparsity.outmax as usize {
                return Err(GdfaError::TooManyGroups {
                    state: index,
                    groups: state.groups.len(),
                    outmax: sparsity.outmax,
                });
            }
            if let Some(group) = state.groups.iter().find(|g| g.target as usize >= len) {
                return Err(GdfaError::StateOutOfRange {
                    state: group.target,
                    len,
                });
            }

            for byte in 0..=255u8 {
                let mut groups = state.groups_of(byte);
                let first = match groups.next() {
                    Some(g) => state.groups[g].target,
                    None => return Err(GdfaError::UncoveredByte { state: index, byte }),
                };

                let mut count = 1;
                for g in groups {
                    if state.groups[g].target != first {
                        return Err(GdfaError::ConflictingGroups { state: index, byte });
                    }
                    count += 1;
                }
                if count > sparsity.cmax as usize {
                    return Err(GdfaError::TooManyMemberships {
                        state: index,
                        byte,
                        count,
                        cmax: sparsity.cmax,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Incremental DFA construction.
///
/// Transitions from one state to the same target are merged into a single
/// character group, so a state's group count equals its distinct targets.
#[derive(Debug, Clone, Default)]
pub struct DfaBuilder {
    start: u32,
    states: Vec<State>,
    /// First transition source that did not exist
    unknown: Option<u32>,
}

impl DfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state and return its index
    pub fn add_state(&mut self) -> u32 {
        self.states.push(State::default());
        (self.states.len() - 1) as u32
    }

    pub fn set_start(&mut self, state: u32) -> &mut Self {
        self.start = state;
        self
    }

    /// Route `symbols` from `from` to `to`.
    ///
    /// Unknown states are reported by [`DfaBuilder::build`].
    pub fn add_transition(&mut self, from: u32, symbols: impl Into<ByteSet>, to: u32) -> &mut Self {
        let symbols = symbols.into();
        match self.states.get_mut(from as usize) {
            Some(state) => match state.groups.iter_mut().find(|g| g.target == to) {
                Some(group) => group.symbols = group.symbols.union(&symbols),
                None => state.groups.push(CharGroup {
                    symbols,
                    target: to,
                }),
            },
            None => {
                self.unknown.get_or_insert(from);
            }
        }
        self
    }

    pub fn set_accepting(&mut self, state: u32, attack_id: u32) -> &mut Self {
        if let Some(s) = self.states.get_mut(state as usize) {
            s.attack_id = Some(attack_id);
        }
        self
    }

    /// Finish without adding a sink; uncovered bytes fail validation
    pub fn build(self) -> Result<Dfa> {
        if let Some(state) = self.unknown {
            return Err(GdfaError::StateOutOfRange {
                state,
                len: self.states.len(),
            });
        }
        let dfa = Dfa {
            start: self.start,
            states: self.states,
        };
        dfa.check_structure()?;
        Ok(dfa)
    }

    /// Finish and route every uncovered byte to one non-accepting sink
    /// state that loops on all bytes.
    pub fn build_with_reject_sink(mut self) -> Result<Dfa> {
        let sink = self.states.len() as u32;
        let mut needs_sink = false;

        for state in self.states.iter_mut() {
            let covered = state
                .groups
                .iter()
                .fold(ByteSet::empty(), |acc, g| acc.union(&g.symbols));
            if covered != ByteSet::full() {
                needs_sink = true;
                state.groups.push(CharGroup {
                    symbols: covered.complement(),
                    target: sink,
                });
            }
        }

        if needs_sink {
            self.states.push(State {
                groups: vec![CharGroup {
                    symbols: ByteSet::full(),
                    target: sink,
                }],
                attack_id: None,
            });
        }
        self.build()
    }
}

impl Dfa {
    fn check_structure(&self) -> Result<()> {
        let len = self.states.len();
        if len == 0 {
            return Err(GdfaError::EmptyDfa);
        }
        if self.start as usize >= len {
            return Err(GdfaError::StateOutOfRange {
                state: self.start,
                len,
            });
        }
        for (index, state) in self.states.iter().enumerate() {
            if state.attack_id == Some(0) {
                return Err(GdfaError::ZeroAttackId {
                    state: index as u32,
                });
            }
            if let Some(group) = state.groups.iter().find(|g| g.target as usize >= len) {
                return Err(GdfaError::StateOutOfRange {
                    state: group.target,
                    len,
                });
            }
        }
        Ok(())
    }
}

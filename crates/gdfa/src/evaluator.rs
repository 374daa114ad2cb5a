//! Client-side walk over a garbled table
//!
//! One step per input byte: the token obtained for the byte names candidate
//! cells of the current row together with their keys. The first slot whose
//! cell decrypts to a well-formed plaintext gives the next row label.

use std::fmt;

use tracing::debug;

use crate::cell::{open, CellPlain, TokenSlot};
use crate::error::{GdfaError, Result};
use crate::package::GdfaPackage;
use crate::table::ServerTable;

/// Final output of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    NoMatch,
    Attack(u32),
}

impl Verdict {
    pub fn from_attack_id(attack_id: u32) -> Self {
        match attack_id {
            0 => Verdict::NoMatch,
            id => Verdict::Attack(id),
        }
    }

    /// 0 for no match, otherwise the attack id
    pub fn as_u32(&self) -> u32 {
        match self {
            Verdict::NoMatch => 0,
            Verdict::Attack(id) => *id,
        }
    }
}

impl From<Verdict> for u32 {
    fn from(verdict: Verdict) -> Self {
        verdict.as_u32()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::NoMatch => write!(f, "no match"),
            Verdict::Attack(id) => write!(f, "attack {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalResult {
    pub final_label: u32,
    /// First attack id reached, 0 if none
    pub first_attack_id: u32,
    /// Last attack id reached, 0 if none
    pub last_attack_id: u32,
    /// Bytes consumed
    pub steps: u64,
}

impl EvalResult {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_attack_id(self.first_attack_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStatus {
    Running,
    Finished,
}

/// What one step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { next_label: u32 },
    Matched { attack_id: u32 },
}

/// Evaluator state machine, advanced one token at a time
#[derive(Debug, Clone)]
pub struct Evaluator {
    package: GdfaPackage,
    current_label: u32,
    steps: u64,
    first_attack_id: u32,
    last_attack_id: u32,
    stop_on_first_attack: bool,
    status: EvalStatus,
}

impl Evaluator {
    pub fn new(package: GdfaPackage) -> Self {
        Self {
            current_label: package.start_label(),
            package,
            steps: 0,
            first_attack_id: 0,
            last_attack_id: 0,
            stop_on_first_attack: true,
            status: EvalStatus::Running,
        }
    }

    /// Keep walking after an accepting state (records the last attack too)
    pub fn with_stop_on_first_attack(mut self, stop: bool) -> Self {
        self.stop_on_first_attack = stop;
        self
    }

    pub fn current_label(&self) -> u32 {
        self.current_label
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn status(&self) -> EvalStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == EvalStatus::Finished
    }

    pub fn package(&self) -> &GdfaPackage {
        &self.package
    }

    /// Consume the token obtained for the next input byte
    pub fn step(&mut self, token: &[u8]) -> Result<StepOutcome> {
        if self.is_finished() {
            return Err(GdfaError::EvaluationFinished);
        }
        let entry_len = self.package.header().entry_len as usize;
        if token.len() != entry_len {
            return Err(GdfaError::TokenLengthMismatch {
                expected: entry_len,
                got: token.len(),
            });
        }

        let cell = self.open_any(token)?;
        self.steps += 1;
        self.current_label = cell.next_label;

        if !cell.terminal {
            return Ok(StepOutcome::Advanced {
                next_label: cell.next_label,
            });
        }

        if self.first_attack_id == 0 {
            self.first_attack_id = cell.attack_id;
        }
        self.last_attack_id = cell.attack_id;
        if self.stop_on_first_attack {
            self.status = EvalStatus::Finished;
        }
        debug!(steps = self.steps, attack_id = cell.attack_id, "accepting state reached");
        Ok(StepOutcome::Matched {
            attack_id: cell.attack_id,
        })
    }

    fn open_any(&self, token: &[u8]) -> Result<CellPlain> {
        let label = self.current_label;
        let rows = self.package.row_count();

        for slot in TokenSlot::parse_entry(token) {
            let Some(ciphertext) = self.package.cell(label, slot.column)? else {
                continue;
            };
            if let Some(cell) = open(&slot.key, label, slot.column, ciphertext) {
                if cell.next_label < rows {
                    return Ok(cell);
                }
            }
        }
        Err(GdfaError::NoValidCell)
    }

    /// Stop and report
    pub fn finish(&mut self) -> EvalResult {
        self.status = EvalStatus::Finished;
        EvalResult {
            final_label: self.current_label,
            first_attack_id: self.first_attack_id,
            last_attack_id: self.last_attack_id,
            steps: self.steps,
        }
    }
}

/// Walk `input` using tokens straight from the server table, without OT
pub fn evaluate_local(
    package: &GdfaPackage,
    table: &ServerTable,
    input: &[u8],
) -> Result<EvalResult> {
    let mut evaluator = Evaluator::new(package.clone());
    for &x in input {
        if evaluator.is_finished() {
            break;
        }
        let token = table.token(evaluator.current_label(), x)?;
        evaluator.step(&token)?;
    }
    Ok(evaluator.finish())
}

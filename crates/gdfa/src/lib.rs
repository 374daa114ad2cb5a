//! Oblivids Garbled DFA
//!
//! Turns a classical byte DFA into a garbled table whose rows are
//! permuted and encrypted cell by cell, and walks that table on the client
//! one byte at a time with the 1-of-256 OT as the only key channel.

mod error;
pub mod params;
pub mod dfa;
mod permutation;
mod keys;
pub mod cell;
mod builder;
pub mod package;
mod table;
mod evaluator;
mod client;

pub use error::{GdfaError, Result};
pub use params::{Sparsity, CELL_LEN, GDFA_VERSION, KEY_LEN, MAX_ROWS, MAX_SPARSITY, TOKEN_SLOT_LEN};
pub use dfa::{ByteSet, CharGroup, Dfa, DfaBuilder, State};
pub use permutation::Permutation;
pub use keys::KeySchedule;
pub use builder::{BuiltGdfa, GdfaBuilder, RowStream};
pub use package::{GdfaPackage, PackageHeader, PackageReader, PackageWriter, PACKAGE_HEADER_LEN};
pub use table::ServerTable;
pub use evaluator::{evaluate_local, EvalResult, EvalStatus, Evaluator, StepOutcome, Verdict};
pub use client::{run_local, ScanClient, ScanPhase, ScanReport};

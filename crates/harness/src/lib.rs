//! Oblivids Test Harness
//!
//! Plaintext reference scanner, random DFA generation and an in-process
//! pipeline that checks the oblivious scan against the reference.

mod error;
mod plaintext;
mod secure;
mod pipeline;
pub mod generate;

pub use error::{HarnessError, Result};
pub use plaintext::{PlaintextScanner, ScanTrace};
pub use secure::SecureScanner;
pub use pipeline::{ScanComparison, ScanPipeline};
pub use generate::{random_dfa, random_input, RandomDfaConfig};

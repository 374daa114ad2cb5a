//! Harness error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("GDFA error: {0}")]
    Gdfa(#[from] oblivids_gdfa::GdfaError),

    #[error("OT error: {0}")]
    Ot(#[from] oblivids_ot::OtError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] oblivids_protocol::ProtocolError),

    #[error("Verification failed: {message}")]
    VerificationFailed { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

//! GDFA error types

use oblivids_ot::{ErrorKind, OtError};
use oblivids_protocol::{ErrorCode, ProtocolError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GdfaError {
    #[error("DFA has no states")]
    EmptyDfa,

    #[error("State {state} out of range (DFA has {len} states)")]
    StateOutOfRange { state: u32, len: usize },

    #[error("State {state} has no transition for byte 0x{byte:02X}")]
    UncoveredByte { state: u32, byte: u8 },

    #[error("State {state} sends byte 0x{byte:02X} to more than one target")]
    ConflictingGroups { state: u32, byte: u8 },

    #[error("State {state} has {groups} character groups, outmax is {outmax}")]
    TooManyGroups { state: u32, groups: usize, outmax: u16 },

    #[error("Byte 0x{byte:02X} of state {state} is in {count} groups, cmax is {cmax}")]
    TooManyMemberships {
        state: u32,
        byte: u8,
        count: usize,
        cmax: u16,
    },

    #[error("Accepting state {state} has attack id 0")]
    ZeroAttackId { state: u32 },

    #[error("Invalid sparsity: {0}")]
    InvalidSparsity(String),

    #[error("Invalid package: {0}")]
    InvalidPackage(String),

    #[error("Package header CRC mismatch: expected 0x{expected:08X}, got 0x{got:08X}")]
    HeaderCrcMismatch { expected: u32, got: u32 },

    #[error("Package digest mismatch")]
    DigestMismatch,

    #[error("Row length mismatch: expected {expected}, got {got}")]
    RowLengthMismatch { expected: usize, got: usize },

    #[error("Row count mismatch: expected {expected}, got {got}")]
    RowCountMismatch { expected: u32, got: u32 },

    #[error("Row label {label} out of range ({rows} rows)")]
    LabelOutOfRange { label: u32, rows: u32 },

    #[error("Token length mismatch: expected {expected}, got {got}")]
    TokenLengthMismatch { expected: usize, got: usize },

    #[error("No token slot opened a valid cell")]
    NoValidCell,

    #[error("Evaluation already finished")]
    EvaluationFinished,

    #[error("Session parameters do not match the package: {0}")]
    ParameterMismatch(String),

    #[error("OT error: {0}")]
    Ot(#[from] OtError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GdfaError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GdfaError::NoValidCell => ErrorKind::CryptographicValidation,
            GdfaError::Ot(err) => err.kind(),
            GdfaError::Protocol(_)
            | GdfaError::Io(_)
            | GdfaError::EvaluationFinished
            | GdfaError::TokenLengthMismatch { .. }
            | GdfaError::ParameterMismatch(_) => ErrorKind::Transport,
            _ => ErrorKind::Precondition,
        }
    }

    /// Wire code reported to the peer
    pub fn error_code(&self) -> ErrorCode {
        match self {
            GdfaError::Ot(err) => err.error_code(),
            _ if self.kind() == ErrorKind::CryptographicValidation => ErrorCode::ProtocolAborted,
            GdfaError::LabelOutOfRange { .. } => ErrorCode::InvalidRow,
            GdfaError::DigestMismatch | GdfaError::ParameterMismatch(_) => {
                ErrorCode::PackageMismatch
            }
            GdfaError::Protocol(_) => ErrorCode::InvalidParam,
            GdfaError::Io(_) => ErrorCode::Internal,
            _ => ErrorCode::InvalidParam,
        }
    }
}

pub type Result<T> = std::result::Result<T, GdfaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dfa_errors_are_preconditions() {
        let err = GdfaError::TooManyGroups {
            state: 3,
            groups: 4,
            outmax: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_ot_errors_keep_their_kind() {
        let err = GdfaError::from(OtError::ConsistencyCheckFailed);
        assert_eq!(err.kind(), ErrorKind::CryptographicValidation);
        assert_eq!(err.error_code(), ErrorCode::ProtocolAborted);
    }

    #[test]
    fn test_bad_cell_is_a_generic_abort() {
        assert_eq!(GdfaError::NoValidCell.error_code(), ErrorCode::ProtocolAborted);
    }
}

//! OT error types

use oblivids_protocol::ErrorCode;
use thiserror::Error;

/// Coarse classification used to decide what the peer may learn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input caught before any protocol round (fatal, local)
    Precondition,
    /// A cryptographic check failed; surfaced to the peer only as an abort
    CryptographicValidation,
    /// Round mismatch, expiry or malformed message; start a fresh session
    Transport,
}

#[derive(Error, Debug)]
pub enum OtError {
    #[error("Session not initialized")]
    SessionNotInitialized,

    #[error("Session already initialized")]
    SessionAlreadyInitialized,

    #[error("Session expired")]
    SessionExpired,

    #[error("Session aborted")]
    SessionAborted,

    #[error("Invalid session ID")]
    InvalidSessionId,

    #[error("Round mismatch: expected {expected}, got {got}")]
    RoundMismatch { expected: u64, got: u64 },

    #[error("Invalid index: {index} >= {max}")]
    InvalidIndex { index: u32, max: u32 },

    #[error("Random OT pool exhausted: need {needed}, have {available}")]
    PoolExhausted { needed: usize, available: usize },

    #[error("Batch size exceeded: {size} > {max}")]
    BatchSizeExceeded { size: usize, max: usize },

    #[error("Batch mismatch: expected {expected}, got {got}")]
    BatchMismatch { expected: u32, got: u32 },

    #[error("Package digest does not match the served package")]
    PackageMismatch,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Invalid group element")]
    InvalidPoint,

    #[error("Extension consistency check failed")]
    ConsistencyCheckFailed,

    #[error("Peer reported error {code:?}: {message}")]
    PeerError { code: ErrorCode, message: String },

    #[error("Protocol error: {0}")]
    ProtocolError(#[from] oblivids_protocol::ProtocolError),
}

impl OtError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            OtError::InvalidPoint | OtError::ConsistencyCheckFailed => {
                ErrorKind::CryptographicValidation
            }
            OtError::InvalidIndex { .. }
            | OtError::BatchSizeExceeded { .. }
            | OtError::InvalidInput(_)
            | OtError::PackageMismatch => ErrorKind::Precondition,
            _ => ErrorKind::Transport,
        }
    }

    /// Wire code reported to the peer
    pub fn error_code(&self) -> ErrorCode {
        if self.kind() == ErrorKind::CryptographicValidation {
            return ErrorCode::ProtocolAborted;
        }
        match self {
            OtError::SessionNotInitialized | OtError::InvalidSessionId => {
                ErrorCode::SessionNotFound
            }
            OtError::SessionExpired => ErrorCode::SessionExpired,
            OtError::SessionAborted => ErrorCode::ProtocolAborted,
            OtError::RoundMismatch { .. } => ErrorCode::BadRound,
            OtError::InvalidIndex { .. } => ErrorCode::InvalidRow,
            OtError::PackageMismatch => ErrorCode::PackageMismatch,
            OtError::ProtocolError(oblivids_protocol::ProtocolError::HeaderCrcMismatch {
                ..
            })
            | OtError::ProtocolError(oblivids_protocol::ProtocolError::PayloadCrcMismatch {
                ..
            }) => ErrorCode::BadCrc,
            OtError::ProtocolError(oblivids_protocol::ProtocolError::VersionMismatch {
                ..
            }) => ErrorCode::BadVersion,
            OtError::ProtocolError(oblivids_protocol::ProtocolError::UnknownMessageType(_)) => {
                ErrorCode::UnknownMsgType
            }
            OtError::PeerError { code, .. } => *code,
            OtError::SessionAlreadyInitialized
            | OtError::PoolExhausted { .. }
            | OtError::BatchSizeExceeded { .. }
            | OtError::BatchMismatch { .. }
            | OtError::InvalidInput(_)
            | OtError::InvalidMessageFormat(_)
            | OtError::UnexpectedMessage(_)
            | OtError::ProtocolError(_) => ErrorCode::InvalidParam,
            OtError::InvalidPoint | OtError::ConsistencyCheckFailed => ErrorCode::ProtocolAborted,
        }
    }
}

pub type Result<T> = std::result::Result<T, OtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crypto_failures_collapse_to_abort() {
        assert_eq!(OtError::InvalidPoint.error_code(), ErrorCode::ProtocolAborted);
        assert_eq!(
            OtError::ConsistencyCheckFailed.error_code(),
            ErrorCode::ProtocolAborted
        );
        assert_eq!(
            OtError::InvalidPoint.kind(),
            ErrorKind::CryptographicValidation
        );
    }

    #[test]
    fn test_round_mismatch_is_transport() {
        let err = OtError::RoundMismatch {
            expected: 3,
            got: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.error_code(), ErrorCode::BadRound);
    }
}

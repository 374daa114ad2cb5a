//! Protocol error types
//!
//! Framing errors come first; payload errors name the message they were
//! raised for.

use thiserror::Error;

use crate::constants::MsgType;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u16, got: u16 },

    #[error("Unknown message type: 0x{0:04X}")]
    UnknownMessageType(u16),

    #[error("Invalid header length: expected {expected}, got {got}")]
    InvalidHeaderLength { expected: u16, got: u16 },

    #[error("Header CRC mismatch: expected 0x{expected:08X}, got 0x{got:08X}")]
    HeaderCrcMismatch { expected: u32, got: u32 },

    #[error("Payload CRC mismatch: expected 0x{expected:08X}, got 0x{got:08X}")]
    PayloadCrcMismatch { expected: u32, got: u32 },

    #[error("Buffer too short: need {need} bytes, have {have}")]
    BufferTooShort { need: usize, have: usize },

    #[error("{0} bytes after the end of the frame")]
    TrailingBytes(usize),

    #[error("{msg_type:?} payload of {len} bytes, allowed {min}..={max}")]
    PayloadLength {
        msg_type: MsgType,
        len: usize,
        min: usize,
        max: usize,
    },

    #[error("Truncated {0} payload")]
    Truncated(&'static str),

    #[error("Answer of {got} bytes does not hold 256 entries of {entry_len} bytes")]
    AnswerSize { entry_len: u16, got: usize },

    #[error("Unsupported OT suite: 0x{0:04X}")]
    UnsupportedSuite(u16),

    #[error("Unknown error code: 0x{0:08X}")]
    UnknownErrorCode(u32),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

//! ERROR message payload
//!
//! ```text
//! code     u32
//! detail   u64   expected round for BadRound, 0 otherwise
//! msg_len  u16   at most MAX_ERROR_MESSAGE_LEN
//! message  UTF-8
//! ```
//!
//! A `ProtocolAborted` error always carries detail 0 and the same fixed text,
//! whatever the sender passed in.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::constants::{ErrorCode, MsgType, ERROR_PREFIX_LEN, MAX_ERROR_MESSAGE_LEN};
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;

/// Text of every generic abort
pub const ABORT_MESSAGE: &str = "protocol aborted";

/// ERROR payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub detail: u64,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_detail(code, 0, message)
    }

    pub fn with_detail(code: ErrorCode, detail: u64, message: impl Into<String>) -> Self {
        if code == ErrorCode::ProtocolAborted {
            return Self::aborted();
        }
        Self {
            code,
            detail,
            message: clip(message.into()),
        }
    }

    /// Generic abort: no detail about which check failed
    pub fn aborted() -> Self {
        Self {
            code: ErrorCode::ProtocolAborted,
            detail: 0,
            message: ABORT_MESSAGE.to_string(),
        }
    }

    /// `BadRound` reply naming the round the server expected
    pub fn bad_round(expected: u64, got: u64) -> Self {
        Self::with_detail(
            ErrorCode::BadRound,
            expected,
            format!("expected round {}, got {}", expected, got),
        )
    }

    pub fn is_abort(&self) -> bool {
        self.code == ErrorCode::ProtocolAborted
    }
}

/// Cut `message` to at most `MAX_ERROR_MESSAGE_LEN` bytes on a char boundary
fn clip(mut message: String) -> String {
    if message.len() > MAX_ERROR_MESSAGE_LEN {
        let mut end = MAX_ERROR_MESSAGE_LEN;
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        message.truncate(end);
    }
    message
}

impl Payload for ErrorPayload {
    const MSG_TYPE: MsgType = MsgType::Error;

    fn encode(&self) -> Vec<u8> {
        let text = clip(self.message.clone());
        let mut buf = Vec::with_capacity(ERROR_PREFIX_LEN + text.len());
        buf.extend_from_slice(&self.code.to_u32().to_le_bytes());
        buf.extend_from_slice(&self.detail.to_le_bytes());
        buf.extend_from_slice(&(text.len() as u16).to_le_bytes());
        buf.extend_from_slice(text.as_bytes());
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < ERROR_PREFIX_LEN {
            return Err(ProtocolError::Truncated("ERROR"));
        }

        let mut cursor = Cursor::new(data);
        let raw_code = cursor.read_u32::<LittleEndian>()?;
        let code = ErrorCode::from_u32(raw_code).ok_or(ProtocolError::UnknownErrorCode(raw_code))?;
        let detail = cursor.read_u64::<LittleEndian>()?;
        let len = cursor.read_u16::<LittleEndian>()? as usize;

        if len > MAX_ERROR_MESSAGE_LEN {
            return Err(ProtocolError::InvalidParameter(format!(
                "error message of {} bytes",
                len
            )));
        }
        if data.len() != ERROR_PREFIX_LEN + len {
            return Err(ProtocolError::Truncated("ERROR"));
        }

        let mut text = vec![0u8; len];
        cursor.read_exact(&mut text)?;
        let message = String::from_utf8(text)
            .map_err(|_| ProtocolError::InvalidParameter("error message is not UTF-8".into()))?;

        Ok(Self::with_detail(code, detail, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_roundtrip() {
        let payload = ErrorPayload::new(ErrorCode::SessionNotFound, "Session not found");
        let encoded = payload.encode();
        assert_eq!(encoded.len(), ERROR_PREFIX_LEN + 17);
        assert_eq!(ErrorPayload::decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_bad_round_carries_expected_round() {
        let decoded = ErrorPayload::decode(&ErrorPayload::bad_round(7, 12).encode()).unwrap();
        assert_eq!(decoded.code, ErrorCode::BadRound);
        assert_eq!(decoded.detail, 7);
        assert_eq!(decoded.message, "expected round 7, got 12");
    }

    #[test]
    fn test_abort_hides_detail() {
        let leaky = ErrorPayload::with_detail(ErrorCode::ProtocolAborted, 3, "KOS check failed");
        assert_eq!(leaky, ErrorPayload::aborted());

        // A peer that puts text into an abort frame gets it normalized
        let mut wire = ErrorPayload::aborted().encode();
        wire[4] = 9;
        let decoded = ErrorPayload::decode(&wire).unwrap();
        assert!(decoded.is_abort());
        assert_eq!(decoded.detail, 0);
        assert_eq!(decoded.message, ABORT_MESSAGE);
    }

    #[test]
    fn test_long_message_clipped_on_char_boundary() {
        let payload = ErrorPayload::new(ErrorCode::Internal, "é".repeat(200));
        assert!(payload.message.len() <= MAX_ERROR_MESSAGE_LEN);
        assert!(payload.message.chars().all(|c| c == 'é'));
        assert_eq!(ErrorPayload::decode(&payload.encode()).unwrap(), payload);
    }

    #[test]
    fn test_unknown_code_rejected() {
        let mut wire = ErrorPayload::new(ErrorCode::Internal, "x").encode();
        wire[..4].copy_from_slice(&0xDEADu32.to_le_bytes());
        assert!(matches!(
            ErrorPayload::decode(&wire),
            Err(ProtocolError::UnknownErrorCode(0xDEAD))
        ));
    }
}

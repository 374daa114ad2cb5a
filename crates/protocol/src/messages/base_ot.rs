//! BASE_OT_MSG message payload
//!
//! The client opens with its setup point; the server answers with one
//! blinded point per extension column and marks the reply final. The blob
//! is always a whole number of compressed points.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::constants::{MsgType, MAX_BASE_OT_POINTS, POINT_LEN};
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;

const FLAG_FINAL: u16 = 0x0001;

/// BASE_OT_MSG payload (Bidirectional)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseOtMsgPayload {
    /// Handshake step, starting at 1
    pub phase: u16,
    /// Set on the message that completes the handshake
    pub is_final: bool,
    /// Concatenated compressed points
    pub blob: Vec<u8>,
}

impl BaseOtMsgPayload {
    pub fn new(phase: u16, is_final: bool, blob: Vec<u8>) -> Self {
        Self {
            phase,
            is_final,
            blob,
        }
    }

    pub fn point_count(&self) -> usize {
        self.blob.len() / POINT_LEN
    }
}

impl Payload for BaseOtMsgPayload {
    const MSG_TYPE: MsgType = MsgType::BaseOtMsg;

    fn encode(&self) -> Vec<u8> {
        let flags = if self.is_final { FLAG_FINAL } else { 0 };
        let mut buf = Vec::with_capacity(8 + self.blob.len());
        buf.extend_from_slice(&self.phase.to_le_bytes());
        buf.extend_from_slice(&flags.to_le_bytes());
        buf.extend_from_slice(&(self.point_count() as u32).to_le_bytes());
        buf.extend_from_slice(&self.blob);
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(ProtocolError::Truncated("BASE_OT_MSG"));
        }

        let mut cursor = Cursor::new(data);
        let phase = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let count = cursor.read_u32::<LittleEndian>()? as usize;

        if phase == 0 || flags & !FLAG_FINAL != 0 {
            return Err(ProtocolError::InvalidParameter(format!(
                "base OT phase {} flags 0x{:04X}",
                phase, flags
            )));
        }
        if count == 0 || count > MAX_BASE_OT_POINTS {
            return Err(ProtocolError::InvalidParameter(format!(
                "{} base OT points",
                count
            )));
        }
        if data.len() != 8 + count * POINT_LEN {
            return Err(ProtocolError::Truncated("BASE_OT_MSG"));
        }

        let mut blob = vec![0u8; count * POINT_LEN];
        cursor.read_exact(&mut blob)?;

        Ok(Self {
            phase,
            is_final: flags & FLAG_FINAL != 0,
            blob,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_and_reply() {
        let setup = BaseOtMsgPayload::new(1, false, vec![0xA1; POINT_LEN]);
        let decoded = BaseOtMsgPayload::decode(&setup.encode()).unwrap();
        assert_eq!(decoded, setup);
        assert_eq!(decoded.point_count(), 1);

        let reply = BaseOtMsgPayload::new(2, true, vec![0xB2; 128 * POINT_LEN]);
        let decoded = BaseOtMsgPayload::decode(&reply.encode()).unwrap();
        assert!(decoded.is_final);
        assert_eq!(decoded.point_count(), 128);
    }

    #[test]
    fn test_partial_point_rejected() {
        let mut encoded = BaseOtMsgPayload::new(1, false, vec![7; 2 * POINT_LEN]).encode();
        encoded.truncate(8 + POINT_LEN + 5);
        assert!(matches!(
            BaseOtMsgPayload::decode(&encoded),
            Err(ProtocolError::Truncated("BASE_OT_MSG"))
        ));
    }

    #[test]
    fn test_empty_and_unknown_flags_rejected() {
        let empty = BaseOtMsgPayload::new(1, false, vec![]).encode();
        assert!(matches!(
            BaseOtMsgPayload::decode(&empty),
            Err(ProtocolError::InvalidParameter(_))
        ));

        let mut flagged = BaseOtMsgPayload::new(1, false, vec![0; POINT_LEN]).encode();
        flagged[2] = 0x80;
        assert!(matches!(
            BaseOtMsgPayload::decode(&flagged),
            Err(ProtocolError::InvalidParameter(_))
        ));
    }
}

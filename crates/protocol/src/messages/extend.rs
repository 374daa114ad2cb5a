//! EXTEND_REQUEST and EXTEND_RESPONSE message payloads

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::constants::MsgType;
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;

/// EXTEND_REQUEST payload (Client → Server)
///
/// Carries one OT-extension batch: the masked column matrix and the
/// consistency-check values, both opaque at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendRequestPayload {
    /// Batch index within the session (starts at 0)
    pub batch: u32,
    /// Number of usable random OTs requested
    pub count: u32,
    /// Opaque extension blob
    pub blob: Vec<u8>,
}

impl ExtendRequestPayload {
    pub fn new(batch: u32, count: u32, blob: Vec<u8>) -> Self {
        Self { batch, count, blob }
    }
}

impl Payload for ExtendRequestPayload {
    const MSG_TYPE: MsgType = MsgType::ExtendRequest;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + self.blob.len());

        buf.write_u32::<LittleEndian>(self.batch).unwrap();
        buf.write_u32::<LittleEndian>(self.count).unwrap();
        buf.write_u32::<LittleEndian>(self.blob.len() as u32)
            .unwrap();
        buf.write_all(&self.blob).unwrap();

        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(ProtocolError::Truncated("EXTEND_REQUEST"));
        }

        let mut cursor = Cursor::new(data);

        let batch = cursor.read_u32::<LittleEndian>()?;
        let count = cursor.read_u32::<LittleEndian>()?;
        let blob_len = cursor.read_u32::<LittleEndian>()? as usize;

        let pos = cursor.position() as usize;
        if data.len() < pos + blob_len {
            return Err(ProtocolError::Truncated("EXTEND_REQUEST"));
        }

        let mut blob = vec![0u8; blob_len];
        cursor.read_exact(&mut blob)?;

        if count == 0 {
            return Err(ProtocolError::InvalidParameter(
                "extension batch must request at least one OT".to_string(),
            ));
        }

        Ok(Self { batch, count, blob })
    }
}

/// EXTEND_RESPONSE payload (Server → Client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendResponsePayload {
    /// Batch index being acknowledged
    pub batch: u32,
    /// Number of random OTs the server added to its pool
    pub accepted: u32,
}

impl Payload for ExtendResponsePayload {
    const MSG_TYPE: MsgType = MsgType::ExtendResponse;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.write_u32::<LittleEndian>(self.batch).unwrap();
        buf.write_u32::<LittleEndian>(self.accepted).unwrap();
        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(ProtocolError::Truncated("EXTEND_RESPONSE"));
        }

        let mut cursor = Cursor::new(data);
        let batch = cursor.read_u32::<LittleEndian>()?;
        let accepted = cursor.read_u32::<LittleEndian>()?;

        Ok(Self { batch, accepted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_request_roundtrip() {
        let payload = ExtendRequestPayload::new(3, 64, vec![0xCD; 300]);
        let decoded = ExtendRequestPayload::decode(&payload.encode()).unwrap();
        assert_eq!(payload, decoded);
    }

    #[test]
    fn test_extend_request_zero_count() {
        let payload = ExtendRequestPayload::new(0, 0, vec![]);
        let result = ExtendRequestPayload::decode(&payload.encode());
        assert!(matches!(result, Err(ProtocolError::InvalidParameter(_))));
    }

    #[test]
    fn test_extend_response_short_buffer() {
        let result = ExtendResponsePayload::decode(&[1, 2, 3]);
        assert!(matches!(result, Err(ProtocolError::Truncated(_))));
    }
}

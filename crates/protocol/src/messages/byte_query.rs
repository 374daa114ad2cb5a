//! BYTE_QUERY and BYTE_ANSWER message payloads
//!
//! One query/answer pair per input byte. The query names the row the client
//! currently sits on; the OT blob hides which byte it is asking for.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::constants::{MsgType, BYTE_QUERY_LEN, QUERY_BLOB_LEN};
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;

/// Number of slots answered per query
pub const SLOTS_PER_ANSWER: usize = 256;

/// BYTE_QUERY payload (Client → Server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteQueryPayload {
    /// Permuted row label of the current state
    pub row_label: u32,
    /// Opaque 1-of-256 query blob
    pub blob: Vec<u8>,
}

impl Payload for ByteQueryPayload {
    const MSG_TYPE: MsgType = MsgType::ByteQuery;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.blob.len());

        buf.write_u32::<LittleEndian>(self.row_label).unwrap();
        buf.write_u32::<LittleEndian>(self.blob.len() as u32)
            .unwrap();
        buf.write_all(&self.blob).unwrap();

        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < BYTE_QUERY_LEN {
            return Err(ProtocolError::Truncated("BYTE_QUERY"));
        }

        let mut cursor = Cursor::new(data);

        let row_label = cursor.read_u32::<LittleEndian>()?;
        let blob_len = cursor.read_u32::<LittleEndian>()? as usize;
        if blob_len != QUERY_BLOB_LEN {
            return Err(ProtocolError::InvalidParameter(format!(
                "query blob of {} bytes",
                blob_len
            )));
        }

        let mut blob = vec![0u8; QUERY_BLOB_LEN];
        cursor.read_exact(&mut blob)?;

        Ok(Self { row_label, blob })
    }
}

/// BYTE_ANSWER payload (Server → Client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteAnswerPayload {
    /// Row label the answer was computed for
    pub row_label: u32,
    /// Bytes per slot
    pub entry_len: u16,
    /// 256 masked slots, `entry_len` bytes each
    pub blob: Vec<u8>,
}

impl Payload for ByteAnswerPayload {
    const MSG_TYPE: MsgType = MsgType::ByteAnswer;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + self.blob.len());

        buf.write_u32::<LittleEndian>(self.row_label).unwrap();
        buf.write_u16::<LittleEndian>(self.entry_len).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap(); // reserved
        buf.write_u32::<LittleEndian>(self.blob.len() as u32)
            .unwrap();
        buf.write_all(&self.blob).unwrap();

        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 12 {
            return Err(ProtocolError::Truncated("BYTE_ANSWER"));
        }

        let mut cursor = Cursor::new(data);

        let row_label = cursor.read_u32::<LittleEndian>()?;
        let entry_len = cursor.read_u16::<LittleEndian>()?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let blob_len = cursor.read_u32::<LittleEndian>()? as usize;

        if blob_len != SLOTS_PER_ANSWER * entry_len as usize {
            return Err(ProtocolError::AnswerSize {
                entry_len,
                got: blob_len,
            });
        }

        let pos = cursor.position() as usize;
        if data.len() < pos + blob_len {
            return Err(ProtocolError::Truncated("BYTE_ANSWER"));
        }

        let mut blob = vec![0u8; blob_len];
        cursor.read_exact(&mut blob)?;

        Ok(Self {
            row_label,
            entry_len,
            blob,
        })
    }
}

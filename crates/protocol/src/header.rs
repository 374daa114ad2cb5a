//! Common header (32 bytes)
//!
//! Every frame names the session it belongs to and the round it answers.
//! Handshake frames use round 0; once a session is ready, client requests
//! carry strictly increasing rounds starting at 1 and the server echoes them.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::constants::{HEADER_LEN, SESSION_ID_LEN};
use crate::error::{ProtocolError, Result};

/// Session identifier (16 bytes)
pub type SessionId = [u8; SESSION_ID_LEN];

/// Common header structure (32 bytes)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Session ID (all-zero for pre-session messages)
    pub session_id: SessionId,
    /// Round index (0 during the handshake)
    pub round: u64,
    /// Flags bitfield (v1 uses 0)
    pub flags: u32,
    /// Reserved (must be 0)
    pub reserved: u32,
}

impl Header {
    /// Create a new header with the given session ID and round index
    pub fn new(session_id: SessionId, round: u64) -> Self {
        Self {
            session_id,
            round,
            ..Default::default()
        }
    }

    /// Create a pre-session header
    pub fn pre_session() -> Self {
        Self::default()
    }

    /// Encode the header to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN as usize);
        self.write_to(&mut buf).expect("Vec write should not fail");
        buf
    }

    /// Write the header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.session_id)?;
        writer.write_u64::<LittleEndian>(self.round)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.reserved)?;
        Ok(())
    }

    /// Decode a header from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN as usize {
            return Err(ProtocolError::BufferTooShort {
                need: HEADER_LEN as usize,
                have: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);

        let mut session_id = [0u8; SESSION_ID_LEN];
        cursor.read_exact(&mut session_id)?;

        let round = cursor.read_u64::<LittleEndian>()?;
        let flags = cursor.read_u32::<LittleEndian>()?;
        let reserved = cursor.read_u32::<LittleEndian>()?;

        Ok(Self {
            session_id,
            round,
            flags,
            reserved,
        })
    }

    /// Check if this is a pre-session header (session_id is all zeros)
    pub fn is_pre_session(&self) -> bool {
        self.session_id == [0u8; SESSION_ID_LEN]
    }

    /// Header for the reply to this one: same session, same round
    pub fn echo(&self) -> Self {
        Self::new(self.session_id, self.round)
    }
}

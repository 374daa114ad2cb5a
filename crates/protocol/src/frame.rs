//! Frame encoding/decoding
//!
//! ```text
//! preamble  22 bytes  magic "OIDS", version, msg_type, header_len (u16),
//!                     payload_len, header_crc, payload_crc (u32)
//! header    32 bytes  session id, round, flags, reserved
//! payload   payload_len bytes, within the bounds of its message type
//! ```
//!
//! One frame is one request or reply body: decoding rejects trailing bytes.
//! The payload length is checked against the message type before any CRC
//! is computed or payload copied.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::constants::{MsgType, HEADER_LEN, MAGIC, PREAMBLE_LEN, PROTOCOL_VERSION};
use crate::error::{ProtocolError, Result};
use crate::header::Header;

/// Fixed-size part of a frame, read before anything is allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Preamble {
    msg_type: MsgType,
    payload_len: usize,
    header_crc: u32,
    payload_crc: u32,
}

impl Preamble {
    fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        buf.extend_from_slice(&self.msg_type.to_u16().to_le_bytes());
        buf.extend_from_slice(&HEADER_LEN.to_le_bytes());
        buf.extend_from_slice(&(self.payload_len as u32).to_le_bytes());
        buf.extend_from_slice(&self.header_crc.to_le_bytes());
        buf.extend_from_slice(&self.payload_crc.to_le_bytes());
    }

    fn read(data: &[u8]) -> Result<Self> {
        if data.len() < PREAMBLE_LEN {
            return Err(ProtocolError::BufferTooShort {
                need: PREAMBLE_LEN,
                have: data.len(),
            });
        }
        let mut cursor = Cursor::new(&data[..PREAMBLE_LEN]);

        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        let version = cursor.read_u16::<LittleEndian>()?;
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }

        let raw_type = cursor.read_u16::<LittleEndian>()?;
        let msg_type =
            MsgType::from_u16(raw_type).ok_or(ProtocolError::UnknownMessageType(raw_type))?;

        let header_len = cursor.read_u16::<LittleEndian>()?;
        if header_len != HEADER_LEN {
            return Err(ProtocolError::InvalidHeaderLength {
                expected: HEADER_LEN,
                got: header_len,
            });
        }

        let payload_len = cursor.read_u32::<LittleEndian>()? as usize;
        let (min, max) = msg_type.payload_len_bounds();
        if payload_len < min || payload_len > max {
            return Err(ProtocolError::PayloadLength {
                msg_type,
                len: payload_len,
                min,
                max,
            });
        }

        Ok(Self {
            msg_type,
            payload_len,
            header_crc: cursor.read_u32::<LittleEndian>()?,
            payload_crc: cursor.read_u32::<LittleEndian>()?,
        })
    }

    fn frame_len(&self) -> usize {
        PREAMBLE_LEN + HEADER_LEN as usize + self.payload_len
    }
}

fn check_crc(bytes: &[u8], expected: u32, header: bool) -> Result<()> {
    let got = crc32fast::hash(bytes);
    match (got == expected, header) {
        (true, _) => Ok(()),
        (false, true) => Err(ProtocolError::HeaderCrcMismatch { expected, got }),
        (false, false) => Err(ProtocolError::PayloadCrcMismatch { expected, got }),
    }
}

/// A complete wire frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub msg_type: MsgType,
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(msg_type: MsgType, header: Header, payload: Vec<u8>) -> Self {
        Self {
            msg_type,
            header,
            payload,
        }
    }

    /// Encode the frame to bytes
    pub fn encode(&self) -> Vec<u8> {
        let header = self.header.encode();
        let preamble = Preamble {
            msg_type: self.msg_type,
            payload_len: self.payload.len(),
            header_crc: crc32fast::hash(&header),
            payload_crc: crc32fast::hash(&self.payload),
        };

        let mut buf = Vec::with_capacity(preamble.frame_len());
        preamble.write(&mut buf);
        buf.extend_from_slice(&header);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decode exactly one frame
    pub fn decode(data: &[u8]) -> Result<Self> {
        let preamble = Preamble::read(data)?;

        let need = preamble.frame_len();
        if data.len() < need {
            return Err(ProtocolError::BufferTooShort {
                need,
                have: data.len(),
            });
        }
        if data.len() > need {
            return Err(ProtocolError::TrailingBytes(data.len() - need));
        }

        let (header_bytes, payload) = data[PREAMBLE_LEN..].split_at(HEADER_LEN as usize);
        check_crc(header_bytes, preamble.header_crc, true)?;
        check_crc(payload, preamble.payload_crc, false)?;

        Ok(Self {
            msg_type: preamble.msg_type,
            header: Header::decode(header_bytes)?,
            payload: payload.to_vec(),
        })
    }

    /// Total encoded size of this frame
    pub fn encoded_size(&self) -> usize {
        PREAMBLE_LEN + HEADER_LEN as usize + self.payload.len()
    }
}

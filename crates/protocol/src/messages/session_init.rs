//! SESSION_INIT message payload

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::constants::{MsgType, OtSuiteId, DIGEST_LEN};
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;

/// SESSION_INIT payload (Client → Server)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInitPayload {
    /// Client capabilities bitmap
    pub client_caps: u32,
    /// Requested OT suite
    pub ot_suite: u16,
    /// SHA-256 of the GDFA package the client will evaluate against
    pub package_digest: [u8; DIGEST_LEN],
}

impl SessionInitPayload {
    pub fn new(package_digest: [u8; DIGEST_LEN]) -> Self {
        Self {
            client_caps: 0,
            ot_suite: OtSuiteId::RistrettoKos256.to_u16(),
            package_digest,
        }
    }
}

impl Payload for SessionInitPayload {
    const MSG_TYPE: MsgType = MsgType::SessionInit;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + DIGEST_LEN);

        buf.write_u32::<LittleEndian>(self.client_caps).unwrap();
        buf.write_u16::<LittleEndian>(self.ot_suite).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap(); // reserved
        buf.write_all(&self.package_digest).unwrap();

        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 8 + DIGEST_LEN {
            return Err(ProtocolError::Truncated("SESSION_INIT"));
        }

        let mut cursor = Cursor::new(data);

        let client_caps = cursor.read_u32::<LittleEndian>()?;
        let ot_suite = cursor.read_u16::<LittleEndian>()?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let mut package_digest = [0u8; DIGEST_LEN];
        cursor.read_exact(&mut package_digest)?;

        if OtSuiteId::from_u16(ot_suite).is_none() {
            return Err(ProtocolError::UnsupportedSuite(ot_suite));
        }

        Ok(Self {
            client_caps,
            ot_suite,
            package_digest,
        })
    }
}

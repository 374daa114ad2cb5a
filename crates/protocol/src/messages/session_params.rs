//! SESSION_PARAMS message payload

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use crate::constants::{MsgType, OtSuiteId, DIGEST_LEN, SESSION_PARAMS_LEN};
use crate::error::{ProtocolError, Result};
use crate::messages::Payload;



/// SESSION_PARAMS payload (Server → Client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParamsPayload {
    /// Selected OT suite ID
    pub selected_ot_suite: u16,
    /// Number of base OTs (kappa)
    pub kappa: u16,
    /// Statistical security parameter
    pub ssp: u16,
    /// Cells per GDFA row
    pub outmax: u16,
    /// Key slots per 1-of-256 entry
    pub cmax: u16,
    /// Bytes per 1-of-256 entry
    pub entry_len: u16,
    /// Session time-to-live in seconds
    pub session_ttl_sec: u32,
    /// Maximum rounds allowed in session
    pub max_rounds: u32,
    /// Preferred number of random OTs per extension batch
    pub ot_batch: u32,
    /// Digest of the package this server answers for
    pub package_digest: [u8; DIGEST_LEN],
}

impl Default for SessionParamsPayload {
    fn default() -> Self {
        Self {
            selected_ot_suite: OtSuiteId::RistrettoKos256.to_u16(),
            kappa: 128,
            ssp: 40,
            outmax: 1,
            cmax: 1,
            entry_len: 18,
            session_ttl_sec: 900,
            max_rounds: 1 << 20,
            ot_batch: 1024,
            package_digest: [0u8; DIGEST_LEN],
        }
    }
}

impl Payload for SessionParamsPayload {
    const MSG_TYPE: MsgType = MsgType::SessionParams;

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SESSION_PARAMS_LEN);

        buf.write_u16::<LittleEndian>(self.selected_ot_suite)
            .unwrap();
        buf.write_u16::<LittleEndian>(self.kappa).unwrap();
        buf.write_u16::<LittleEndian>(self.ssp).unwrap();
        buf.write_u16::<LittleEndian>(self.outmax).unwrap();
        buf.write_u16::<LittleEndian>(self.cmax).unwrap();
        buf.write_u16::<LittleEndian>(self.entry_len).unwrap();
        buf.write_u32::<LittleEndian>(self.session_ttl_sec).unwrap();
        buf.write_u32::<LittleEndian>(self.max_rounds).unwrap();
        buf.write_u32::<LittleEndian>(self.ot_batch).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap(); // reserved
        buf.write_all(&self.package_digest).unwrap();

        buf
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < SESSION_PARAMS_LEN {
            return Err(ProtocolError::Truncated("SESSION_PARAMS"));
        }

        let mut cursor = Cursor::new(data);

        let selected_ot_suite = cursor.read_u16::<LittleEndian>()?;
        let kappa = cursor.read_u16::<LittleEndian>()?;
        let ssp = cursor.read_u16::<LittleEndian>()?;
        let outmax = cursor.read_u16::<LittleEndian>()?;
        let cmax = cursor.read_u16::<LittleEndian>()?;
        let entry_len = cursor.read_u16::<LittleEndian>()?;
        let session_ttl_sec = cursor.read_u32::<LittleEndian>()?;
        let max_rounds = cursor.read_u32::<LittleEndian>()?;
        let ot_batch = cursor.read_u32::<LittleEndian>()?;
        let _reserved = cursor.read_u32::<LittleEndian>()?;
        let mut package_digest = [0u8; DIGEST_LEN];
        cursor.read_exact(&mut package_digest)?;

        if outmax == 0 || cmax == 0 {
            return Err(ProtocolError::InvalidParameter(
                "outmax and cmax must be positive".to_string(),
            ));
        }

        Ok(Self {
            selected_ot_suite,
            kappa,
            ssp,
            outmax,
            cmax,
            entry_len,
            session_ttl_sec,
            max_rounds,
            ot_batch,
            package_digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_params_roundtrip() {
        let payload = SessionParamsPayload {
            outmax: 4,
            cmax: 2,
            entry_len: 36,
            package_digest: [0xAB; DIGEST_LEN],
            ..Default::default()
        };
        let encoded = payload.encode();
        assert_eq!(encoded.len(), SESSION_PARAMS_LEN);
        let decoded = SessionParamsPayload::decode(&encoded).unwrap();
        assert_eq!(payload, decoded);
    }

    #[test]
    fn test_zero_outmax_rejected() {
        let payload = SessionParamsPayload {
            outmax: 0,
            ..Default::default()
        };
        let result = SessionParamsPayload::decode(&payload.encode());
        assert!(matches!(result, Err(ProtocolError::InvalidParameter(_))));
    }
}

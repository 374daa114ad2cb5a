//! Protocol constants

/// Protocol magic bytes: "OIDS"
pub const MAGIC: [u8; 4] = [0x4F, 0x49, 0x44, 0x53];

/// Protocol version (v1)
pub const PROTOCOL_VERSION: u16 = 0x0001;

/// Fixed header length in bytes (v1)
pub const HEADER_LEN: u16 = 32;

/// Session ID length in bytes
pub const SESSION_ID_LEN: usize = 16;

/// SHA-256 digest length used to pin a GDFA package
pub const DIGEST_LEN: usize = 32;

/// Frame preamble length in bytes
pub const PREAMBLE_LEN: usize = 22;

/// Largest payload any frame may carry
pub const MAX_PAYLOAD_LEN: usize = 1 << 24;

/// Flip bytes in one 1-of-256 query blob
pub const QUERY_BLOB_LEN: usize = 1;

/// BYTE_QUERY payload: row label, blob length, blob
pub const BYTE_QUERY_LEN: usize = 8 + QUERY_BLOB_LEN;

/// Compressed group element carried by BASE_OT_MSG
pub const POINT_LEN: usize = 32;

/// Most points one BASE_OT_MSG may carry
pub const MAX_BASE_OT_POINTS: usize = 256;

/// SESSION_INIT payload: caps, suite, reserved, package digest
pub const SESSION_INIT_LEN: usize = 8 + DIGEST_LEN;

/// SESSION_PARAMS payload
pub const SESSION_PARAMS_LEN: usize = 28 + DIGEST_LEN;

/// EXTEND_RESPONSE payload: batch, accepted
pub const EXTEND_RESPONSE_LEN: usize = 8;

/// ERROR payload prefix: code, detail, message length
pub const ERROR_PREFIX_LEN: usize = 14;

/// Longest message text carried by an ERROR frame
pub const MAX_ERROR_MESSAGE_LEN: usize = 256;

/// Message type identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MsgType {
    /// Session initialization request (Client → Server)
    SessionInit = 0x0001,
    /// Session parameters response (Server → Client)
    SessionParams = 0x0002,
    /// Base OT handshake message (Bidirectional)
    BaseOtMsg = 0x0003,
    /// OT extension batch (Client → Server)
    ExtendRequest = 0x0010,
    /// OT extension acknowledgement (Server → Client)
    ExtendResponse = 0x0011,
    /// 1-of-256 query for one input byte (Client → Server)
    ByteQuery = 0x0020,
    /// 1-of-256 answer for one input byte (Server → Client)
    ByteAnswer = 0x0021,
    /// Error message
    Error = 0x00F0,
}

impl MsgType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(MsgType::SessionInit),
            0x0002 => Some(MsgType::SessionParams),
            0x0003 => Some(MsgType::BaseOtMsg),
            0x0010 => Some(MsgType::ExtendRequest),
            0x0011 => Some(MsgType::ExtendResponse),
            0x0020 => Some(MsgType::ByteQuery),
            0x0021 => Some(MsgType::ByteAnswer),
            0x00F0 => Some(MsgType::Error),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Inclusive range of payload lengths a frame of this type may carry.
    ///
    /// Fixed-size messages have a single admissible length; the rest are
    /// bounded by their fixed prefix and [`MAX_PAYLOAD_LEN`].
    pub fn payload_len_bounds(self) -> (usize, usize) {
        match self {
            MsgType::SessionInit => (SESSION_INIT_LEN, SESSION_INIT_LEN),
            MsgType::SessionParams => (SESSION_PARAMS_LEN, SESSION_PARAMS_LEN),
            MsgType::BaseOtMsg => (8 + POINT_LEN, 8 + MAX_BASE_OT_POINTS * POINT_LEN),
            MsgType::ExtendRequest => (12, MAX_PAYLOAD_LEN),
            MsgType::ExtendResponse => (EXTEND_RESPONSE_LEN, EXTEND_RESPONSE_LEN),
            MsgType::ByteQuery => (BYTE_QUERY_LEN, BYTE_QUERY_LEN),
            MsgType::ByteAnswer => (12, MAX_PAYLOAD_LEN),
            MsgType::Error => (ERROR_PREFIX_LEN, ERROR_PREFIX_LEN + MAX_ERROR_MESSAGE_LEN),
        }
    }
}

/// OT suite identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OtSuiteId {
    /// Chou-Orlandi base OT on Ristretto, KOS-checked IKNP extension,
    /// 1-of-256 by 8-bit composition
    RistrettoKos256 = 0x0201,
}

impl OtSuiteId {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0201 => Some(OtSuiteId::RistrettoKos256),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Error codes
///
/// Every cryptographic validation failure is reported as `ProtocolAborted`
/// so the peer cannot tell which check tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    BadVersion = 0x00000001,
    BadCrc = 0x00000002,
    UnknownMsgType = 0x00000003,
    SessionNotFound = 0x00000004,
    SessionExpired = 0x00000005,
    BadRound = 0x00000006,
    InvalidParam = 0x00000007,
    InvalidRow = 0x00000008,
    PackageMismatch = 0x00000009,
    ProtocolAborted = 0x0000000A,
    Internal = 0x0000000B,
}

impl ErrorCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x00000001 => Some(ErrorCode::BadVersion),
            0x00000002 => Some(ErrorCode::BadCrc),
            0x00000003 => Some(ErrorCode::UnknownMsgType),
            0x00000004 => Some(ErrorCode::SessionNotFound),
            0x00000005 => Some(ErrorCode::SessionExpired),
            0x00000006 => Some(ErrorCode::BadRound),
            0x00000007 => Some(ErrorCode::InvalidParam),
            0x00000008 => Some(ErrorCode::InvalidRow),
            0x00000009 => Some(ErrorCode::PackageMismatch),
            0x0000000A => Some(ErrorCode::ProtocolAborted),
            0x0000000B => Some(ErrorCode::Internal),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        self as u32
    }
}

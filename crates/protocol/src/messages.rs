//! Message payload types

mod session_init;
mod session_params;
mod base_ot;
mod extend;
mod byte_query;
mod error_msg;

pub use session_init::SessionInitPayload;
pub use session_params::SessionParamsPayload;
pub use base_ot::BaseOtMsgPayload;
pub use extend::{ExtendRequestPayload, ExtendResponsePayload};
pub use byte_query::{ByteAnswerPayload, ByteQueryPayload, SLOTS_PER_ANSWER};
pub use error_msg::{ErrorPayload, ABORT_MESSAGE};

use crate::constants::MsgType;
use crate::error::Result;
use crate::frame::Frame;
use crate::header::Header;

/// Trait for message payloads that can be encoded/decoded
pub trait Payload: Sized {
    /// The message type for this payload
    const MSG_TYPE: MsgType;

    /// Encode the payload to bytes
    fn encode(&self) -> Vec<u8>;

    /// Decode the payload from bytes
    fn decode(data: &[u8]) -> Result<Self>;

    /// Create a frame from this payload and a header
    fn into_frame(self, header: Header) -> Frame {
        Frame::new(Self::MSG_TYPE, header, self.encode())
    }
}

/// A parsed message with its header and typed payload
#[derive(Debug, Clone)]
pub enum Message {
    SessionInit {
        header: Header,
        payload: SessionInitPayload,
    },
    SessionParams {
        header: Header,
        payload: SessionParamsPayload,
    },
    BaseOtMsg {
        header: Header,
        payload: BaseOtMsgPayload,
    },
    ExtendRequest {
        header: Header,
        payload: ExtendRequestPayload,
    },
    ExtendResponse {
        header: Header,
        payload: ExtendResponsePayload,
    },
    ByteQuery {
        header: Header,
        payload: ByteQueryPayload,
    },
    ByteAnswer {
        header: Header,
        payload: ByteAnswerPayload,
    },
    Error {
        header: Header,
        payload: ErrorPayload,
    },
}

impl Message {
    /// Parse a frame into a typed message
    pub fn from_frame(frame: Frame) -> Result<Self> {
        match frame.msg_type {
            MsgType::SessionInit => Ok(Message::SessionInit {
                header: frame.header,
                payload: SessionInitPayload::decode(&frame.payload)?,
            }),
            MsgType::SessionParams => Ok(Message::SessionParams {
                header: frame.header,
                payload: SessionParamsPayload::decode(&frame.payload)?,
            }),
            MsgType::BaseOtMsg => Ok(Message::BaseOtMsg {
                header: frame.header,
                payload: BaseOtMsgPayload::decode(&frame.payload)?,
            }),
            MsgType::ExtendRequest => Ok(Message::ExtendRequest {
                header: frame.header,
                payload: ExtendRequestPayload::decode(&frame.payload)?,
            }),
            MsgType::ExtendResponse => Ok(Message::ExtendResponse {
                header: frame.header,
                payload: ExtendResponsePayload::decode(&frame.payload)?,
            }),
            MsgType::ByteQuery => Ok(Message::ByteQuery {
                header: frame.header,
                payload: ByteQueryPayload::decode(&frame.payload)?,
            }),
            MsgType::ByteAnswer => Ok(Message::ByteAnswer {
                header: frame.header,
                payload: ByteAnswerPayload::decode(&frame.payload)?,
            }),
            MsgType::Error => Ok(Message::Error {
                header: frame.header,
                payload: ErrorPayload::decode(&frame.payload)?,
            }),
        }
    }

    /// Encode this message into a frame
    pub fn into_frame(self) -> Frame {
        match self {
            Message::SessionInit { header, payload } => payload.into_frame(header),
            Message::SessionParams { header, payload } => payload.into_frame(header),
            Message::BaseOtMsg { header, payload } => payload.into_frame(header),
            Message::ExtendRequest { header, payload } => payload.into_frame(header),
            Message::ExtendResponse { header, payload } => payload.into_frame(header),
            Message::ByteQuery { header, payload } => payload.into_frame(header),
            Message::ByteAnswer { header, payload } => payload.into_frame(header),
            Message::Error { header, payload } => payload.into_frame(header),
        }
    }

    /// Header of this message
    pub fn header(&self) -> &Header {
        match self {
            Message::SessionInit { header, .. }
            | Message::SessionParams { header, .. }
            | Message::BaseOtMsg { header, .. }
            | Message::ExtendRequest { header, .. }
            | Message::ExtendResponse { header, .. }
            | Message::ByteQuery { header, .. }
            | Message::ByteAnswer { header, .. }
            | Message::Error { header, .. } => header,
        }
    }

    /// Encode this message into bytes
    pub fn encode(&self) -> Vec<u8> {
        self.clone().into_frame().encode()
    }

    /// Decode a message from bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let frame = Frame::decode(data)?;
        Self::from_frame(frame)
    }
}

//! Oblivids Protocol Crate
//!
//! Wire format for the oblivious GDFA scanning exchange.
//! Implements framing, the session/round header, message payloads and CRC validation.

mod constants;
mod error;
mod frame;
mod header;
mod messages;

pub use constants::*;
pub use error::{ProtocolError, Result};
pub use frame::Frame;
pub use header::{Header, SessionId};
pub use messages::*;

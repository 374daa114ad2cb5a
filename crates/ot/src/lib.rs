//! Oblivids Oblivious Transfer
//!
//! Chou-Orlandi base OT, KOS-checked OT extension and the derandomized
//! 1-of-256 OT the scan protocol spends per input byte, plus the session
//! state and framed roles that carry them.

pub mod crypto;
mod error;
mod base;
mod kos;
mod pool;
mod ot256;
mod facade;
mod session;
mod sender;
mod receiver;

#[cfg(test)]
mod adversarial_tests;

pub use error::{ErrorKind, OtError, Result};
pub use base::{decode_point, BaseOtReceiver, BaseOtSender};
pub use kos::{extend_blob_len, padded_rows, KosReceiver, KosSender, ReceiverOt, SenderOt};
pub use pool::OtPool;
pub use ot256::{SlotTable, CHOICE_BITS, SLOTS};
pub use facade::{ClientOt, ServerOt, QUERY_BLOB_LEN};
pub use session::{generate_session_id, OtSession, OtSessionConfig, OtSessionState};
pub use sender::{OtSender, PackageInfo};
pub use receiver::OtReceiver;

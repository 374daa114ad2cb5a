//! Oblivids Server
//!
//! HTTP front end for the oblivious scanning protocol:
//! - Session management (create, expire)
//! - Package download and table information
//! - One frame endpoint carrying the handshake, extension batches and
//!   byte queries
//!
//! The server never sees the scanned bytes; it answers every byte query
//! with all 256 entries of the requested row, masked by OT.

pub mod config;
pub mod error;
pub mod session;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, Result};
pub use state::AppState;

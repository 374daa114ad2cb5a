//! Session management
//!
//! Each session owns one OT sender bound to the shared slot table:
//! - base OT keys and the extension pools
//! - the round counter
//! - expiration tracking
//!
//! An aborted session is dropped from the store together with its key
//! material; the client has to start over with a new session.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use oblivids_gdfa::ServerTable;
use oblivids_ot::{OtSender, OtSessionConfig, OtSessionState, PackageInfo};
use oblivids_protocol::Message;

use crate::error::{Result, ServerError};

/// Session status (for the status endpoint)
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionStatus {
    /// Session ID
    pub id: Uuid,
    /// Whether the OT handshake is complete
    pub ready: bool,
    /// Remaining TTL in seconds
    pub ttl_secs: i64,
}

/// Session state
pub struct Session {
    /// Unique session ID (also the protocol session ID)
    pub id: Uuid,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,

    /// OT sender state (wrapped for interior mutability)
    ot_sender: Mutex<OtSender<ServerTable>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("ot_sender", &"<OtSender>")
            .finish()
    }
}

fn expiry(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(900))
}

impl Session {
    /// Create a new session answering from `table`
    pub fn new(
        ttl: Duration,
        ot_config: OtSessionConfig,
        table: Arc<ServerTable>,
        package: PackageInfo,
    ) -> Self {
        let id = Uuid::new_v4();
        let sender = OtSender::new(table, ot_config, package).with_session_id(*id.as_bytes());

        Self {
            id,
            created_at: Utc::now(),
            expires_at: expiry(ttl),
            ot_sender: Mutex::new(sender),
        }
    }

    /// Check if session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Get remaining TTL in seconds
    pub fn ttl_secs(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }

    /// Extend the session TTL by the given duration
    pub fn touch(&mut self, ttl: Duration) {
        self.expires_at = expiry(ttl);
    }

    pub fn is_ready(&self) -> bool {
        self.ot_sender.lock().is_ready()
    }

    /// Protocol state of the OT sender
    pub fn state(&self) -> OtSessionState {
        self.ot_sender.lock().state()
    }

    /// Run one protocol message through the OT sender
    pub fn handle(&self, message: Message) -> Message {
        self.ot_sender.lock().handle(message)
    }
}

/// Session store
pub struct SessionStore {
    /// Active sessions
    sessions: DashMap<Uuid, Session>,

    /// Maximum sessions allowed
    max_sessions: usize,

    /// Default TTL for new sessions
    default_ttl: Duration,

    /// OT config for new sessions
    ot_config: OtSessionConfig,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(max_sessions: usize, default_ttl: Duration, ot_config: OtSessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            max_sessions,
            default_ttl,
            ot_config,
        }
    }

    /// Create a new session over the shared table
    pub fn create_session(&self, table: Arc<ServerTable>, package: PackageInfo) -> Result<Uuid> {
        if self.sessions.len() >= self.max_sessions {
            // Try to clean up expired sessions first
            self.cleanup_expired();

            if self.sessions.len() >= self.max_sessions {
                return Err(ServerError::SessionLimit);
            }
        }

        let session = Session::new(self.default_ttl, self.ot_config.clone(), table, package);
        let id = session.id;
        self.sessions.insert(id, session);
        Ok(id)
    }

    /// Get a live session, extending its TTL
    pub fn get_mut(&self, id: &Uuid) -> Result<dashmap::mapref::one::RefMut<'_, Uuid, Session>> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))?;

        if session.is_expired() {
            drop(session);
            self.sessions.remove(id);
            return Err(ServerError::SessionExpired(id.to_string()));
        }

        // Auto-extend TTL on activity (touch)
        session.touch(self.default_ttl);

        Ok(session)
    }

    /// Feed one protocol message to a session and return its reply.
    ///
    /// Sessions that abort or run out of rounds are removed afterwards.
    pub fn dispatch(&self, id: &Uuid, message: Message) -> Result<Message> {
        let session = self.get_mut(id)?;
        let reply = session.handle(message);
        let state = session.state();
        drop(session);

        if matches!(state, OtSessionState::Aborted | OtSessionState::Expired) {
            tracing::info!(session_id = %id, ?state, "session closed");
            self.sessions.remove(id);
        }
        Ok(reply)
    }

    /// Get session status without modifying it
    pub fn status(&self, id: &Uuid) -> Result<SessionStatus> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| ServerError::SessionNotFound(id.to_string()))?;

        // Check expiration (but don't remove - status is read-only)
        if session.is_expired() {
            return Err(ServerError::SessionExpired(id.to_string()));
        }

        Ok(SessionStatus {
            id: session.id,
            ready: session.is_ready(),
            ttl_secs: session.ttl_secs(),
        })
    }

    /// Get default TTL
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn ot_config(&self) -> &OtSessionConfig {
        &self.ot_config
    }

    /// Remove a session
    pub fn remove(&self, id: &Uuid) -> Option<Session> {
        self.sessions.remove(id).map(|(_, s)| s)
    }

    /// Clean up expired sessions
    pub fn cleanup_expired(&self) {
        self.sessions.retain(|_, session| !session.is_expired());
        tracing::debug!(remaining = self.sessions.len(), "cleaned up sessions");
    }

    /// Get current session count
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Shared session store
pub type SharedSessionStore = Arc<SessionStore>;

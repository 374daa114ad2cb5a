//! OT Session management

use rand::RngCore;
use std::time::{Duration, Instant};

use oblivids_protocol::SessionId;

use crate::error::{OtError, Result};

/// Generate a new random session ID
pub fn generate_session_id() -> SessionId {
    let mut id = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut id);
    id
}

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtSessionState {
    /// Waiting for initialization
    Uninitialized,
    /// Base OT in progress
    BaseOtInProgress,
    /// Session ready for extension and byte queries
    Ready,
    /// TTL or round budget used up
    Expired,
    /// A check failed or the peer misbehaved; never recovers
    Aborted,
}

/// OT Session configuration
#[derive(Debug, Clone)]
pub struct OtSessionConfig {
    /// Session time-to-live
    pub ttl: Duration,
    /// Maximum rounds after the handshake
    pub max_rounds: u32,
    /// Preferred random OTs per extension batch
    pub ot_batch: u32,
    /// Largest extension batch the server accepts
    pub max_extend: u32,
}

impl Default for OtSessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(900),
            max_rounds: 1 << 20,
            ot_batch: 1024,
            max_extend: 1 << 16,
        }
    }
}

/// Per-session state shared by both roles: identity, lifecycle and rounds
#[derive(Debug)]
pub struct OtSession {
    /// Session ID
    pub id: SessionId,
    /// Current state
    pub state: OtSessionState,
    /// Session configuration
    pub config: OtSessionConfig,
    /// Round the next request must carry (starts at 1 once ready)
    pub round: u64,
    /// Rounds consumed so far
    pub rounds_used: u32,
    /// Session creation time
    pub created_at: Instant,
    /// Base OT phase counter
    pub base_ot_phase: u16,
}

impl OtSession {
    /// Create a new uninitialized session
    pub fn new(config: OtSessionConfig) -> Self {
        Self {
            id: [0u8; 16],
            state: OtSessionState::Uninitialized,
            config,
            round: 0,
            rounds_used: 0,
            created_at: Instant::now(),
            base_ot_phase: 0,
        }
    }

    /// Initialize the session with a new ID
    pub fn initialize(&mut self) -> Result<SessionId> {
        self.initialize_with_id(generate_session_id())?;
        Ok(self.id)
    }

    /// Initialize with a specific ID (for client accepting server's ID)
    pub fn initialize_with_id(&mut self, id: SessionId) -> Result<()> {
        if self.state != OtSessionState::Uninitialized {
            return Err(OtError::SessionAlreadyInitialized);
        }
        if id == [0u8; 16] {
            return Err(OtError::InvalidSessionId);
        }
        self.id = id;
        self.state = OtSessionState::BaseOtInProgress;
        self.base_ot_phase = 1;
        self.created_at = Instant::now();
        Ok(())
    }

    /// Advance base OT phase
    pub fn advance_base_ot_phase(&mut self) -> u16 {
        self.base_ot_phase += 1;
        self.base_ot_phase
    }

    /// Mark session as ready
    pub fn mark_ready(&mut self) -> Result<()> {
        if self.state != OtSessionState::BaseOtInProgress {
            return Err(OtError::SessionNotInitialized);
        }
        self.state = OtSessionState::Ready;
        self.round = 1; // First request uses round 1
        Ok(())
    }

    /// Check if session is ready
    pub fn is_ready(&self) -> bool {
        self.state == OtSessionState::Ready
    }

    /// Check if session has expired
    pub fn is_expired(&self) -> bool {
        self.state == OtSessionState::Expired
            || self.created_at.elapsed() > self.config.ttl
            || self.rounds_used >= self.config.max_rounds
    }

    /// Move to `Aborted`; every later message is refused
    pub fn abort(&mut self) {
        self.state = OtSessionState::Aborted;
    }

    pub fn is_aborted(&self) -> bool {
        self.state == OtSessionState::Aborted
    }

    /// Refuse work on an aborted or expired session
    pub fn ensure_live(&mut self) -> Result<()> {
        match self.state {
            OtSessionState::Aborted => Err(OtError::SessionAborted),
            OtSessionState::Expired => Err(OtError::SessionExpired),
            OtSessionState::Uninitialized => Err(OtError::SessionNotInitialized),
            _ if self.is_expired() => {
                self.state = OtSessionState::Expired;
                Err(OtError::SessionExpired)
            }
            _ => Ok(()),
        }
    }

    /// Validate and consume a request with the given round.
    ///
    /// A mismatch (replay, skip or reorder) aborts the session.
    pub fn validate_round(&mut self, round: u64) -> Result<()> {
        self.ensure_live()?;
        if !self.is_ready() {
            return Err(OtError::SessionNotInitialized);
        }
        if round != self.round {
            let expected = self.round;
            self.abort();
            return Err(OtError::RoundMismatch {
                expected,
                got: round,
            });
        }
        self.round += 1;
        self.rounds_used += 1;
        Ok(())
    }

    /// Round the next request will carry
    pub fn next_round(&self) -> u64 {
        self.round
    }

    /// Time left before the TTL runs out
    pub fn remaining_ttl(&self) -> Duration {
        self.config.ttl.saturating_sub(self.created_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_lifecycle() {
        let mut session = OtSession::new(OtSessionConfig::default());
        assert_eq!(session.state, OtSessionState::Uninitialized);

        let id = session.initialize().unwrap();
        assert_eq!(session.state, OtSessionState::BaseOtInProgress);
        assert_eq!(session.id, id);

        session.mark_ready().unwrap();
        assert_eq!(session.state, OtSessionState::Ready);
        assert_eq!(session.round, 1);

        session.validate_round(1).unwrap();
        assert_eq!(session.round, 2);

        session.validate_round(2).unwrap();
        assert_eq!(session.round, 3);
    }

    #[test]
    fn test_round_mismatch_aborts() {
        let mut session = OtSession::new(OtSessionConfig::default());
        session.initialize().unwrap();
        session.mark_ready().unwrap();

        let result = session.validate_round(5);
        assert!(matches!(
            result,
            Err(OtError::RoundMismatch {
                expected: 1,
                got: 5
            })
        ));
        assert!(session.is_aborted());

        // Even the correct round is refused afterwards
        assert!(matches!(
            session.validate_round(1),
            Err(OtError::SessionAborted)
        ));
    }

    #[test]
    fn test_replayed_round_aborts() {
        let mut session = OtSession::new(OtSessionConfig::default());
        session.initialize().unwrap();
        session.mark_ready().unwrap();

        session.validate_round(1).unwrap();
        assert!(matches!(
            session.validate_round(1),
            Err(OtError::RoundMismatch { .. })
        ));
    }

    #[test]
    fn test_round_budget_expires() {
        let config = OtSessionConfig {
            max_rounds: 2,
            ..Default::default()
        };
        let mut session = OtSession::new(config);
        session.initialize().unwrap();
        session.mark_ready().unwrap();

        session.validate_round(1).unwrap();
        session.validate_round(2).unwrap();
        assert!(matches!(
            session.validate_round(3),
            Err(OtError::SessionExpired)
        ));
        assert_eq!(session.state, OtSessionState::Expired);
    }

    #[test]
    fn test_zero_ttl_expires() {
        let config = OtSessionConfig {
            ttl: Duration::ZERO,
            ..Default::default()
        };
        let mut session = OtSession::new(config);
        session.initialize().unwrap();
        session.mark_ready().unwrap();
        std::thread::sleep(Duration::from_millis(2));

        assert!(matches!(
            session.validate_round(1),
            Err(OtError::SessionExpired)
        ));
    }

    #[test]
    fn test_double_initialize() {
        let mut session = OtSession::new(OtSessionConfig::default());
        session.initialize().unwrap();

        let result = session.initialize();
        assert!(matches!(result, Err(OtError::SessionAlreadyInitialized)));
    }
}

//! Server configuration

use std::path::PathBuf;
use std::time::Duration;

use oblivids_ot::OtSessionConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: String,

    /// Server port
    pub port: u16,

    /// Rule set compiled to a DFA (JSON)
    pub dfa_path: Option<PathBuf>,

    /// Row width override; defaults to the smallest the DFA allows
    pub outmax: Option<u16>,

    /// Token width override; defaults to the smallest the DFA allows
    pub cmax: Option<u16>,

    /// Maximum concurrent sessions
    pub max_sessions: usize,

    /// Session time-to-live
    pub session_ttl: Duration,

    /// Maximum rounds per session
    pub max_rounds: u32,

    /// Random OTs per extension batch
    pub ot_batch: u32,

    /// Seed for a reproducible garbled table (testing only)
    pub build_seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            dfa_path: None,
            outmax: None,
            cmax: None,
            max_sessions: 1000,
            session_ttl: Duration::from_secs(900), // 15 minutes
            max_rounds: 1 << 20,
            ot_batch: 1024,
            build_seed: None,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup; unparsable values keep the default
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let parsed_u16 = |key: &str| parsed(key).and_then(|v| u16::try_from(v).ok());

        if let Some(addr) = lookup("OBLIVIDS_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(port) = parsed_u16("OBLIVIDS_PORT") {
            config.port = port;
        }
        if let Some(path) = lookup("OBLIVIDS_DFA_PATH") {
            config.dfa_path = Some(PathBuf::from(path));
        }
        config.outmax = parsed_u16("OBLIVIDS_OUTMAX");
        config.cmax = parsed_u16("OBLIVIDS_CMAX");

        if let Some(max) = parsed("OBLIVIDS_MAX_SESSIONS") {
            config.max_sessions = max as usize;
        }
        if let Some(ttl) = parsed("OBLIVIDS_SESSION_TTL_SECS") {
            config.session_ttl = Duration::from_secs(ttl);
        }
        if let Some(rounds) = parsed("OBLIVIDS_MAX_ROUNDS") {
            config.max_rounds = rounds as u32;
        }
        if let Some(batch) = parsed("OBLIVIDS_OT_BATCH") {
            config.ot_batch = batch as u32;
        }
        config.build_seed = parsed("OBLIVIDS_BUILD_SEED");

        config
    }

    /// Get the full bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// Per-session OT limits
    pub fn ot_config(&self) -> OtSessionConfig {
        OtSessionConfig {
            ttl: self.session_ttl,
            max_rounds: self.max_rounds,
            ot_batch: self.ot_batch,
            ..Default::default()
        }
    }
}

//! Application state

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use oblivids_gdfa::{Dfa, GdfaBuilder, GdfaPackage, ServerTable, Sparsity};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::session::{SessionStore, SharedSessionStore};

/// Server metadata for /info endpoint
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub version: String,
    pub git_commit: Option<String>,
    pub started_at: Instant,
}

/// The garbled rule set every session answers from
pub struct LoadedGdfa {
    pub package: GdfaPackage,
    pub table: Arc<ServerTable>,
    /// Serialized package served to clients
    pub package_bytes: Vec<u8>,
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Session store
    pub sessions: SharedSessionStore,

    /// Garbled DFA (built at startup)
    pub gdfa: Arc<Option<LoadedGdfa>>,

    /// Server info
    pub info: Arc<ServerInfo>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServerConfig) -> Self {
        let sessions = Arc::new(SessionStore::new(
            config.max_sessions,
            config.session_ttl,
            config.ot_config(),
        ));

        let info = ServerInfo {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_commit: option_env!("GIT_COMMIT").map(String::from),
            started_at: Instant::now(),
        };

        Self {
            config: Arc::new(config),
            sessions,
            gdfa: Arc::new(None),
            info: Arc::new(info),
        }
    }

    /// Load the DFA named in the config and garble it
    pub async fn load_gdfa(&mut self) -> Result<()> {
        let path = self
            .config
            .dfa_path
            .clone()
            .ok_or_else(|| ServerError::Internal("OBLIVIDS_DFA_PATH not set".to_string()))?;

        tracing::info!(path = ?path, "loading DFA");

        let config = Arc::clone(&self.config);
        let loaded = tokio::task::spawn_blocking(move || {
            let dfa = load_dfa(&path)?;
            build_gdfa(&config, dfa)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("Task join error: {}", e)))??;

        self.install(loaded);
        Ok(())
    }

    /// Garble `dfa` synchronously and install it
    pub fn with_dfa(mut self, dfa: Dfa) -> Result<Self> {
        let loaded = build_gdfa(&self.config, dfa)?;
        self.install(loaded);
        Ok(self)
    }

    fn install(&mut self, loaded: LoadedGdfa) {
        let header = loaded.package.header();
        tracing::info!(
            rows = header.row_count,
            outmax = header.outmax,
            cmax = header.cmax,
            digest = %hex::encode(loaded.package.digest()),
            "garbled DFA installed"
        );
        self.gdfa = Arc::new(Some(loaded));
    }

    /// Check if server is ready
    pub fn is_ready(&self) -> bool {
        self.gdfa.is_some()
    }

    /// Get the garbled DFA (returns error if not loaded)
    pub fn get_gdfa(&self) -> Result<&LoadedGdfa> {
        self.gdfa.as_ref().as_ref().ok_or(ServerError::GdfaNotLoaded)
    }

    /// Get uptime
    pub fn uptime(&self) -> std::time::Duration {
        self.info.started_at.elapsed()
    }
}

fn load_dfa(path: &Path) -> Result<Dfa> {
    let file = std::fs::File::open(path)
        .map_err(|e| ServerError::Internal(format!("cannot open {:?}: {}", path, e)))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .map_err(|e| ServerError::Internal(format!("cannot parse {:?}: {}", path, e)))
}

/// Build the garbled table; sparsity defaults to the smallest the DFA admits
fn build_gdfa(config: &ServerConfig, dfa: Dfa) -> Result<LoadedGdfa> {
    let minimal = dfa.min_sparsity()?;
    let sparsity = Sparsity::new(
        config.outmax.unwrap_or(minimal.outmax),
        config.cmax.unwrap_or(minimal.cmax),
    )?;

    let mut rng = match config.build_seed {
        Some(seed) => {
            tracing::warn!("building with a fixed seed; do not use in production");
            ChaCha20Rng::seed_from_u64(seed)
        }
        None => ChaCha20Rng::from_entropy(),
    };

    let (package, table) = GdfaBuilder::new(dfa, sparsity, &mut rng)?
        .build()
        .into_package()?;
    let package_bytes = package.to_bytes()?;

    Ok(LoadedGdfa {
        package,
        table: Arc::new(table),
        package_bytes,
    })
}

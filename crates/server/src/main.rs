//! Oblivids Server Binary
//!
//! Run with: OBLIVIDS_DFA_PATH=rules.json cargo run -p oblivids-server --release

use std::net::SocketAddr;
use std::time::Duration;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oblivids_server::{routes, AppState, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oblivids_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ServerConfig::from_env();
    tracing::info!("Starting Oblivids Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("DFA path: {:?}", config.dfa_path);
    tracing::info!("Bind address: {}", config.bind_address());

    // Create application state
    let mut state = AppState::new(config.clone());

    // Garble the rule set
    if let Err(e) = state.load_gdfa().await {
        tracing::warn!("Failed to load DFA: {}. Server will start but not be ready.", e);
    }

    // Drop expired sessions in the background
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            sessions.cleanup_expired();
        }
    });

    let app = routes::create_router(state).layer(TraceLayer::new_for_http());

    // Parse bind address
    let addr: SocketAddr = config.bind_address().parse()?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

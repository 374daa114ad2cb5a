//! Session management endpoints

use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::session::SessionStatus;
use crate::state::AppState;

/// Session creation response
#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub protocol_version: u16,
    pub outmax: u16,
    pub cmax: u16,
    pub entry_len: u32,
    /// SHA-256 of the package this session answers for (hex)
    pub package_digest: String,
    pub max_rounds: u32,
    pub ot_batch: u32,
    /// TTL in seconds for this session
    pub ttl_secs: i64,
}

/// Session ID request
#[derive(Deserialize)]
pub struct SessionIdRequest {
    pub session_id: String,
}

/// POST /v1/session/new - Create a new session
pub async fn create_session(State(state): State<AppState>) -> Result<Json<SessionResponse>> {
    let gdfa = state.get_gdfa()?;
    let header = gdfa.package.header();

    let session_id = state
        .sessions
        .create_session(gdfa.table.clone(), gdfa.package.info())?;

    let ttl_secs = state.sessions.default_ttl().as_secs() as i64;
    let ot_config = state.sessions.ot_config();

    tracing::info!(session_id = %session_id, ttl_secs, "Session created");

    Ok(Json(SessionResponse {
        session_id,
        protocol_version: oblivids_protocol::PROTOCOL_VERSION,
        outmax: header.outmax,
        cmax: header.cmax,
        entry_len: header.entry_len,
        package_digest: hex::encode(gdfa.package.digest()),
        max_rounds: ot_config.max_rounds,
        ot_batch: ot_config.ot_batch,
        ttl_secs,
    }))
}

/// POST /v1/session/status - Get session status (without extending TTL)
pub async fn session_status(
    State(state): State<AppState>,
    Json(request): Json<SessionIdRequest>,
) -> Result<Json<SessionStatus>> {
    let session_id = Uuid::parse_str(&request.session_id).map_err(|_| {
        ServerError::InvalidFrame(format!("Invalid session ID: {}", request.session_id))
    })?;

    let status = state.sessions.status(&session_id)?;

    tracing::debug!(session_id = %session_id, ttl_secs = status.ttl_secs, "Session status checked");

    Ok(Json(status))
}

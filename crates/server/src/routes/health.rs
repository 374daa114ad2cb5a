//! Health, readiness, and info endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use oblivids_ot::crypto::{KAPPA, SSP};

use crate::error::Result;
use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub sessions_active: usize,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub git_commit: Option<String>,
    pub uptime_secs: u64,
    pub protocol_version: u16,
    pub gdfa_version: u16,
    pub kappa: usize,
    pub ssp: usize,
    pub outmax: u16,
    pub cmax: u16,
    pub row_count: u32,
    pub row_len: u32,
    pub entry_len: u32,
    /// SHA-256 of the package (hex)
    pub package_digest: String,
}

/// GET /health - Liveness check
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// GET /ready - Readiness check
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let response = ReadyResponse {
        ready: is_ready,
        sessions_active: state.sessions.len(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// GET /v1/info - Server and garbled table information
pub async fn info(State(state): State<AppState>) -> Result<Json<InfoResponse>> {
    let gdfa = state.get_gdfa()?;
    let header = gdfa.package.header();

    Ok(Json(InfoResponse {
        version: state.info.version.clone(),
        git_commit: state.info.git_commit.clone(),
        uptime_secs: state.uptime().as_secs(),
        protocol_version: oblivids_protocol::PROTOCOL_VERSION,
        gdfa_version: header.version,
        kappa: KAPPA,
        ssp: SSP,
        outmax: header.outmax,
        cmax: header.cmax,
        row_count: header.row_count,
        row_len: header.row_len,
        entry_len: header.entry_len,
        package_digest: hex::encode(gdfa.package.digest()),
    }))
}

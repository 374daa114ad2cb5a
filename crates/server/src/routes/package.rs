//! Package download

use axum::{extract::State, http::StatusCode, response::IntoResponse};

use crate::error::Result;
use crate::state::AppState;

/// GET /v1/package - The serialized garbled table
pub async fn download(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let gdfa = state.get_gdfa()?;

    Ok((
        StatusCode::OK,
        [("content-type", "application/octet-stream")],
        gdfa.package_bytes.clone(),
    ))
}

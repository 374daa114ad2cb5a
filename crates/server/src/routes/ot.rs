//! OT protocol endpoint
//!
//! Every protocol message of a session goes through one endpoint: the body
//! is a binary frame, the reply is a binary frame (an ERROR frame when the
//! OT layer rejects the message).

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use uuid::Uuid;

use oblivids_protocol::Message;

use crate::error::{Result, ServerError};
use crate::state::AppState;

/// Extract session ID from headers
fn extract_session_id(headers: &HeaderMap) -> Result<Uuid> {
    let session_id = headers
        .get("x-session-id")
        .ok_or_else(|| ServerError::InvalidFrame("Missing X-Session-Id header".to_string()))?
        .to_str()
        .map_err(|_| ServerError::InvalidFrame("Invalid X-Session-Id header".to_string()))?;

    Uuid::parse_str(session_id)
        .map_err(|_| ServerError::InvalidFrame("Invalid session ID format".to_string()))
}

/// POST /v1/ot/frame - Exchange one protocol frame
pub async fn frame(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let session_id = extract_session_id(&headers)?;
    let message = Message::decode(&body)?;
    let round = message.header().round;

    let reply = state.sessions.dispatch(&session_id, message)?;

    tracing::debug!(session_id = %session_id, round, "Frame handled");

    Ok((
        StatusCode::OK,
        [("content-type", "application/octet-stream")],
        reply.encode(),
    ))
}

//! API routes

pub mod health;
pub mod session;
pub mod ot;
pub mod package;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and readiness
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/info", get(health::info))
        // Garbled table
        .route("/v1/package", get(package::download))
        // Session management
        .route("/v1/session/new", post(session::create_session))
        .route("/v1/session/status", post(session::session_status))
        // OT protocol
        .route("/v1/ot/frame", post(ot::frame))
        // Add state
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use oblivids_gdfa::{DfaBuilder, GdfaPackage};
    use oblivids_protocol::{Header, Message, SessionInitPayload};

    use crate::config::ServerConfig;

    fn state() -> AppState {
        let mut builder = DfaBuilder::new();
        let s = builder.add_state();
        let hit = builder.add_state();
        builder.add_transition(s, b'x', hit);
        builder.set_accepting(hit, 9);
        let dfa = builder.build_with_reject_sink().unwrap();

        let config = ServerConfig {
            build_seed: Some(5),
            ..ServerConfig::default()
        };
        AppState::new(config).with_dfa(dfa).unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    async fn post(app: Router, uri: &str, session: Option<&str>, body: Vec<u8>) -> axum::response::Response {
        let mut request = Request::builder().method("POST").uri(uri);
        if let Some(id) = session {
            request = request.header("x-session-id", id);
        }
        app.oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_not_ready_without_dfa() {
        let app = create_router(AppState::new(ServerConfig::default()));
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_package_download_matches_digest() {
        let state = state();
        let digest = state.get_gdfa().unwrap().package.digest();
        let app = create_router(state);

        let response = app
            .oneshot(Request::get("/v1/package").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let package = GdfaPackage::from_bytes(&body_bytes(response).await).unwrap();
        assert_eq!(package.digest(), digest);
    }

    #[tokio::test]
    async fn test_session_init_over_http() {
        let state = state();
        let digest = state.get_gdfa().unwrap().package.digest();
        let app = create_router(state);

        let response = post(app.clone(), "/v1/session/new", None, Vec::new()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        let session_id = json["session_id"].as_str().unwrap().to_string();
        assert_eq!(json["package_digest"], hex::encode(digest));

        let init = Message::SessionInit {
            header: Header::pre_session(),
            payload: SessionInitPayload::new(digest),
        };
        let response = post(app, "/v1/ot/frame", Some(&session_id), init.encode()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let reply = Message::decode(&body_bytes(response).await).unwrap();
        assert!(matches!(reply, Message::SessionParams { .. }));
    }

    #[tokio::test]
    async fn test_frame_without_session_header() {
        let app = create_router(state());
        let response = post(app, "/v1/ot/frame", None, vec![0u8; 8]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let app = create_router(state());
        let id = uuid::Uuid::new_v4().to_string();
        let init = Message::SessionInit {
            header: Header::pre_session(),
            payload: SessionInitPayload::new([0u8; 32]),
        };
        let response = post(app, "/v1/ot/frame", Some(&id), init.encode()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

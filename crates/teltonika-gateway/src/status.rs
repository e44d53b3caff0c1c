//! Read-only status HTTP surface (spec.md §6).
//!
//! `GET /` and `GET /health` both return the same JSON projection of the
//! session registry; any other path falls through to axum's built-in 404.
//! Grounded on the gateway crate's pre-staged `axum` dependency (the
//! teacher has no HTTP server since its own transport is QUIC) — the
//! natural minimal-surface choice for "two GET routes returning JSON".

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::registry::SessionRegistry;

#[derive(Clone)]
struct AppState {
    registry: Arc<SessionRegistry>,
    started_at: Instant,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionView {
    id: u64,
    imei: Option<String>,
    connected_at: u64,
    packets_received: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: u64,
    active_sessions: usize,
    sessions: Vec<SessionView>,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let sessions: Vec<SessionView> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|snapshot| SessionView {
            id: snapshot.session_id,
            imei: snapshot.imei,
            connected_at: snapshot
                .connected_at
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            packets_received: snapshot.packets_received,
        })
        .collect();

    Json(StatusResponse {
        status: "ok",
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_sessions: sessions.len(),
        sessions,
    })
}

/// Builds the status router over `registry`. Any path other than `/` and
/// `/health` falls through to axum's default 404 response.
pub fn router(registry: Arc<SessionRegistry>) -> Router {
    let state = AppState { registry, started_at: Instant::now() };
    Router::new()
        .route("/", get(status_handler))
        .route("/health", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::SystemTime;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn root_and_health_return_same_status_payload() {
        let registry = Arc::new(SessionRegistry::new());
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let (_, record) = registry.register(addr, SystemTime::now());
        record.set_imei("356307042441013");
        record.set_packets_received(2);

        for path in ["/", "/health"] {
            let app = router(Arc::clone(&registry));
            let response = app
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let parsed: StatusResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(parsed.status, "ok");
            assert_eq!(parsed.active_sessions, 1);
            assert_eq!(parsed.sessions[0].imei.as_deref(), Some("356307042441013"));
            assert_eq!(parsed.sessions[0].packets_received, 2);
        }
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let registry = Arc::new(SessionRegistry::new());
        let app = router(registry);
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

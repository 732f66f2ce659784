use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// `/` and `/health` handlers.
pub mod health;

/// Compose the keep-alive HTTP surface.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{dao::state_store::memory::MemoryStateStore, state::tests::test_state};

    #[tokio::test]
    async fn root_reports_liveness() {
        let (state, _, _) = test_state(MemoryStateStore::default()).await;

        let response = router(state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_success());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Bot is running!");
    }

    #[tokio::test]
    async fn health_returns_json_snapshot() {
        let (state, _, _) = test_state(MemoryStateStore::default()).await;

        let response = router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_success());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["last_accepted_number"], 0);
    }
}

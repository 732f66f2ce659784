use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::health::HealthResponse, services::health_service, state::SharedState};

/// Plain liveness probe used by uptime pingers.
pub async fn root() -> &'static str {
    "Bot is running!"
}

/// Return a snapshot of the bot's subsystems.
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(health_service::health_status(&state).await)
}

/// Configure the keep-alive routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/", get(root))
        .route("/health", get(health))
}

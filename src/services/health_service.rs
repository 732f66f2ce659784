use crate::{dto::health::HealthResponse, state::SharedState};

/// Snapshot of the bot's state for the keep-alive endpoint.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::new(
        state.anchor().await.is_some(),
        state.last_accepted().await,
        state.timeouts().len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{
            models::{AnchorRecord, CounterRecord},
            state_store::memory::MemoryStateStore,
        },
        state::tests::test_state,
    };

    #[tokio::test]
    async fn degraded_until_anchor_exists() {
        let (state, _, _) = test_state(MemoryStateStore::default()).await;
        assert_eq!(health_status(&state).await.status, "degraded");

        let store = MemoryStateStore::with_records(
            AnchorRecord {
                message_id: Some(77),
            },
            CounterRecord {
                last_accepted_number: 9,
            },
        );
        let (state, _, _) = test_state(store).await;
        let health = health_status(&state).await;
        assert_eq!(health, HealthResponse::new(true, 9, 0));
        assert_eq!(health.status, "ok");
    }
}

/// Counting game state cell.
pub mod counting;
/// Timeout workflow state machine.
pub mod timeout_flow;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        models::{AnchorRecord, CounterRecord},
        state_store::StateStore,
        storage::StorageResult,
    },
    platform::{ChatPlatform, models::Snowflake},
};

use self::{
    counting::{CountRejection, CountTransition, CountingGame},
    timeout_flow::TimeoutFlow,
};

/// Reference-counted handle passed to every service.
pub type SharedState = Arc<AppState>;

/// The single verification message members react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMessage {
    /// Anchor message.
    pub message_id: Snowflake,
    /// Channel holding the anchor.
    pub channel_id: Snowflake,
}

/// Central application state: configuration, platform handle, persisted records and
/// the in-flight moderator workflows.
pub struct AppState {
    config: AppConfig,
    platform: Arc<dyn ChatPlatform>,
    store: Arc<dyn StateStore>,
    anchor: RwLock<Option<AnchorMessage>>,
    counting: Mutex<CountingGame>,
    timeouts: DashMap<Uuid, TimeoutFlow>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn StateStore>,
    ) -> SharedState {
        Arc::new(Self {
            config,
            platform,
            store,
            anchor: RwLock::new(None),
            counting: Mutex::new(CountingGame::default()),
            timeouts: DashMap::new(),
        })
    }

    /// Build the state and seed it from the persisted records.
    ///
    /// Unreadable records are logged and treated as absent: the anchor is then
    /// recreated, and the counter is rebuilt by startup reconciliation anyway.
    pub async fn restore(
        config: AppConfig,
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn StateStore>,
    ) -> SharedState {
        let state = Self::new(config, platform, store);

        match state.store.load_anchor().await {
            Ok(AnchorRecord {
                message_id: Some(message_id),
            }) => {
                info!(message_id, "using existing verification message");
                *state.anchor.write().await = Some(AnchorMessage {
                    message_id: Snowflake(message_id),
                    channel_id: state.config.verification_channel,
                });
            }
            Ok(_) => info!("no verification message persisted yet"),
            Err(err) => warn!(error = %err, "failed to load anchor record; treating as absent"),
        }

        match state.store.load_counter().await {
            Ok(record) => {
                *state.counting.lock().await = CountingGame::new(record.last_accepted_number);
            }
            Err(err) => warn!(error = %err, "failed to load counter cache; starting from 0"),
        }

        state
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Outbound platform handle.
    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    /// Currently known anchor message, if any.
    pub async fn anchor(&self) -> Option<AnchorMessage> {
        *self.anchor.read().await
    }

    /// Slot guarding the anchor; writers hold it across the whole create-and-persist step.
    pub fn anchor_slot(&self) -> &RwLock<Option<AnchorMessage>> {
        &self.anchor
    }

    /// Persist the anchor reference.
    pub async fn persist_anchor(&self, anchor: AnchorMessage) -> StorageResult<()> {
        self.store
            .save_anchor(AnchorRecord {
                message_id: Some(anchor.message_id.get()),
            })
            .await
    }

    /// Last accepted counting number.
    pub async fn last_accepted(&self) -> u64 {
        self.counting.lock().await.last_accepted()
    }

    /// Serialisation point of every counter transition.
    ///
    /// Holders may read, decide, write and persist without interleaving with other writers.
    pub async fn lock_counting(&self) -> MutexGuard<'_, CountingGame> {
        self.counting.lock().await
    }

    /// Write the counter cache. Must be called while holding [`Self::lock_counting`].
    ///
    /// A failed write leaves the in-memory value authoritative until the next restart,
    /// where reconciliation from channel history supersedes the file.
    pub async fn persist_counter(&self, value: u64) {
        let record = CounterRecord {
            last_accepted_number: value,
        };
        if let Err(err) = self.store.save_counter(record).await {
            warn!(error = %err, value, "failed to persist counter");
        }
    }

    /// Propose a number to the counting game: read, decide, write and persist atomically.
    pub async fn propose_count(&self, number: u64) -> Result<CountTransition, CountRejection> {
        let mut game = self.lock_counting().await;
        let transition = game.propose(number)?;
        self.persist_counter(transition.to).await;
        Ok(transition)
    }

    /// Same as [`Self::propose_count`] for raw message content.
    pub async fn propose_count_content(
        &self,
        content: &str,
    ) -> Result<CountTransition, CountRejection> {
        let mut game = self.lock_counting().await;
        let transition = game.propose_content(content)?;
        self.persist_counter(transition.to).await;
        Ok(transition)
    }

    /// In-flight moderator timeout workflows keyed by session identifier.
    pub fn timeouts(&self) -> &DashMap<Uuid, TimeoutFlow> {
        &self.timeouts
    }
}

//! Counting game: startup reconciliation, message enforcement and the background filler.

use std::time::Duration;

use rand::Rng;
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    dto::events::BotEvent,
    error::ServiceError,
    platform::models::{ChatMessage, HistoryQuery, OutgoingMessage, Snowflake},
    state::{
        SharedState,
        counting::{CountRejection, parse_count},
    },
};

/// Largest page the history endpoint serves.
pub const HISTORY_PAGE_SIZE: u8 = 100;
/// Upper bound on history pages scanned during reconciliation.
pub const MAX_HISTORY_PAGES: usize = 50;
/// Message posted when the channel holds no counting message at all.
pub const SEED_CONTENT: &str = "1";

/// Result of enforcing the game on one posted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Wrong channel or automated author.
    Ignored,
    /// The count advanced to this number.
    Accepted(u64),
    /// The message was deleted (or its deletion attempted).
    Rejected(CountRejection),
}

/// Result of one filler advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillerOutcome {
    /// The filler's number was accepted.
    Advanced(u64),
    /// Someone else took the number first; the filler's message was removed.
    LostRace,
}

/// Rebuild the counter from the counting channel's history.
///
/// History wins over the cached value. An empty channel gets the seed message.
pub async fn reconcile_on_startup(state: &SharedState) -> Result<u64, ServiceError> {
    reconcile_with_page_cap(state, MAX_HISTORY_PAGES).await
}

async fn reconcile_with_page_cap(
    state: &SharedState,
    page_cap: usize,
) -> Result<u64, ServiceError> {
    let channel = state.config().counting_channel;
    let mut game = state.lock_counting().await;

    let observed = match latest_count_in_history(state, channel, page_cap).await? {
        Some(number) => number,
        None => {
            info!(channel = %channel, "no counting history; posting seed");
            state
                .platform()
                .send_message(channel, OutgoingMessage::text(SEED_CONTENT))
                .await?;
            1
        }
    };

    let transition = game.reconcile(observed);
    state.persist_counter(transition.to).await;
    info!(
        cached = transition.from,
        reconciled = transition.to,
        "counting state reconciled"
    );
    Ok(transition.to)
}

async fn latest_count_in_history(
    state: &SharedState,
    channel: Snowflake,
    page_cap: usize,
) -> Result<Option<u64>, ServiceError> {
    let mut before = None;
    for page_index in 0..page_cap {
        let page = state
            .platform()
            .fetch_messages(
                channel,
                HistoryQuery {
                    limit: HISTORY_PAGE_SIZE,
                    before,
                },
            )
            .await?;

        if let Some(number) = page.iter().find_map(|message| parse_count(&message.content)) {
            debug!(page = page_index, number, "found latest counting message");
            return Ok(Some(number));
        }
        if page.len() < HISTORY_PAGE_SIZE as usize {
            return Ok(None);
        }
        before = page.last().map(|message| message.id);
    }

    warn!(pages = page_cap, "history scan cap reached without a counting message");
    Ok(None)
}

/// Enforce the sequence on a message posted by a human.
pub async fn on_message(
    state: &SharedState,
    message: ChatMessage,
) -> Result<MessageOutcome, ServiceError> {
    if message.channel_id != state.config().counting_channel || message.author.bot {
        return Ok(MessageOutcome::Ignored);
    }

    match state.propose_count_content(&message.content).await {
        Ok(transition) => {
            debug!(number = transition.to, author = %message.author.id, "count accepted");
            Ok(MessageOutcome::Accepted(transition.to))
        }
        Err(rejection) => {
            debug!(
                reason = %rejection,
                author = %message.author.id,
                "removing message from counting channel"
            );
            delete_quietly(state, message.channel_id, message.id).await;
            Ok(MessageOutcome::Rejected(rejection))
        }
    }
}

/// One scheduled filler run: wait a random delay inside the period, then advance.
pub async fn filler_tick(state: &SharedState) -> Result<FillerOutcome, ServiceError> {
    let delay = random_delay(state.config().filler_period);
    debug!(delay_secs = delay.as_secs(), "filler waiting");
    time::sleep(delay).await;
    advance_as_filler(state).await
}

/// Post `last + 1` and submit it through the same transition human messages use.
///
/// The send happens outside the critical section, so a human may claim the number
/// first; in that case the filler's own message is deleted.
pub async fn advance_as_filler(state: &SharedState) -> Result<FillerOutcome, ServiceError> {
    let channel = state.config().counting_channel;
    let proposed = state.last_accepted().await.saturating_add(1);

    let sent = state
        .platform()
        .send_message(channel, OutgoingMessage::text(proposed.to_string()))
        .await?;

    match state.propose_count(proposed).await {
        Ok(transition) => {
            info!(number = transition.to, "filler advanced the count");
            Ok(FillerOutcome::Advanced(transition.to))
        }
        Err(rejection) => {
            info!(reason = %rejection, "filler lost the race; removing its message");
            delete_quietly(state, channel, sent.id).await;
            Ok(FillerOutcome::LostRace)
        }
    }
}

/// Emit a [`BotEvent::FillerTick`] once per `period`, starting one period from now.
pub async fn run_filler_schedule(period: Duration, events: mpsc::Sender<BotEvent>) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if events.send(BotEvent::FillerTick).await.is_err() {
            debug!("event receiver dropped; stopping filler schedule");
            return;
        }
    }
}

fn random_delay(period: Duration) -> Duration {
    if period.is_zero() {
        return Duration::ZERO;
    }
    rand::rng().random_range(Duration::ZERO..period)
}

async fn delete_quietly(state: &SharedState, channel: Snowflake, message: Snowflake) {
    if let Err(err) = state.platform().delete_message(channel, message).await {
        warn!(error = %err, message_id = %message, "failed to delete counting message");
    }
}

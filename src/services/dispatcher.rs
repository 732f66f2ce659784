//! Routes inbound events to the subsystem that owns them.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{dto::events::BotEvent, error::ServiceError, state::SharedState};

use super::{counting, moderation, verification};

/// Handle one event to completion.
pub async fn dispatch(state: &SharedState, event: BotEvent) -> Result<(), ServiceError> {
    match event {
        BotEvent::MessagePosted(message) => {
            let outcome = counting::on_message(state, message).await?;
            debug!(?outcome, "message handled");
        }
        BotEvent::ReactionAdded(reaction) => {
            let outcome = verification::on_reaction_added(state, reaction).await?;
            debug!(?outcome, "reaction handled");
        }
        BotEvent::ContextMenuInvoked(invocation) => {
            moderation::on_context_menu(state, invocation).await?;
        }
        BotEvent::ComponentInvoked(invocation) => {
            moderation::on_component(state, invocation).await?;
        }
        BotEvent::FillerTick => {
            let outcome = counting::filler_tick(state).await?;
            debug!(?outcome, "filler tick handled");
        }
    }
    Ok(())
}

/// Consume events until every sender is dropped, in delivery order.
///
/// Filler ticks run on their own task since they sleep before acting; they still
/// reach the counter through the same transition as human messages. Errors are
/// logged and never stop the loop.
pub async fn run(state: SharedState, mut events: mpsc::Receiver<BotEvent>) {
    while let Some(event) = events.recv().await {
        if matches!(event, BotEvent::FillerTick) {
            let state = SharedState::clone(&state);
            tokio::spawn(async move { handle(&state, event).await });
        } else {
            handle(&state, event).await;
        }
    }
    debug!("event stream closed; dispatcher stopping");
}

async fn handle(state: &SharedState, event: BotEvent) {
    let kind = event_kind(&event);
    match dispatch(state, event).await {
        Ok(()) => {}
        Err(err) if err.is_permission_denied() => {
            warn!(error = %err, kind, "bot lacks a permission needed for this event");
        }
        Err(err) => warn!(error = %err, kind, "event handling failed"),
    }
}

fn event_kind(event: &BotEvent) -> &'static str {
    match event {
        BotEvent::MessagePosted(_) => "message_posted",
        BotEvent::ReactionAdded(_) => "reaction_added",
        BotEvent::ContextMenuInvoked(_) => "context_menu",
        BotEvent::ComponentInvoked(_) => "component",
        BotEvent::FillerTick => "filler_tick",
    }
}

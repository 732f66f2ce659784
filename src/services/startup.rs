//! One-shot synchronisation performed before events are consumed.

use tracing::{error, info, warn};

use crate::state::SharedState;

use super::{counting, moderation::TIMEOUT_COMMAND_NAME, verification};

/// Register the moderator command, place the anchor and reconcile the counter.
///
/// Every step is independent: a failure is logged and leaves only its own
/// subsystem degraded.
pub async fn synchronize(state: &SharedState) {
    let guild = state.config().guild_id;
    match state
        .platform()
        .register_message_command(guild, TIMEOUT_COMMAND_NAME.to_string())
        .await
    {
        Ok(()) => info!(%guild, command = TIMEOUT_COMMAND_NAME, "context menu command registered"),
        Err(err) => warn!(error = %err, %guild, "failed to register context menu command"),
    }

    if let Err(err) = verification::ensure_anchor(state).await {
        error!(error = %err, "verification gate unavailable until restart");
    }

    match counting::reconcile_on_startup(state).await {
        Ok(number) => info!(last_accepted = number, "counting game ready"),
        Err(err) => error!(
            error = %err,
            "counting reconciliation failed; keeping cached value"
        ),
    }
}

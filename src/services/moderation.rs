//! Moderator timeout workflow: context-menu entry, component routing, restriction and audit.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        audit::{AuditRecord, EXCERPT_LEN},
        components::{
            TimeoutAction, TimeoutComponentId, confirmation_components, duration_components,
        },
        events::{ComponentInvocation, ContextMenuInvocation},
    },
    error::ServiceError,
    platform::models::{
        HistoryQuery, InteractionHandle, InteractionReply, OutgoingMessage, Snowflake,
    },
    state::{
        SharedState,
        timeout_flow::{
            TimeoutDuration, TimeoutEvent, TimeoutFlow, TimeoutPhase, TimeoutRequest,
            WorkflowError,
        },
    },
};

/// Name of the message context-menu command registered in the guild.
pub const TIMEOUT_COMMAND_NAME: &str = "Timeout user";
/// Messages fetched from the origin channel to build the audit excerpt.
const AUDIT_HISTORY_WINDOW: u8 = 20;

const PERMISSION_DENIED_NOTICE: &str = "You don't have permission to use this command.";
const AUTOMATED_TARGET_NOTICE: &str = "Automated accounts cannot be timed out.";
const SELF_TARGET_NOTICE: &str = "You cannot time yourself out.";
const NOT_YOUR_CONTROLS_NOTICE: &str =
    "Only the moderator who started this action can use these controls.";
const EXPIRED_NOTICE: &str = "This timeout request has expired. Run the command again.";
const UNAVAILABLE_NOTICE: &str = "This action is no longer available.";
const UNKNOWN_DURATION_NOTICE: &str = "Please pick one of the offered durations.";
const CANCELLED_NOTICE: &str = "Timeout cancelled.";
const MISSING_PERMISSION_NOTICE: &str = "I don't have permission to time out this member.";
const MEMBER_GONE_NOTICE: &str = "That member is no longer in the server.";
const APPLY_FAILED_NOTICE: &str = "Failed to apply the timeout. Please try again later.";

/// Session key of the workflow started by `interaction`.
pub fn session_key(interaction: Snowflake) -> Uuid {
    Uuid::from_u64_pair(0, interaction.get())
}

/// Entry point of the workflow: permission check, then the confirmation prompt.
///
/// Returns the session key when a workflow was started.
pub async fn on_context_menu(
    state: &SharedState,
    invocation: ContextMenuInvocation,
) -> Result<Option<Uuid>, ServiceError> {
    if invocation.command_name != TIMEOUT_COMMAND_NAME {
        debug!(command = %invocation.command_name, "ignoring unknown context menu command");
        return Ok(None);
    }

    let config = state.config();
    let moderator = &invocation.invoker.user;
    let target = &invocation.target_message.author;

    if !invocation.invoker.has_any_role(&config.moderator_roles) {
        info!(user = %moderator.id, "timeout command refused: missing moderator role");
        notify(state, &invocation.interaction, PERMISSION_DENIED_NOTICE).await?;
        return Ok(None);
    }
    if target.bot {
        notify(state, &invocation.interaction, AUTOMATED_TARGET_NOTICE).await?;
        return Ok(None);
    }
    if target.id == moderator.id {
        notify(state, &invocation.interaction, SELF_TARGET_NOTICE).await?;
        return Ok(None);
    }

    let session = session_key(invocation.interaction.id);
    let request = TimeoutRequest {
        guild_id: invocation.guild_id,
        channel_id: invocation.channel_id,
        target_message: invocation.target_message.id,
        target_member: target.id,
        target_name: target.username.clone(),
        moderator: moderator.id,
        moderator_name: moderator.username.clone(),
        origin_content: invocation.target_message.content.clone(),
        chosen_duration: None,
    };
    let flow = TimeoutFlow::new(request, config.step_timeout);
    let version = flow.version();
    state.timeouts().insert(session, flow);

    let prompt = OutgoingMessage::text(format!(
        "Are you sure you want to time out <@{}>?",
        target.id
    ))
    .with_components(confirmation_components(session));
    if let Err(err) = respond(state, &invocation.interaction, InteractionReply::private(prompt)).await
    {
        state.timeouts().remove(&session);
        return Err(err);
    }

    info!(
        %session,
        moderator = %moderator.id,
        target = %target.id,
        "timeout workflow started"
    );
    arm_expiry(state, session, version);
    Ok(Some(session))
}

/// Route a button or select press to its workflow session.
///
/// Returns the phase the session reached, or `None` when the input did not advance any.
pub async fn on_component(
    state: &SharedState,
    invocation: ComponentInvocation,
) -> Result<Option<TimeoutPhase>, ServiceError> {
    let Some(component) = TimeoutComponentId::parse(&invocation.custom_id) else {
        debug!(custom_id = %invocation.custom_id, "ignoring foreign component");
        return Ok(None);
    };
    let session = component.session;
    let interaction = &invocation.interaction;

    let event = match component.action {
        TimeoutAction::Confirm => TimeoutEvent::Confirm,
        TimeoutAction::Cancel => TimeoutEvent::Cancel,
        TimeoutAction::Duration => {
            let chosen = invocation
                .values
                .first()
                .and_then(|value| TimeoutDuration::from_value(value));
            match chosen {
                Some(duration) => TimeoutEvent::SelectDuration(duration),
                None => {
                    notify(state, interaction, UNKNOWN_DURATION_NOTICE).await?;
                    return Ok(None);
                }
            }
        }
    };

    // The map guard must be released before any outbound call.
    let applied = match state.timeouts().get_mut(&session) {
        Some(mut flow) => Some(
            flow.apply(Some(invocation.invoker.id), event)
                .map(|phase| (phase, flow.version(), flow.request().clone())),
        ),
        None => None,
    };
    let Some(applied) = applied else {
        notify(state, interaction, EXPIRED_NOTICE).await?;
        return Ok(None);
    };

    let (phase, version, request) = match applied {
        Ok(applied) => applied,
        Err(WorkflowError::ActorMismatch { expected, actual }) => {
            info!(%session, %expected, %actual, "rejected input from another user");
            notify(state, interaction, NOT_YOUR_CONTROLS_NOTICE).await?;
            return Ok(None);
        }
        Err(WorkflowError::Expired) => {
            state.timeouts().remove(&session);
            debug!(%session, "input arrived after the step expired");
            notify(state, interaction, EXPIRED_NOTICE).await?;
            return Ok(None);
        }
        Err(err @ WorkflowError::InvalidTransition { .. }) => {
            notify(state, interaction, UNAVAILABLE_NOTICE).await?;
            return Err(err.into());
        }
    };

    match phase {
        TimeoutPhase::AwaitingDuration => {
            let picker = OutgoingMessage::text(format!(
                "Select a timeout duration for <@{}>:",
                request.target_member
            ))
            .with_components(duration_components(session));
            respond(state, interaction, InteractionReply::update(picker)).await?;
            arm_expiry(state, session, version);
            Ok(Some(phase))
        }
        TimeoutPhase::Cancelled => {
            state.timeouts().remove(&session);
            info!(%session, "timeout workflow cancelled");
            respond(
                state,
                interaction,
                InteractionReply::update(OutgoingMessage::text(CANCELLED_NOTICE)),
            )
            .await?;
            Ok(Some(phase))
        }
        TimeoutPhase::Applying(duration) => {
            apply_timeout(state, session, interaction, &request, duration)
                .await
                .map(Some)
        }
        other => Ok(Some(other)),
    }
}

async fn apply_timeout(
    state: &SharedState,
    session: Uuid,
    interaction: &InteractionHandle,
    request: &TimeoutRequest,
    duration: TimeoutDuration,
) -> Result<TimeoutPhase, ServiceError> {
    let reason = format!(
        "Timed out by {} ({}) via {TIMEOUT_COMMAND_NAME}",
        request.moderator_name, request.moderator
    );
    let result = state
        .platform()
        .timeout_member(
            request.guild_id,
            request.target_member,
            duration.as_duration(),
            reason,
        )
        .await;

    match result {
        Ok(()) => {
            let phase = finish(
                state,
                session,
                TimeoutEvent::RestrictionApplied,
                TimeoutPhase::Applied(duration),
            );
            info!(
                %session,
                target = %request.target_member,
                duration = duration.label(),
                "member timed out"
            );
            post_audit_record(state, request, duration).await;
            let confirmation = OutgoingMessage::text(format!(
                "<@{}> has been timed out for {}.",
                request.target_member,
                duration.label()
            ));
            respond(state, interaction, InteractionReply::update(confirmation)).await?;
            Ok(phase)
        }
        Err(err) => {
            let phase = finish(
                state,
                session,
                TimeoutEvent::RestrictionFailed,
                TimeoutPhase::Failed,
            );
            warn!(error = %err, %session, target = %request.target_member, "failed to apply timeout");
            let notice = if err.is_permission_denied() {
                MISSING_PERMISSION_NOTICE
            } else if err.is_not_found() {
                MEMBER_GONE_NOTICE
            } else {
                APPLY_FAILED_NOTICE
            };
            respond(
                state,
                interaction,
                InteractionReply::update(OutgoingMessage::text(notice)),
            )
            .await?;

            // No audit record for a restriction that never took effect.
            if err.is_permission_denied() || err.is_not_found() {
                Ok(phase)
            } else {
                Err(err.into())
            }
        }
    }
}

/// Remove the session and record its terminal transition.
fn finish(
    state: &SharedState,
    session: Uuid,
    event: TimeoutEvent,
    fallback: TimeoutPhase,
) -> TimeoutPhase {
    state
        .timeouts()
        .remove(&session)
        .and_then(|(_, mut flow)| flow.apply(None, event).ok())
        .unwrap_or(fallback)
}

async fn post_audit_record(state: &SharedState, request: &TimeoutRequest, duration: TimeoutDuration) {
    let recent_messages = match state
        .platform()
        .fetch_messages(request.channel_id, HistoryQuery::latest(AUDIT_HISTORY_WINDOW))
        .await
    {
        Ok(messages) => messages
            .into_iter()
            .filter(|message| message.author.id == request.target_member)
            .take(EXCERPT_LEN)
            .map(|message| message.content)
            .collect(),
        Err(err) => {
            warn!(error = %err, channel = %request.channel_id, "failed to fetch history for audit record");
            Vec::new()
        }
    };

    let record = AuditRecord {
        moderator: request.moderator,
        target: request.target_member,
        duration,
        origin_channel: request.channel_id,
        origin_content: request.origin_content.clone(),
        recent_messages,
    };
    let log_channel = state.config().mod_log_channel;
    if let Err(err) = state
        .platform()
        .send_message(log_channel, OutgoingMessage::embed(record.to_embed()))
        .await
    {
        warn!(error = %err, channel = %log_channel, "failed to post audit record");
    }
}

/// Expire the session after the step timeout unless it moved on in the meantime.
fn arm_expiry(state: &SharedState, session: Uuid, version: u64) {
    let state = SharedState::clone(state);
    let step_timeout = state.config().step_timeout;
    tokio::spawn(async move {
        tokio::time::sleep(step_timeout).await;
        let expired = state
            .timeouts()
            .get_mut(&session)
            .is_some_and(|mut flow| flow.expire_if_current(version));
        if expired {
            state.timeouts().remove(&session);
            debug!(%session, "timeout workflow expired");
        }
    });
}

async fn notify(
    state: &SharedState,
    interaction: &InteractionHandle,
    notice: &str,
) -> Result<(), ServiceError> {
    respond(
        state,
        interaction,
        InteractionReply::private(OutgoingMessage::text(notice)),
    )
    .await
}

async fn respond(
    state: &SharedState,
    interaction: &InteractionHandle,
    reply: InteractionReply,
) -> Result<(), ServiceError> {
    state
        .platform()
        .respond_to_interaction(interaction.clone(), reply)
        .await
        .map_err(ServiceError::from)
}

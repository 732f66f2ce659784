//! Verification gate: one anchor message whose acknowledge reaction grants the member role.

use tracing::{debug, info, warn};

use crate::{
    dto::{embeds::verification_embed, events::ReactionAdded},
    error::ServiceError,
    platform::models::{Member, OutgoingMessage, Snowflake},
    state::{AnchorMessage, SharedState},
};

/// Result of handling a reaction on the verification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Not the anchor, not the affordance, or no anchor yet.
    Ignored,
    /// Automated accounts never get the role.
    AutomatedAccount,
    /// The verified role was granted.
    Granted,
    /// The platform refused the grant; the reaction stays as is.
    PermissionDenied,
}

/// Create the anchor message unless one is already known.
///
/// The anchor slot stays write-locked for the whole send / react / persist sequence
/// so two callers can never both create one.
pub async fn ensure_anchor(state: &SharedState) -> Result<AnchorMessage, ServiceError> {
    let mut slot = state.anchor_slot().write().await;
    if let Some(anchor) = *slot {
        debug!(message_id = %anchor.message_id, "verification message already present");
        return Ok(anchor);
    }

    let config = state.config();
    let channel = config.verification_channel;
    let sent = state
        .platform()
        .send_message(
            channel,
            OutgoingMessage::embed(verification_embed(&config.verify_emoji)),
        )
        .await?;
    let anchor = AnchorMessage {
        message_id: sent.id,
        channel_id: channel,
    };

    if let Err(err) = state
        .platform()
        .add_reaction(channel, sent.id, config.verify_emoji.clone())
        .await
    {
        warn!(error = %err, message_id = %sent.id, "failed to add acknowledge reaction to anchor");
    }

    // Kept in memory even if the write fails so this process never sends a second one.
    *slot = Some(anchor);
    info!(message_id = %anchor.message_id, "verification message sent");
    if let Err(err) = state.persist_anchor(anchor).await {
        warn!(
            error = %err,
            message_id = %anchor.message_id,
            "verification message not persisted; a restart will post a new one"
        );
    }
    Ok(anchor)
}

/// Grant the verified role when a human reacts to the anchor with the affordance.
pub async fn on_reaction_added(
    state: &SharedState,
    event: ReactionAdded,
) -> Result<GateOutcome, ServiceError> {
    let Some(anchor) = state.anchor().await else {
        return Ok(GateOutcome::Ignored);
    };
    let config = state.config();
    if event.message_id != anchor.message_id || !event.emoji.matches(&config.verify_emoji) {
        return Ok(GateOutcome::Ignored);
    }

    let guild = event.guild_id.unwrap_or(config.guild_id);
    let member = match event.member {
        Some(member) => member,
        None => resolve_member(state, guild, &event).await?,
    };
    if member.user.bot {
        debug!(user = %member.user.id, "ignoring reaction from automated account");
        return Ok(GateOutcome::AutomatedAccount);
    }

    match state
        .platform()
        .grant_role(guild, member.user.id, config.verified_role)
        .await
    {
        Ok(()) => {
            info!(user = %member.user.id, name = %member.user.username, "granted verified role");
            Ok(GateOutcome::Granted)
        }
        Err(err) if err.is_permission_denied() => {
            warn!(error = %err, user = %member.user.id, "missing permission to grant verified role");
            Ok(GateOutcome::PermissionDenied)
        }
        Err(err) => Err(err.into()),
    }
}

async fn resolve_member(
    state: &SharedState,
    guild: Snowflake,
    event: &ReactionAdded,
) -> Result<Member, ServiceError> {
    state
        .platform()
        .fetch_member(guild, event.user_id)
        .await
        .map_err(|err| {
            if err.is_not_found() {
                ServiceError::NotFound(format!("member `{}`", event.user_id))
            } else {
                err.into()
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{
            models::{AnchorRecord, CounterRecord},
            state_store::memory::MemoryStateStore,
        },
        platform::{
            models::{EmojiRef, User},
            testing::{Failure, Op, PlatformCall},
        },
        state::tests::test_state,
    };

    fn member(id: u64, bot: bool) -> Member {
        Member {
            user: User {
                id: Snowflake(id),
                username: format!("user{id}"),
                bot,
            },
            roles: vec![],
        }
    }

    fn reaction(message_id: Snowflake, emoji: &str, member: Option<Member>) -> ReactionAdded {
        ReactionAdded {
            user_id: member.as_ref().map(|m| m.user.id).unwrap_or(Snowflake(5)),
            channel_id: Snowflake(10),
            message_id,
            guild_id: Some(Snowflake(1)),
            member,
            emoji: EmojiRef::unicode(emoji),
        }
    }

    fn anchored_store() -> MemoryStateStore {
        MemoryStateStore::with_records(
            AnchorRecord {
                message_id: Some(77),
            },
            CounterRecord::default(),
        )
    }

    #[tokio::test]
    async fn ensure_anchor_sends_once_and_persists() {
        let (state, platform, store) = test_state(MemoryStateStore::default()).await;

        let first = ensure_anchor(&state).await.unwrap();
        let second = ensure_anchor(&state).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.anchor_writes(), 1);
        assert_eq!(store.anchor().message_id, Some(first.message_id.get()));
        let sends = platform.sent_messages(state.config().verification_channel);
        assert_eq!(sends.len(), 1);
        assert_eq!(
            sends[0].embeds[0].title.as_deref(),
            Some("✅ Verification")
        );
        assert!(platform.calls().contains(&PlatformCall::React {
            channel: state.config().verification_channel,
            message: first.message_id,
            emoji: "✅".into(),
        }));
    }

    #[tokio::test]
    async fn ensure_anchor_reuses_persisted_message() {
        let (state, platform, store) = test_state(anchored_store()).await;

        let anchor = ensure_anchor(&state).await.unwrap();

        assert_eq!(anchor.message_id, Snowflake(77));
        assert!(platform.calls().is_empty());
        assert_eq!(store.anchor_writes(), 0);
    }

    #[tokio::test]
    async fn failed_send_leaves_gate_unusable() {
        let (state, platform, store) = test_state(MemoryStateStore::default()).await;
        platform.fail(Op::Send, Failure::PermissionDenied);

        assert!(ensure_anchor(&state).await.is_err());
        assert_eq!(state.anchor().await, None);
        assert_eq!(store.anchor_writes(), 0);

        let outcome = on_reaction_added(&state, reaction(Snowflake(77), "✅", Some(member(5, false))))
            .await
            .unwrap();
        assert_eq!(outcome, GateOutcome::Ignored);
    }

    #[tokio::test]
    async fn unpersisted_anchor_still_serves_the_gate() {
        let (state, platform, store) = test_state(MemoryStateStore::default()).await;
        store.fail_writes();

        let anchor = ensure_anchor(&state).await.unwrap();

        assert_eq!(state.anchor().await, Some(anchor));
        assert_eq!(store.anchor_writes(), 0);
        let outcome = on_reaction_added(
            &state,
            reaction(anchor.message_id, "✅", Some(member(5, false))),
        )
        .await
        .unwrap();
        assert_eq!(outcome, GateOutcome::Granted);
        assert_eq!(platform.role_grants().len(), 1);
    }

    #[tokio::test]
    async fn acknowledge_reaction_grants_role() {
        let (state, platform, _) = test_state(anchored_store()).await;

        let outcome = on_reaction_added(&state, reaction(Snowflake(77), "✅", Some(member(5, false))))
            .await
            .unwrap();

        assert_eq!(outcome, GateOutcome::Granted);
        assert_eq!(
            platform.role_grants(),
            vec![(Snowflake(5), state.config().verified_role)]
        );
    }

    #[tokio::test]
    async fn other_messages_and_emoji_are_ignored() {
        let (state, platform, _) = test_state(anchored_store()).await;

        let wrong_message =
            on_reaction_added(&state, reaction(Snowflake(78), "✅", Some(member(5, false))))
                .await
                .unwrap();
        let wrong_emoji =
            on_reaction_added(&state, reaction(Snowflake(77), "👍", Some(member(5, false))))
                .await
                .unwrap();

        assert_eq!(wrong_message, GateOutcome::Ignored);
        assert_eq!(wrong_emoji, GateOutcome::Ignored);
        assert!(platform.role_grants().is_empty());
    }

    #[tokio::test]
    async fn automated_accounts_never_get_the_role() {
        let (state, platform, _) = test_state(anchored_store()).await;

        let outcome = on_reaction_added(&state, reaction(Snowflake(77), "✅", Some(member(9, true))))
            .await
            .unwrap();

        assert_eq!(outcome, GateOutcome::AutomatedAccount);
        assert!(platform.role_grants().is_empty());
    }

    #[tokio::test]
    async fn member_is_resolved_when_payload_lacks_it() {
        let (state, platform, _) = test_state(anchored_store()).await;
        platform.add_member(member(5, false));
        platform.add_member(member(9, true));

        let human = on_reaction_added(&state, reaction(Snowflake(77), "✅", None))
            .await
            .unwrap();
        let mut bot_reaction = reaction(Snowflake(77), "✅", None);
        bot_reaction.user_id = Snowflake(9);
        let bot = on_reaction_added(&state, bot_reaction).await.unwrap();

        assert_eq!(human, GateOutcome::Granted);
        assert_eq!(bot, GateOutcome::AutomatedAccount);
    }

    #[tokio::test]
    async fn permission_failure_is_logged_not_raised() {
        let (state, platform, _) = test_state(anchored_store()).await;
        platform.fail(Op::GrantRole, Failure::PermissionDenied);

        let outcome = on_reaction_added(&state, reaction(Snowflake(77), "✅", Some(member(5, false))))
            .await
            .unwrap();

        assert_eq!(outcome, GateOutcome::PermissionDenied);
        assert!(
            !platform
                .calls()
                .iter()
                .any(|call| matches!(call, PlatformCall::Delete { .. }))
        );
    }
}

//! In-memory [`ChatPlatform`] used by the service tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::sync::{Notify, Semaphore};

use super::{
    ChatPlatform,
    error::{PlatformError, PlatformResult},
    models::{
        ChatMessage, HistoryQuery, InteractionHandle, InteractionReply, Member, OutgoingMessage,
        Snowflake, User,
    },
};

/// Outbound call captured by [`RecordingPlatform`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    /// A message was sent.
    Send {
        /// Target channel.
        channel: Snowflake,
        /// Body that was sent.
        message: OutgoingMessage,
        /// Identifier handed back to the caller.
        id: Snowflake,
    },
    /// A reaction was added.
    React {
        /// Channel of the message.
        channel: Snowflake,
        /// Reacted message.
        message: Snowflake,
        /// Emoji identity.
        emoji: String,
    },
    /// A message was deleted.
    Delete {
        /// Channel of the message.
        channel: Snowflake,
        /// Deleted message.
        message: Snowflake,
    },
    /// A role was granted.
    GrantRole {
        /// Guild of the member.
        guild: Snowflake,
        /// Member receiving the role.
        user: Snowflake,
        /// Granted role.
        role: Snowflake,
    },
    /// A member was timed out.
    Timeout {
        /// Guild of the member.
        guild: Snowflake,
        /// Restricted member.
        user: Snowflake,
        /// Length of the restriction.
        duration: Duration,
        /// Audit reason.
        reason: String,
    },
    /// An interaction was answered.
    Respond {
        /// Answered interaction.
        interaction: Snowflake,
        /// Reply that was sent.
        reply: InteractionReply,
    },
    /// A context-menu command was registered.
    RegisterCommand {
        /// Target guild.
        guild: Snowflake,
        /// Command name.
        name: String,
    },
}

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// [`ChatPlatform::send_message`].
    Send,
    /// [`ChatPlatform::add_reaction`].
    React,
    /// [`ChatPlatform::delete_message`].
    Delete,
    /// [`ChatPlatform::fetch_messages`].
    FetchMessages,
    /// [`ChatPlatform::fetch_member`].
    FetchMember,
    /// [`ChatPlatform::grant_role`].
    GrantRole,
    /// [`ChatPlatform::timeout_member`].
    Timeout,
    /// [`ChatPlatform::respond_to_interaction`].
    Respond,
    /// [`ChatPlatform::register_message_command`].
    RegisterCommand,
}

/// How a forced failure manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Answer as a missing-permission rejection.
    PermissionDenied,
    /// Answer as a missing-target rejection.
    NotFound,
}

impl Failure {
    fn into_error(self, operation: &'static str) -> PlatformError {
        match self {
            Failure::PermissionDenied => PlatformError::PermissionDenied { operation },
            Failure::NotFound => PlatformError::NotFound { operation },
        }
    }
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<PlatformCall>>,
    /// Channel history, oldest first.
    history: Mutex<HashMap<Snowflake, Vec<ChatMessage>>>,
    members: Mutex<HashMap<Snowflake, Member>>,
    failures: Mutex<HashMap<Op, Failure>>,
    send_gate: Mutex<Option<Arc<Semaphore>>>,
    send_waiting: Notify,
    next_id: AtomicU64,
}

/// Records every outbound call and serves history/members from memory.
#[derive(Clone, Default)]
pub struct RecordingPlatform {
    inner: Arc<Inner>,
}

/// User id the platform reports for messages sent by the bot.
pub const BOT_USER: Snowflake = Snowflake(999);

impl RecordingPlatform {
    /// Empty platform with no history, members or failures.
    pub fn new() -> Self {
        let platform = Self::default();
        platform.inner.next_id.store(10_000, Ordering::SeqCst);
        platform
    }

    fn next_id(&self) -> Snowflake {
        Snowflake(self.inner.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn failure(&self, op: Op) -> Option<Failure> {
        self.inner.failures.lock().unwrap().get(&op).copied()
    }

    fn record(&self, call: PlatformCall) {
        self.inner.calls.lock().unwrap().push(call);
    }

    /// Make every subsequent call of `op` fail.
    pub fn fail(&self, op: Op, failure: Failure) {
        self.inner.failures.lock().unwrap().insert(op, failure);
    }

    /// Append a message authored by `author` to a channel's history.
    pub fn push_history(&self, channel: Snowflake, author: User, content: &str) -> ChatMessage {
        let message = ChatMessage {
            id: self.next_id(),
            channel_id: channel,
            author,
            content: content.to_string(),
        };
        self.inner
            .history
            .lock()
            .unwrap()
            .entry(channel)
            .or_default()
            .push(message.clone());
        message
    }

    /// Register a guild member for `fetch_member`.
    pub fn add_member(&self, member: Member) {
        self.inner
            .members
            .lock()
            .unwrap()
            .insert(member.user.id, member);
    }

    /// Hold every subsequent send until a permit is added to the returned semaphore.
    pub fn gate_sends(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.inner.send_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a send reached the gate installed by [`Self::gate_sends`].
    pub async fn send_blocked(&self) {
        self.inner.send_waiting.notified().await;
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Text content of every message sent to `channel`.
    pub fn sent_texts(&self, channel: Snowflake) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Send {
                    channel: target,
                    message,
                    ..
                } if target == channel => message.content,
                _ => None,
            })
            .collect()
    }

    /// Messages sent to `channel` (content and embeds).
    pub fn sent_messages(&self, channel: Snowflake) -> Vec<OutgoingMessage> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Send {
                    channel: target,
                    message,
                    ..
                } if target == channel => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Identifiers of deleted messages, in order.
    pub fn deleted(&self) -> Vec<Snowflake> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Delete { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Interaction replies, in order.
    pub fn replies(&self) -> Vec<InteractionReply> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Respond { reply, .. } => Some(reply),
                _ => None,
            })
            .collect()
    }

    /// Applied timeouts as `(user, duration, reason)`.
    pub fn timeouts(&self) -> Vec<(Snowflake, Duration, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Timeout {
                    user,
                    duration,
                    reason,
                    ..
                } => Some((user, duration, reason)),
                _ => None,
            })
            .collect()
    }

    /// Granted roles as `(user, role)`.
    pub fn role_grants(&self) -> Vec<(Snowflake, Snowflake)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::GrantRole { user, role, .. } => Some((user, role)),
                _ => None,
            })
            .collect()
    }
}

impl ChatPlatform for RecordingPlatform {
    fn send_message(
        &self,
        channel: Snowflake,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<ChatMessage>> {
        let platform = self.clone();
        Box::pin(async move {
            let gate = platform.inner.send_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                platform.inner.send_waiting.notify_one();
                gate.acquire().await.expect("send gate closed").forget();
            }
            if let Some(failure) = platform.failure(Op::Send) {
                return Err(failure.into_error("send_message"));
            }
            let id = platform.next_id();
            platform.record(PlatformCall::Send {
                channel,
                message: message.clone(),
                id,
            });
            let sent = ChatMessage {
                id,
                channel_id: channel,
                author: User {
                    id: BOT_USER,
                    username: "gatehouse".into(),
                    bot: true,
                },
                content: message.content.unwrap_or_default(),
            };
            platform
                .inner
                .history
                .lock()
                .unwrap()
                .entry(channel)
                .or_default()
                .push(sent.clone());
            Ok(sent)
        })
    }

    fn add_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: String,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            if let Some(failure) = platform.failure(Op::React) {
                return Err(failure.into_error("add_reaction"));
            }
            platform.record(PlatformCall::React {
                channel,
                message,
                emoji,
            });
            Ok(())
        })
    }

    fn delete_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            if let Some(failure) = platform.failure(Op::Delete) {
                return Err(failure.into_error("delete_message"));
            }
            platform.record(PlatformCall::Delete { channel, message });
            if let Some(messages) = platform.inner.history.lock().unwrap().get_mut(&channel) {
                messages.retain(|candidate| candidate.id != message);
            }
            Ok(())
        })
    }

    fn fetch_messages(
        &self,
        channel: Snowflake,
        query: HistoryQuery,
    ) -> BoxFuture<'static, PlatformResult<Vec<ChatMessage>>> {
        let platform = self.clone();
        Box::pin(async move {
            if let Some(failure) = platform.failure(Op::FetchMessages) {
                return Err(failure.into_error("fetch_messages"));
            }
            let history = platform.inner.history.lock().unwrap();
            let page = history
                .get(&channel)
                .map(|messages| {
                    messages
                        .iter()
                        .rev()
                        .filter(|message| query.before.is_none_or(|before| message.id < before))
                        .take(query.limit as usize)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            Ok(page)
        })
    }

    fn fetch_member(
        &self,
        _guild: Snowflake,
        user: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<Member>> {
        let platform = self.clone();
        Box::pin(async move {
            if let Some(failure) = platform.failure(Op::FetchMember) {
                return Err(failure.into_error("fetch_member"));
            }
            platform
                .inner
                .members
                .lock()
                .unwrap()
                .get(&user)
                .cloned()
                .ok_or(PlatformError::NotFound {
                    operation: "fetch_member",
                })
        })
    }

    fn grant_role(
        &self,
        guild: Snowflake,
        user: Snowflake,
        role: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            if let Some(failure) = platform.failure(Op::GrantRole) {
                return Err(failure.into_error("grant_role"));
            }
            platform.record(PlatformCall::GrantRole { guild, user, role });
            Ok(())
        })
    }

    fn timeout_member(
        &self,
        guild: Snowflake,
        user: Snowflake,
        duration: Duration,
        reason: String,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            if let Some(failure) = platform.failure(Op::Timeout) {
                return Err(failure.into_error("timeout_member"));
            }
            platform.record(PlatformCall::Timeout {
                guild,
                user,
                duration,
                reason,
            });
            Ok(())
        })
    }

    fn respond_to_interaction(
        &self,
        interaction: InteractionHandle,
        reply: InteractionReply,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            if let Some(failure) = platform.failure(Op::Respond) {
                return Err(failure.into_error("respond_to_interaction"));
            }
            platform.record(PlatformCall::Respond {
                interaction: interaction.id,
                reply,
            });
            Ok(())
        })
    }

    fn register_message_command(
        &self,
        guild: Snowflake,
        name: String,
    ) -> BoxFuture<'static, PlatformResult<()>> {
        let platform = self.clone();
        Box::pin(async move {
            if let Some(failure) = platform.failure(Op::RegisterCommand) {
                return Err(failure.into_error("register_message_command"));
            }
            platform.record(PlatformCall::RegisterCommand { guild, name });
            Ok(())
        })
    }
}

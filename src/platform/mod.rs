//! Chat platform abstraction and its Discord bindings.

pub mod error;
pub mod gateway;
pub mod models;
/// REST client implementing [`ChatPlatform`].
pub mod rest;
#[cfg(test)]
pub mod testing;

use std::time::Duration;

use futures::future::BoxFuture;

use self::{
    error::PlatformResult,
    models::{
        ChatMessage, HistoryQuery, InteractionHandle, InteractionReply, Member, OutgoingMessage,
        Snowflake,
    },
};

/// Outbound operations the bot issues against the chat platform.
///
/// None of these calls is retried by the caller; failures are classified by
/// [`error::PlatformError`] and handled one-way by the services.
pub trait ChatPlatform: Send + Sync {
    /// Post a message to a channel.
    fn send_message(
        &self,
        channel: Snowflake,
        message: OutgoingMessage,
    ) -> BoxFuture<'static, PlatformResult<ChatMessage>>;
    /// React to a message as the bot.
    fn add_reaction(
        &self,
        channel: Snowflake,
        message: Snowflake,
        emoji: String,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    /// Delete a message.
    fn delete_message(
        &self,
        channel: Snowflake,
        message: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    /// Reverse-chronological page of channel history (newest first).
    fn fetch_messages(
        &self,
        channel: Snowflake,
        query: HistoryQuery,
    ) -> BoxFuture<'static, PlatformResult<Vec<ChatMessage>>>;
    /// Look up a guild member.
    fn fetch_member(
        &self,
        guild: Snowflake,
        user: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<Member>>;
    /// Add a role to a guild member.
    fn grant_role(
        &self,
        guild: Snowflake,
        user: Snowflake,
        role: Snowflake,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    /// Apply a timed communication restriction to a member.
    fn timeout_member(
        &self,
        guild: Snowflake,
        user: Snowflake,
        duration: Duration,
        reason: String,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    /// Answer an interaction, as a new message or by updating the component's message.
    fn respond_to_interaction(
        &self,
        interaction: InteractionHandle,
        reply: InteractionReply,
    ) -> BoxFuture<'static, PlatformResult<()>>;
    /// Create or overwrite the guild-scoped message context-menu command `name`.
    fn register_message_command(
        &self,
        guild: Snowflake,
        name: String,
    ) -> BoxFuture<'static, PlatformResult<()>>;
}

//! Closed set of inbound events and their decoding from gateway dispatch payloads.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::platform::models::{ChatMessage, EmojiRef, InteractionHandle, Member, Snowflake, User};

const DISPATCH_MESSAGE_CREATE: &str = "MESSAGE_CREATE";
const DISPATCH_REACTION_ADD: &str = "MESSAGE_REACTION_ADD";
const DISPATCH_INTERACTION_CREATE: &str = "INTERACTION_CREATE";

const INTERACTION_APPLICATION_COMMAND: u8 = 2;
const INTERACTION_MESSAGE_COMPONENT: u8 = 3;
const COMMAND_TYPE_MESSAGE: u8 = 3;

/// Everything the dispatcher routes to a subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    /// A message was created in a guild channel.
    MessagePosted(ChatMessage),
    /// A reaction was added to a message.
    ReactionAdded(ReactionAdded),
    /// A message context-menu command was used.
    ContextMenuInvoked(ContextMenuInvocation),
    /// A bot-created button or select was used.
    ComponentInvoked(ComponentInvocation),
    /// Outer period of the counting filler elapsed.
    FillerTick,
}

/// A reaction was added to a message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReactionAdded {
    /// User who reacted.
    pub user_id: Snowflake,
    /// Channel of the reacted message.
    pub channel_id: Snowflake,
    /// Message that received the reaction.
    pub message_id: Snowflake,
    /// Absent for direct messages.
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    /// Present for guild reactions.
    #[serde(default)]
    pub member: Option<Member>,
    /// Emoji that was added.
    pub emoji: EmojiRef,
}

/// A message context-menu command was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextMenuInvocation {
    /// Handle used to answer the interaction.
    pub interaction: InteractionHandle,
    /// Guild the command was used in.
    pub guild_id: Snowflake,
    /// Channel the command was used in.
    pub channel_id: Snowflake,
    /// Registered name of the command.
    pub command_name: String,
    /// Member who used the command.
    pub invoker: Member,
    /// Message the command was used on.
    pub target_message: ChatMessage,
}

/// A button or select created by the bot was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInvocation {
    /// Handle used to answer the interaction.
    pub interaction: InteractionHandle,
    /// User who used the component.
    pub invoker: User,
    /// Routing identifier set when the component was created.
    pub custom_id: String,
    /// Selected values (select menus only).
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawInteraction {
    id: Snowflake,
    token: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    guild_id: Option<Snowflake>,
    #[serde(default)]
    channel_id: Option<Snowflake>,
    #[serde(default)]
    member: Option<Member>,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawCommandData {
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    target_id: Option<Snowflake>,
    #[serde(default)]
    resolved: RawResolved,
}

#[derive(Debug, Default, Deserialize)]
struct RawResolved {
    #[serde(default)]
    messages: HashMap<String, ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct RawComponentData {
    custom_id: String,
    #[serde(default)]
    values: Vec<String>,
}

impl BotEvent {
    /// Decode a gateway dispatch (`t`, `d`) into an event.
    ///
    /// Returns `Ok(None)` for dispatches the bot does not consume, including
    /// interactions outside a guild.
    pub fn from_dispatch(kind: &str, data: Value) -> serde_json::Result<Option<Self>> {
        match kind {
            DISPATCH_MESSAGE_CREATE => {
                serde_json::from_value(data).map(|message| Some(BotEvent::MessagePosted(message)))
            }
            DISPATCH_REACTION_ADD => {
                serde_json::from_value(data).map(|reaction| Some(BotEvent::ReactionAdded(reaction)))
            }
            DISPATCH_INTERACTION_CREATE => Self::from_interaction(serde_json::from_value(data)?),
            _ => Ok(None),
        }
    }

    fn from_interaction(raw: RawInteraction) -> serde_json::Result<Option<Self>> {
        let (Some(member), Some(data)) = (raw.member, raw.data) else {
            return Ok(None);
        };
        let interaction = InteractionHandle {
            id: raw.id,
            token: raw.token,
        };

        match raw.kind {
            INTERACTION_APPLICATION_COMMAND => {
                let data: RawCommandData = serde_json::from_value(data)?;
                if data.kind != COMMAND_TYPE_MESSAGE {
                    return Ok(None);
                }
                let (Some(guild_id), Some(channel_id), Some(target_id)) =
                    (raw.guild_id, raw.channel_id, data.target_id)
                else {
                    return Ok(None);
                };
                let mut messages = data.resolved.messages;
                let Some(target_message) = messages.remove(&target_id.to_string()) else {
                    return Ok(None);
                };
                Ok(Some(BotEvent::ContextMenuInvoked(ContextMenuInvocation {
                    interaction,
                    guild_id,
                    channel_id,
                    command_name: data.name,
                    invoker: member,
                    target_message,
                })))
            }
            INTERACTION_MESSAGE_COMPONENT => {
                let data: RawComponentData = serde_json::from_value(data)?;
                Ok(Some(BotEvent::ComponentInvoked(ComponentInvocation {
                    interaction,
                    invoker: member.user,
                    custom_id: data.custom_id,
                    values: data.values,
                })))
            }
            _ => Ok(None),
        }
    }
}

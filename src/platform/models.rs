//! Wire-level types shared by the REST client, the gateway decoder and the bot services.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

/// Interaction response flag that restricts visibility to the invoking user.
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

/// Discord identifier (64-bit, transported as a decimal string).
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(#[serde_as(as = "PickFirst<(DisplayFromStr, _)>")] pub u64);

impl Snowflake {
    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Account that authored a message or triggered an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account identifier.
    pub id: Snowflake,
    /// Display handle.
    #[serde(default)]
    pub username: String,
    /// True for automated (bot) accounts.
    #[serde(default)]
    pub bot: bool,
}

/// Guild member: a user plus the roles it holds in the guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Account behind the membership.
    pub user: User,
    /// Roles held in the guild.
    #[serde(default)]
    pub roles: Vec<Snowflake>,
}

impl Member {
    /// Whether the member holds at least one of `roles`.
    pub fn has_any_role(&self, roles: &[Snowflake]) -> bool {
        self.roles.iter().any(|role| roles.contains(role))
    }
}

/// Message as returned by the history endpoint and the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier.
    pub id: Snowflake,
    /// Channel the message belongs to.
    pub channel_id: Snowflake,
    /// Author of the message.
    pub author: User,
    /// Text content, empty for embed-only messages.
    #[serde(default)]
    pub content: String,
}

/// Emoji reference as carried by reaction events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiRef {
    /// Present for custom guild emoji only.
    #[serde(default)]
    pub id: Option<Snowflake>,
    /// Unicode glyph for standard emoji, short name for custom emoji.
    #[serde(default)]
    pub name: Option<String>,
}

impl EmojiRef {
    /// Reference to a standard unicode emoji.
    pub fn unicode(glyph: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(glyph.into()),
        }
    }

    /// Identity string in the `name` / `name:id` form accepted by the reaction endpoints.
    pub fn identity(&self) -> String {
        match (&self.name, self.id) {
            (Some(name), Some(id)) => format!("{name}:{id}"),
            (Some(name), None) => name.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Compare against a configured affordance written either as the glyph, `name:id`
    /// or the `<:name:id>` mention form.
    pub fn matches(&self, affordance: &str) -> bool {
        let normalized = affordance
            .trim()
            .trim_start_matches("<a:")
            .trim_start_matches("<:")
            .trim_end_matches('>');
        !normalized.is_empty() && self.identity() == normalized
    }
}

/// Footer block of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    /// Footer text.
    pub text: String,
}

/// Named field of an embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    /// Field heading.
    pub name: String,
    /// Field body.
    pub value: String,
    /// Render next to the neighbouring fields.
    #[serde(default)]
    pub inline: bool,
}

/// Rich embed attached to outgoing messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Embed heading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Embed body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Accent colour as `0xRRGGBB`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// Footer block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    /// Named fields, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    /// RFC 3339 timestamp rendered by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Raw component type codes.
pub mod component_kind {
    /// Container row for other components.
    pub const ACTION_ROW: u8 = 1;
    /// Clickable button.
    pub const BUTTON: u8 = 2;
    /// Select menu with string options.
    pub const STRING_SELECT: u8 = 3;
}

/// Visual style of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    /// Blurple.
    Primary = 1,
    /// Grey.
    Secondary = 2,
    /// Green.
    Success = 3,
    /// Red.
    Danger = 4,
}

/// Option entry of a string select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Text shown to the user.
    pub label: String,
    /// Value reported when the option is picked.
    pub value: String,
}

/// Interactive message component (action row, button or string select).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Raw type code, see [`component_kind`].
    #[serde(rename = "type")]
    pub kind: u8,
    /// Routing identifier (buttons and selects).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    /// Button text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Raw [`ButtonStyle`] code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<u8>,
    /// Hint shown by an empty select.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Select options.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
    /// Children of an action row.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

impl Component {
    fn empty(kind: u8) -> Self {
        Self {
            kind,
            custom_id: None,
            label: None,
            style: None,
            placeholder: None,
            options: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Top-level row wrapping interactive children.
    pub fn row(children: Vec<Component>) -> Self {
        Self {
            components: children,
            ..Self::empty(component_kind::ACTION_ROW)
        }
    }

    /// Clickable button routed back to the bot through `custom_id`.
    pub fn button(custom_id: impl Into<String>, label: impl Into<String>, style: ButtonStyle) -> Self {
        Self {
            custom_id: Some(custom_id.into()),
            label: Some(label.into()),
            style: Some(style as u8),
            ..Self::empty(component_kind::BUTTON)
        }
    }

    /// Single-choice string select.
    pub fn select(
        custom_id: impl Into<String>,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> Self {
        Self {
            custom_id: Some(custom_id.into()),
            placeholder: Some(placeholder.into()),
            options,
            ..Self::empty(component_kind::STRING_SELECT)
        }
    }
}

/// Body of a message sent to a channel or attached to an interaction response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attached embeds.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    /// Always serialised so that updates clear previous components.
    pub components: Vec<Component>,
    /// Message flags such as [`EPHEMERAL_FLAG`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl OutgoingMessage {
    /// Plain text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Message carrying a single embed.
    pub fn embed(embed: Embed) -> Self {
        Self {
            embeds: vec![embed],
            ..Self::default()
        }
    }

    /// Attach component rows.
    pub fn with_components(mut self, components: Vec<Component>) -> Self {
        self.components = components;
        self
    }

    /// Restrict visibility to the invoking user (interaction responses only).
    pub fn ephemeral(mut self) -> Self {
        self.flags = Some(self.flags.unwrap_or(0) | EPHEMERAL_FLAG);
        self
    }

    /// Whether the ephemeral flag is set.
    pub fn is_ephemeral(&self) -> bool {
        self.flags.is_some_and(|flags| flags & EPHEMERAL_FLAG != 0)
    }
}

/// Identity and continuation token of an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionHandle {
    /// Interaction identifier.
    pub id: Snowflake,
    /// Continuation token for the response.
    pub token: String,
}

/// How an interaction reply is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// New (ephemeral) message in response to the interaction.
    Message = 4,
    /// Edit the message that carries the pressed component.
    UpdateMessage = 7,
}

/// Response to an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionReply {
    /// Rendering mode.
    pub kind: ReplyKind,
    /// Body of the reply.
    pub message: OutgoingMessage,
}

impl InteractionReply {
    /// Private reply visible only to the invoker.
    pub fn private(message: OutgoingMessage) -> Self {
        Self {
            kind: ReplyKind::Message,
            message: message.ephemeral(),
        }
    }

    /// Replace the (already private) message that carries the component.
    pub fn update(message: OutgoingMessage) -> Self {
        Self {
            kind: ReplyKind::UpdateMessage,
            message: message.ephemeral(),
        }
    }
}

/// Cursor for the reverse-chronological history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Number of messages requested (1..=100).
    pub limit: u8,
    /// Only return messages older than this one.
    pub before: Option<Snowflake>,
}

impl HistoryQuery {
    /// Most recent `limit` messages.
    pub fn latest(limit: u8) -> Self {
        Self {
            limit,
            before: None,
        }
    }
}

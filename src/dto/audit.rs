//! Structured audit record posted to the moderation log channel.

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    platform::models::{Embed, EmbedField, Snowflake},
    state::timeout_flow::TimeoutDuration,
};

/// Marker used when the origin message had no text.
pub const NO_CONTENT_MARKER: &str = "*(no content)*";
/// Marker used when the target has no recent messages in the channel.
pub const NO_HISTORY_MARKER: &str = "*(no history)*";
/// Number of recent messages quoted in the record.
pub const EXCERPT_LEN: usize = 5;

/// Embed field values are capped by the platform.
const FIELD_VALUE_LIMIT: usize = 1024;
const EXCERPT_LINE_LIMIT: usize = 180;
const AUDIT_COLOR: u32 = 0xE7_4C_3C;

/// What gets logged after a successful timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Moderator who confirmed the timeout.
    pub moderator: Snowflake,
    /// Member who was timed out.
    pub target: Snowflake,
    /// Length of the restriction.
    pub duration: TimeoutDuration,
    /// Channel the command was invoked in.
    pub origin_channel: Snowflake,
    /// Text of the message the command was invoked on.
    pub origin_content: String,
    /// Most recent first, at most [`EXCERPT_LEN`] entries.
    pub recent_messages: Vec<String>,
}

impl AuditRecord {
    /// Render the record as a log-channel embed.
    pub fn to_embed(&self) -> Embed {
        let message = if self.origin_content.trim().is_empty() {
            NO_CONTENT_MARKER.to_string()
        } else {
            truncate(&self.origin_content, FIELD_VALUE_LIMIT)
        };

        let recent = if self.recent_messages.is_empty() {
            NO_HISTORY_MARKER.to_string()
        } else {
            let lines = self
                .recent_messages
                .iter()
                .take(EXCERPT_LEN)
                .map(|content| {
                    if content.trim().is_empty() {
                        format!("• {NO_CONTENT_MARKER}")
                    } else {
                        format!("• {}", truncate(content, EXCERPT_LINE_LIMIT))
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            truncate(&lines, FIELD_VALUE_LIMIT)
        };

        Embed {
            title: Some("Member timed out".to_string()),
            color: Some(AUDIT_COLOR),
            fields: vec![
                field("Moderator", format!("<@{}>", self.moderator), true),
                field("Member", format!("<@{}>", self.target), true),
                field("Duration", self.duration.label().to_string(), true),
                field("Channel", format!("<#{}>", self.origin_channel), true),
                field("Message", message, false),
                field("Recent messages", recent, false),
            ],
            timestamp: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            ..Embed::default()
        }
    }
}

fn field(name: &str, value: String, inline: bool) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value,
        inline,
    }
}

/// Cut `text` to at most `limit` characters, marking the cut with an ellipsis.
fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

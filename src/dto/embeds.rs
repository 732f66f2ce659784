//! Fixed embeds sent by the verification gate.

use crate::platform::models::{Embed, EmbedFooter};

/// Green accent of the verification embed.
const VERIFICATION_COLOR: u32 = 0x2E_CC_71;

/// Embed posted once as the verification anchor.
pub fn verification_embed(affordance: &str) -> Embed {
    let affordance = if affordance.contains(':') && !affordance.starts_with('<') {
        format!("<:{affordance}>")
    } else {
        affordance.to_string()
    };
    Embed {
        title: Some("✅ Verification".to_string()),
        description: Some(format!(
            "By reacting to this message with the {affordance} emoji you confirm that you have \
             **read** and will **respect** the community rules."
        )),
        color: Some(VERIFICATION_COLOR),
        footer: Some(EmbedFooter {
            text: "Welcome to the community!".to_string(),
        }),
        ..Embed::default()
    }
}

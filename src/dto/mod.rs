/// Audit record of applied timeouts.
pub mod audit;
/// Timeout workflow components.
pub mod components;
/// Verification embed.
pub mod embeds;
/// Inbound events.
pub mod events;
/// Keep-alive health payload.
pub mod health;

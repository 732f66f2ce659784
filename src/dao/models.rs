use serde::{Deserialize, Serialize};

/// Persisted reference to the verification anchor message.
///
/// The channel is not stored: it comes from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// Raw message identifier, `null` until the anchor has been created.
    #[serde(default)]
    pub message_id: Option<u64>,
}

/// Persisted counting game cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    /// Last number accepted in the counting channel; 0 when nothing was accepted yet.
    pub last_accepted_number: u64,
}

use serde::Serialize;

/// Health payload returned by the keep-alive `/health` route.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the verification anchor is in place.
    pub anchor_ready: bool,
    /// Last number accepted by the counting game, `0` when none.
    pub last_accepted_number: u64,
    /// Number of moderator timeout workflows in progress.
    pub pending_timeouts: usize,
}

impl HealthResponse {
    /// Build the payload; the bot is degraded while the verification gate is unusable.
    pub fn new(anchor_ready: bool, last_accepted_number: u64, pending_timeouts: usize) -> Self {
        let status = if anchor_ready { "ok" } else { "degraded" };
        Self {
            status: status.to_string(),
            anchor_ready,
            last_accepted_number,
            pending_timeouts,
        }
    }
}

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::platform::models::Snowflake;

/// Restriction lengths offered to moderators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutDuration {
    /// 15 minutes.
    FifteenMinutes,
    /// 1 hour.
    OneHour,
    /// 3 hours.
    ThreeHours,
    /// 6 hours.
    SixHours,
    /// 24 hours.
    OneDay,
}

impl TimeoutDuration {
    /// Every option, in the order presented to the moderator.
    pub const ALL: [TimeoutDuration; 5] = [
        TimeoutDuration::FifteenMinutes,
        TimeoutDuration::OneHour,
        TimeoutDuration::ThreeHours,
        TimeoutDuration::SixHours,
        TimeoutDuration::OneDay,
    ];

    /// Length of the restriction.
    pub fn as_duration(self) -> Duration {
        let minutes = match self {
            TimeoutDuration::FifteenMinutes => 15,
            TimeoutDuration::OneHour => 60,
            TimeoutDuration::ThreeHours => 3 * 60,
            TimeoutDuration::SixHours => 6 * 60,
            TimeoutDuration::OneDay => 24 * 60,
        };
        Duration::from_secs(minutes * 60)
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            TimeoutDuration::FifteenMinutes => "15 minutes",
            TimeoutDuration::OneHour => "1 hour",
            TimeoutDuration::ThreeHours => "3 hours",
            TimeoutDuration::SixHours => "6 hours",
            TimeoutDuration::OneDay => "1 day",
        }
    }

    /// Stable value carried by the select option.
    pub fn value(self) -> &'static str {
        match self {
            TimeoutDuration::FifteenMinutes => "15m",
            TimeoutDuration::OneHour => "1h",
            TimeoutDuration::ThreeHours => "3h",
            TimeoutDuration::SixHours => "6h",
            TimeoutDuration::OneDay => "1d",
        }
    }

    /// Inverse of [`TimeoutDuration::value`].
    pub fn from_value(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.value() == value)
    }
}

/// Everything the workflow needs to know about the moderation target.
///
/// Only platform IDs are kept; members and messages are looked up live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutRequest {
    /// Guild of the target.
    pub guild_id: Snowflake,
    /// Channel the command was invoked in.
    pub channel_id: Snowflake,
    /// Message the command was invoked on.
    pub target_message: Snowflake,
    /// Author of that message.
    pub target_member: Snowflake,
    /// Display name of the target.
    pub target_name: String,
    /// Moderator who started the workflow.
    pub moderator: Snowflake,
    /// Display name of the moderator.
    pub moderator_name: String,
    /// Content of the message the command was invoked on.
    pub origin_content: String,
    /// Set once a duration was picked.
    pub chosen_duration: Option<TimeoutDuration>,
}

/// Phases of a single timeout workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Waiting for the yes/no answer.
    AwaitingConfirmation,
    /// Waiting for a duration to be picked.
    AwaitingDuration,
    /// The restriction call is in flight.
    Applying(TimeoutDuration),
    /// The restriction is in place.
    Applied(TimeoutDuration),
    /// The moderator declined.
    Cancelled,
    /// A step deadline passed.
    Expired,
    /// The platform refused the restriction.
    Failed,
}

impl TimeoutPhase {
    /// Whether no further event is accepted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TimeoutPhase::Applied(_)
                | TimeoutPhase::Cancelled
                | TimeoutPhase::Expired
                | TimeoutPhase::Failed
        )
    }
}

/// Inputs that drive the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutEvent {
    /// Moderator confirmed they want to time the member out.
    Confirm,
    /// Moderator aborted the workflow.
    Cancel,
    /// Moderator picked a duration.
    SelectDuration(TimeoutDuration),
    /// The platform accepted the restriction.
    RestrictionApplied,
    /// The platform refused the restriction.
    RestrictionFailed,
    /// The current step timed out.
    Expire,
}

impl TimeoutEvent {
    /// Events produced by a human pressing a component (and therefore actor-checked).
    fn requires_actor(self) -> bool {
        matches!(
            self,
            TimeoutEvent::Confirm | TimeoutEvent::Cancel | TimeoutEvent::SelectDuration(_)
        )
    }
}

/// Errors returned when driving the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    /// Someone other than the invoking moderator pressed a control.
    #[error("only the invoking moderator {expected} may act, got {actual}")]
    ActorMismatch {
        /// Moderator who started the workflow.
        expected: Snowflake,
        /// User who pressed the control.
        actual: Snowflake,
    },
    /// The event does not apply to the current phase.
    #[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
    InvalidTransition {
        /// Phase the workflow was in.
        from: TimeoutPhase,
        /// Rejected event.
        event: TimeoutEvent,
    },
    /// The step deadline passed before the input arrived.
    #[error("timeout workflow step expired")]
    Expired,
}

/// Explicit state machine for one moderator timeout request.
#[derive(Debug, Clone)]
pub struct TimeoutFlow {
    request: TimeoutRequest,
    phase: TimeoutPhase,
    /// Incremented on every transition so stale expiry timers can be recognised.
    version: u64,
    step_started: Instant,
    step_timeout: Duration,
}

impl TimeoutFlow {
    /// Start a flow awaiting confirmation.
    pub fn new(request: TimeoutRequest, step_timeout: Duration) -> Self {
        Self {
            request,
            phase: TimeoutPhase::AwaitingConfirmation,
            version: 0,
            step_started: Instant::now(),
            step_timeout,
        }
    }

    /// Data captured when the workflow started.
    pub fn request(&self) -> &TimeoutRequest {
        &self.request
    }

    /// Current phase.
    pub fn phase(&self) -> TimeoutPhase {
        self.phase
    }

    /// Bumped on every accepted transition; expiry timers compare against it.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the current interactive step outlived its timeout.
    pub fn step_elapsed(&self) -> bool {
        self.step_started.elapsed() >= self.step_timeout
    }

    /// Apply an event on behalf of `actor` (`None` for system events).
    pub fn apply(
        &mut self,
        actor: Option<Snowflake>,
        event: TimeoutEvent,
    ) -> Result<TimeoutPhase, WorkflowError> {
        if event.requires_actor() {
            let actual = actor.ok_or(WorkflowError::InvalidTransition {
                from: self.phase,
                event,
            })?;
            if actual != self.request.moderator {
                return Err(WorkflowError::ActorMismatch {
                    expected: self.request.moderator,
                    actual,
                });
            }
            if self.is_interactive() && self.step_elapsed() {
                self.enter(TimeoutPhase::Expired);
                return Err(WorkflowError::Expired);
            }
        }

        let next = self.compute_transition(event)?;
        if let TimeoutEvent::SelectDuration(duration) = event {
            self.request.chosen_duration = Some(duration);
        }
        self.enter(next);
        Ok(next)
    }

    /// Expire the flow if it is still in the step identified by `version`.
    pub fn expire_if_current(&mut self, version: u64) -> bool {
        if version != self.version || !self.is_interactive() {
            return false;
        }
        self.enter(TimeoutPhase::Expired);
        true
    }

    fn is_interactive(&self) -> bool {
        matches!(
            self.phase,
            TimeoutPhase::AwaitingConfirmation | TimeoutPhase::AwaitingDuration
        )
    }

    fn enter(&mut self, phase: TimeoutPhase) {
        self.phase = phase;
        self.version += 1;
        self.step_started = Instant::now();
    }

    fn compute_transition(&self, event: TimeoutEvent) -> Result<TimeoutPhase, WorkflowError> {
        let next = match (self.phase, event) {
            (TimeoutPhase::AwaitingConfirmation, TimeoutEvent::Confirm) => {
                TimeoutPhase::AwaitingDuration
            }
            (
                TimeoutPhase::AwaitingConfirmation | TimeoutPhase::AwaitingDuration,
                TimeoutEvent::Cancel,
            ) => TimeoutPhase::Cancelled,
            (TimeoutPhase::AwaitingDuration, TimeoutEvent::SelectDuration(duration)) => {
                TimeoutPhase::Applying(duration)
            }
            (TimeoutPhase::Applying(duration), TimeoutEvent::RestrictionApplied) => {
                TimeoutPhase::Applied(duration)
            }
            (TimeoutPhase::Applying(_), TimeoutEvent::RestrictionFailed) => TimeoutPhase::Failed,
            (
                TimeoutPhase::AwaitingConfirmation | TimeoutPhase::AwaitingDuration,
                TimeoutEvent::Expire,
            ) => TimeoutPhase::Expired,
            (from, event) => return Err(WorkflowError::InvalidTransition { from, event }),
        };
        Ok(next)
    }
}

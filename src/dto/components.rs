//! Interactive components of the timeout workflow and their routing identifiers.

use uuid::Uuid;

use crate::{
    platform::models::{ButtonStyle, Component, SelectOption},
    state::timeout_flow::TimeoutDuration,
};

const TIMEOUT_PREFIX: &str = "timeout";

/// Control pressed inside a timeout workflow message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// "Yes" button of the confirmation prompt.
    Confirm,
    /// "No" button of the confirmation prompt.
    Cancel,
    /// Duration select menu.
    Duration,
}

impl TimeoutAction {
    fn as_str(self) -> &'static str {
        match self {
            TimeoutAction::Confirm => "confirm",
            TimeoutAction::Cancel => "cancel",
            TimeoutAction::Duration => "duration",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "confirm" => Some(TimeoutAction::Confirm),
            "cancel" => Some(TimeoutAction::Cancel),
            "duration" => Some(TimeoutAction::Duration),
            _ => None,
        }
    }
}

/// Decoded `custom_id` of a timeout workflow component (`timeout:<session>:<action>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutComponentId {
    /// Workflow the component belongs to.
    pub session: Uuid,
    /// Control that was used.
    pub action: TimeoutAction,
}

impl TimeoutComponentId {
    /// Identifier for `action` inside `session`.
    pub fn new(session: Uuid, action: TimeoutAction) -> Self {
        Self { session, action }
    }

    /// Render as a `custom_id` string.
    pub fn encode(self) -> String {
        format!("{TIMEOUT_PREFIX}:{}:{}", self.session, self.action.as_str())
    }

    /// Returns `None` for identifiers that do not belong to the timeout workflow.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.splitn(3, ':');
        if parts.next()? != TIMEOUT_PREFIX {
            return None;
        }
        let session = Uuid::parse_str(parts.next()?).ok()?;
        let action = TimeoutAction::parse(parts.next()?)?;
        Some(Self { session, action })
    }
}

/// Yes / Cancel buttons shown while awaiting confirmation.
pub fn confirmation_components(session: Uuid) -> Vec<Component> {
    vec![Component::row(vec![
        Component::button(
            TimeoutComponentId::new(session, TimeoutAction::Confirm).encode(),
            "Yes",
            ButtonStyle::Danger,
        ),
        Component::button(
            TimeoutComponentId::new(session, TimeoutAction::Cancel).encode(),
            "Cancel",
            ButtonStyle::Secondary,
        ),
    ])]
}

/// Duration picker shown once the moderator confirmed.
pub fn duration_components(session: Uuid) -> Vec<Component> {
    let options = TimeoutDuration::ALL
        .into_iter()
        .map(|duration| SelectOption {
            label: duration.label().to_string(),
            value: duration.value().to_string(),
        })
        .collect();

    vec![
        Component::row(vec![Component::select(
            TimeoutComponentId::new(session, TimeoutAction::Duration).encode(),
            "Choose a timeout duration",
            options,
        )]),
        Component::row(vec![Component::button(
            TimeoutComponentId::new(session, TimeoutAction::Cancel).encode(),
            "Cancel",
            ButtonStyle::Secondary,
        )]),
    ]
}

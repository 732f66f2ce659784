use thiserror::Error;

use crate::{
    dao::storage::StorageError, platform::error::PlatformError,
    state::timeout_flow::WorkflowError,
};

/// Errors that can occur in service layer operations.
///
/// Nothing here is fatal to the process: the dispatcher logs every error and
/// keeps handling events.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Persisting a record failed.
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
    /// An outbound platform call failed.
    #[error("platform call failed: {0}")]
    Platform(#[from] PlatformError),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl ServiceError {
    /// True when the platform refused the operation for lack of permission.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ServiceError::Platform(err) if err.is_permission_denied())
    }
}

impl From<WorkflowError> for ServiceError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::ActorMismatch { .. } => ServiceError::InvalidState(
                "timeout controls belong to another moderator".into(),
            ),
            WorkflowError::InvalidTransition { from, event } => ServiceError::InvalidState(
                format!("cannot apply {event:?} while the timeout flow is {from:?}"),
            ),
            WorkflowError::Expired => {
                ServiceError::InvalidState("timeout workflow step expired".into())
            }
        }
    }
}

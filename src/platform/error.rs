//! Error types shared by the chat platform bindings.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`PlatformError`] failures.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Discord JSON error code for "Missing Permissions".
pub const MISSING_PERMISSIONS_CODE: u64 = 50013;

/// Failures that can occur while talking to the chat platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The platform refused a privileged operation.
    #[error("permission denied for `{operation}`")]
    PermissionDenied {
        /// Operation that was attempted.
        operation: &'static str,
    },
    /// The target resource (message, member, channel) does not exist anymore.
    #[error("`{operation}` target not found")]
    NotFound {
        /// Operation that was attempted.
        operation: &'static str,
    },
    /// The request hit a rate limit; nothing in the bot retries automatically.
    #[error("`{operation}` was rate limited (retry after {retry_after:?}s)")]
    RateLimited {
        /// Operation that was attempted.
        operation: &'static str,
        /// Seconds to wait, when the platform said so.
        retry_after: Option<f64>,
    },
    /// The platform answered with another unexpected status.
    #[error("unexpected status {status} for `{operation}`: {body}")]
    Status {
        /// Operation that was attempted.
        operation: &'static str,
        /// HTTP status of the response.
        status: StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The request could not be sent or timed out.
    #[error("failed to send `{operation}` request")]
    Request {
        /// Operation that was attempted.
        operation: &'static str,
        /// Transport failure.
        #[source]
        source: reqwest::Error,
    },
    /// The response payload could not be decoded.
    #[error("failed to decode `{operation}` response")]
    Decode {
        /// Operation that was attempted.
        operation: &'static str,
        /// Decoding failure.
        #[source]
        source: reqwest::Error,
    },
    /// The configured API base is not a valid URL.
    #[error("invalid platform API base `{url}`")]
    InvalidApiBase {
        /// Configured value.
        url: String,
    },
    /// Building the HTTP client failed.
    #[error("failed to build platform HTTP client")]
    ClientBuilder {
        /// Builder failure.
        #[source]
        source: reqwest::Error,
    },
}

impl PlatformError {
    /// True when the platform rejected the call for lack of permission.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, PlatformError::PermissionDenied { .. })
    }

    /// True when the target of the call no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }

    /// Classify a non-success response.
    pub fn from_status(
        operation: &'static str,
        status: StatusCode,
        code: Option<u64>,
        retry_after: Option<f64>,
        body: String,
    ) -> Self {
        match (status, code) {
            (_, Some(MISSING_PERMISSIONS_CODE)) | (StatusCode::FORBIDDEN, _) => {
                PlatformError::PermissionDenied { operation }
            }
            (StatusCode::NOT_FOUND, _) => PlatformError::NotFound { operation },
            (StatusCode::TOO_MANY_REQUESTS, _) => PlatformError::RateLimited {
                operation,
                retry_after,
            },
            _ => PlatformError::Status {
                operation,
                status,
                body,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_and_missing_permission_code_map_to_permission_denied() {
        let err = PlatformError::from_status("grant_role", StatusCode::FORBIDDEN, None, None, "".into());
        assert!(err.is_permission_denied());

        let err = PlatformError::from_status(
            "grant_role",
            StatusCode::BAD_REQUEST,
            Some(MISSING_PERMISSIONS_CODE),
            None,
            "".into(),
        );
        assert!(err.is_permission_denied());
    }

    #[test]
    fn not_found_and_rate_limit_are_classified() {
        let err = PlatformError::from_status("delete", StatusCode::NOT_FOUND, Some(10008), None, "".into());
        assert!(err.is_not_found());

        let err = PlatformError::from_status(
            "send",
            StatusCode::TOO_MANY_REQUESTS,
            None,
            Some(1.5),
            "".into(),
        );
        assert!(matches!(
            err,
            PlatformError::RateLimited {
                retry_after: Some(_),
                ..
            }
        ));
    }
}

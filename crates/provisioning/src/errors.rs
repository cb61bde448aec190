//! Error, retry-policy and classification types for the provisioning domain.
//!
//! [`DispatchError`] is the single error type that leaves a handler. Every
//! variant maps to a [`RetryPolicy`], and the dispatcher turns that policy
//! into a [`HandlerOutcome`](crate::HandlerOutcome). The classification is the
//! contract with the consumer: a retryable error is requeued, a non-retryable
//! one is dropped or dead-lettered.
//!
//! ## Rules
//!
//! - `Retryable`: backend timeouts, connection failures, 5xx responses,
//!   408 and 429 responses.
//! - `NonRetryable`: malformed envelopes or payloads, unknown message types,
//!   unknown backend instances, unconfigured backends, other 4xx responses,
//!   undecodable backend responses.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{InstanceName, UserId};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried; redelivery cannot change the result.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Backend errors
// ---------------------------------------------------------------------------

/// The external platform a backend call was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    /// The source-control platform.
    GitLab,
    /// The build-automation platform.
    Jenkins,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitLab => f.write_str("GitLab"),
            Self::Jenkins => f.write_str("Jenkins"),
        }
    }
}

/// Failure of a single backend API call.
///
/// Produced by the `gitlab` and `jenkins` adapter crates. Handlers never
/// inspect transport details; they ask for [`BackendError::retry_policy`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    /// The call did not complete within the configured per-call timeout.
    #[error("{backend} request timed out after {after:?}")]
    Timeout {
        /// Backend that was called.
        backend: Backend,
        /// Configured timeout that elapsed.
        after: Duration,
    },

    /// The backend could not be reached (DNS, connect, TLS, reset).
    #[error("{backend} unreachable: {message}")]
    Unreachable {
        /// Backend that was called.
        backend: Backend,
        /// Transport error description.
        message: String,
    },

    /// The backend answered with a non-success HTTP status.
    #[error("{backend} responded with status {status}: {message}")]
    Status {
        /// Backend that was called.
        backend: Backend,
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },

    /// The backend answered successfully but the body could not be decoded.
    #[error("{backend} returned an unexpected response: {message}")]
    InvalidResponse {
        /// Backend that was called.
        backend: Backend,
        /// Decoding error description.
        message: String,
    },
}

impl BackendError {
    /// Classifies the failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Timeout { .. } | Self::Unreachable { .. } => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Status { status, .. } if *status >= 500 || *status == 408 || *status == 429 => {
                RetryPolicy::Retryable { after: None }
            }
            Self::Status { .. } | Self::InvalidResponse { .. } => RetryPolicy::NonRetryable,
        }
    }

    /// Returns `true` when the backend reported that the target already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// A malformed envelope or payload.
///
/// Always permanent: the same bytes will fail the same way on redelivery.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The delivery body is not a JSON document of the expected shape.
    #[error("malformed message: {message}")]
    Malformed {
        /// Parser error description.
        message: String,
    },

    /// A required field is absent, null or blank.
    #[error("required field missing: {field}")]
    MissingField {
        /// Name of the missing field as it appears on the wire.
        field: &'static str,
    },

    /// A field is present but has the wrong type or an invalid value.
    #[error("invalid value for {field}: {message}")]
    InvalidField {
        /// Name of the offending field as it appears on the wire.
        field: String,
        /// Description of the problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Every way handling one message can fail.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// The envelope or the payload failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// `header.messageType` names no known message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// `gitType` does not resolve to a configured GitLab instance.
    #[error("unknown or unconfigured GitLab instance: {0}")]
    UnknownInstance(InstanceName),

    /// The message needs a backend that is not configured in this process.
    #[error("{0} backend is not configured")]
    BackendNotConfigured(Backend),

    /// A backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Adding several members failed for at least one user.
    #[error(
        "failed to add {} of {attempted} member(s): {}",
        .failures.len(),
        describe_member_failures(.failures)
    )]
    MemberFailures {
        /// Number of add-member calls issued.
        attempted: usize,
        /// Per-user failures in input order.
        failures: Vec<(UserId, BackendError)>,
    },
}

impl DispatchError {
    /// Classifies the failure.
    ///
    /// For [`DispatchError::MemberFailures`] any non-retryable per-user failure
    /// makes the whole message non-retryable; otherwise it is retryable.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Validation(_)
            | Self::UnknownMessageType(_)
            | Self::UnknownInstance(_)
            | Self::BackendNotConfigured(_) => RetryPolicy::NonRetryable,
            Self::Backend(err) => err.retry_policy(),
            Self::MemberFailures { failures, .. } => {
                if failures.iter().all(|(_, err)| err.retry_policy().is_retryable()) {
                    RetryPolicy::Retryable { after: None }
                } else {
                    RetryPolicy::NonRetryable
                }
            }
        }
    }
}

fn describe_member_failures(failures: &[(UserId, BackendError)]) -> String {
    failures
        .iter()
        .map(|(user, err)| format!("user {user}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

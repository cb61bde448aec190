//! The classified result of handling one message.

use crate::{DispatchError, RetryPolicy};

/// What happened to one message, as far as the broker needs to know.
///
/// The consumer maps `Success` to an acknowledgement, `PermanentFailure` to a
/// reject without requeue, and `TransientFailure` to a reject with requeue
/// (bounded by its redelivery ceiling).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Every backend operation the message asked for completed.
    Success,
    /// Redelivery cannot change the result.
    PermanentFailure {
        /// Human-readable description for logs and dead-letter diagnostics.
        reason: String,
    },
    /// The message may succeed if delivered again.
    TransientFailure {
        /// Human-readable description for logs.
        reason: String,
    },
}

impl HandlerOutcome {
    /// Returns `true` for [`HandlerOutcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Short label used as a structured log field.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PermanentFailure { .. } => "permanent_failure",
            Self::TransientFailure { .. } => "transient_failure",
        }
    }
}

impl From<&DispatchError> for HandlerOutcome {
    fn from(err: &DispatchError) -> Self {
        let reason = err.to_string();
        match err.retry_policy() {
            RetryPolicy::Retryable { .. } => Self::TransientFailure { reason },
            RetryPolicy::NonRetryable => Self::PermanentFailure { reason },
        }
    }
}

impl From<Result<(), DispatchError>> for HandlerOutcome {
    fn from(result: Result<(), DispatchError>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(err) => Self::from(&err),
        }
    }
}

//! Error and retry-policy types for the synchronisation domain.
//!
//! [`SyncError`] covers conditions that prevent a run from starting at all.
//! [`AdapterError`] is the single error type crossing the port seam: each
//! infrastructure crate has its own richer error enum and converts into
//! [`AdapterError`] when it answers a [`crate::ports`] call.
//!
//! Everything below the run boundary is recorded, not propagated: an
//! [`AdapterError`] becomes a `Failed` outcome for the feature or project it
//! belongs to.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Only read-only calls consult this. Mutating calls are attempted once
/// because the Target System does not deduplicate issues by title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. from `Retry-After`).
        /// `None` means the caller's own back-off applies.
        after: Option<Duration>,
    },
    /// Retrying cannot help.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Run-level errors
// ---------------------------------------------------------------------------

/// Errors that stop a run before any project is processed.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum SyncError {
    /// A client could not authenticate against its system.
    #[error("Initialization of {system} failed: {message}")]
    Initialization {
        /// Which system was being contacted (`"notion"`, `"github"`).
        system: String,
        /// Description of the failure.
        message: String,
    },

    /// The runtime configuration is invalid.
    ///
    /// Produced at load time; the worker never starts with an invalid config.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Per-call errors
// ---------------------------------------------------------------------------

/// Failure of a single Source or Target call.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum AdapterError {
    /// The call did not complete within the caller-supplied timeout.
    #[error("{operation} timed out after {after:?}")]
    TimedOut {
        /// Name of the call that timed out.
        operation: String,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The remote system could not be reached or answered with a transient
    /// failure (rate limit, 5xx).
    #[error("service unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// Back-off requested by the server, if any.
        retry_after: Option<Duration>,
    },

    /// Credentials were missing, invalid, or lacked the required scope.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Description returned by the server.
        message: String,
    },

    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was understood and refused (validation error, GraphQL
    /// `errors` payload).
    #[error("rejected: {message}")]
    Rejected {
        /// Description returned by the server.
        message: String,
    },

    /// The response could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl AdapterError {
    /// Returns whether retrying the same call could succeed.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::TimedOut { .. } => RetryPolicy::Retryable { after: None },
            Self::Unavailable { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Unauthorized { .. }
            | Self::NotFound(_)
            | Self::Rejected { .. }
            | Self::Malformed(_) => RetryPolicy::NonRetryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        let err = AdapterError::Unavailable {
            message: "502 Bad Gateway".into(),
            retry_after: Some(Duration::from_secs(3)),
        };
        assert_eq!(
            err.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(3))
            }
        );
        let timeout = AdapterError::TimedOut {
            operation: "list_items".into(),
            after: Duration::from_secs(30),
        };
        assert_eq!(timeout.retry_policy(), RetryPolicy::Retryable { after: None });
    }

    #[test]
    fn client_errors_are_final() {
        let err = AdapterError::Unauthorized {
            message: "Bad credentials".into(),
        };
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(
            AdapterError::Rejected {
                message: "name already exists".into()
            }
            .retry_policy(),
            RetryPolicy::NonRetryable
        );
    }
}

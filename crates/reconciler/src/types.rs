//! Shared value types: lifecycle status and wall-clock time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// The Source label that marks a record as participating in reconciliation,
/// unless a deployment configures a different one.
pub const DEFAULT_ACTIVE_LABEL: &str = "Active";

/// Lifecycle status of a Source record.
///
/// Only [`Status::Active`] projects and features are visible to the Target.
/// Every other label is kept verbatim for logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Participates in reconciliation.
    Active,
    /// Any other Source label (`"Draft"`, `"Done"`, missing, ...).
    Inactive(String),
}

impl Status {
    /// Classifies a Source label, comparing it exactly against `active_label`.
    pub fn from_label(label: &str, active_label: &str) -> Self {
        if label == active_label {
            Self::Active
        } else {
            Self::Inactive(label.to_owned())
        }
    }

    /// Returns `true` for [`Status::Active`].
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "{DEFAULT_ACTIVE_LABEL}"),
            Self::Inactive(label) => write!(f, "{label}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_exact_active_label_is_active() {
        assert!(Status::from_label("Active", DEFAULT_ACTIVE_LABEL).is_active());
        assert!(!Status::from_label("active", DEFAULT_ACTIVE_LABEL).is_active());
        assert_eq!(
            Status::from_label("Draft", DEFAULT_ACTIVE_LABEL),
            Status::Inactive("Draft".into())
        );
    }

    #[test]
    fn custom_active_label() {
        assert!(Status::from_label("In Progress", "In Progress").is_active());
    }
}

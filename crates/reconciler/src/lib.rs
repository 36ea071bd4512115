//! Synchronisation domain for Synapse.
//!
//! This crate holds every domain concept needed to mirror projects and
//! features from the Source System (Notion) into the Target System (GitHub
//! repositories, Projects v2 boards, and issues): newtype identifiers,
//! snapshot and target value types, the pure [`reconcile`] planner, outcome
//! and summary types, the run-log record, and the port traits the adapter
//! crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It decides *what* must change; the `worker` crate executes the decision
//! through the ports and infrastructure crates supply *how*.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProjectId`, `RepoName`, `ItemId`, ...) |
//! | [`types`] | `Status`, `Timestamp` |
//! | [`snapshot`] | Source-side snapshots |
//! | [`target`] | Target-side references and `TargetState` |
//! | [`plan`] | `reconcile`, `ProjectPlan`, `Operation` |
//! | [`outcome`] | Outcomes, `ProjectReport`, `RunSummary` |
//! | [`run_log`] | Run-log record and sinks |
//! | [`ports`] | `SourceSystem`, `TargetSystem` |
//! | [`errors`] | Error taxonomy and retry policy |

pub mod errors;
pub mod identifiers;
pub mod outcome;
pub mod plan;
pub mod ports;
pub mod run_log;
pub mod snapshot;
pub mod target;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{AdapterError, RetryPolicy, SyncError};
pub use identifiers::{FeatureId, ItemId, ProjectId, RepoName, RunId, TrackingProjectId};
pub use outcome::{
    OutcomeCounts, OutcomeKind, OutcomeScope, ProjectReport, ReconciliationOutcome, RunStatus,
    RunSummary,
};
pub use plan::{
    reconcile, BoardRef, Disposition, FeatureAction, FeaturePlan, Operation, ProjectPlan,
    DUPLICATE_FEATURE_TITLE,
};
pub use ports::{SourceSystem, TargetSystem};
pub use run_log::{LogStatus, MemoryRunLog, RunLog, RunLogRecord, SERVICE_NAME};
pub use snapshot::{FeatureSnapshot, ProjectRecord, ProjectSnapshot};
pub use target::{find_tracking_project, TargetItemRef, TargetProjectRef, TargetState};
pub use types::{Status, Timestamp, DEFAULT_ACTIVE_LABEL};

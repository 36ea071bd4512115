//! Append-only audit trail of every decision and outcome.
//!
//! Records are written in the order they happen and never rewritten. A
//! reporting surface outside this workspace pages through them; the worker's
//! only obligation is to append.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Value of the `service` field on every record.
pub const SERVICE_NAME: &str = "SyncWorker";

/// Status column of a run-log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogStatus {
    /// A decision or observation.
    Info,
    /// A mutation that went through.
    Success,
    /// A call or unit of work that failed.
    Failed,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogRecord {
    pub timestamp: Timestamp,
    pub service: String,
    pub action: String,
    pub status: LogStatus,
    pub details: String,
}

impl RunLogRecord {
    /// Creates a record stamped with the current time.
    pub fn now(action: impl Into<String>, status: LogStatus, details: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::now(),
            service: SERVICE_NAME.to_owned(),
            action: action.into(),
            status,
            details: details.into(),
        }
    }
}

/// Destination for run-log records.
///
/// Implementations are shared between concurrent project workers and must
/// keep records in the order `append` was called.
pub trait RunLog: Send + Sync {
    fn append(&self, record: RunLogRecord);
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryRunLog {
    records: Mutex<Vec<RunLogRecord>>,
}

impl MemoryRunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every record appended so far.
    pub fn records(&self) -> Vec<RunLogRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl RunLog for MemoryRunLog {
    fn append(&self, record: RunLogRecord) {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

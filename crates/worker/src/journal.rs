//! Run-log emission.
//!
//! [`Journal`] stamps, traces, and appends records to a [`RunLog`] sink.
//! [`JsonlRunLog`] is the file sink the CLI uses: one JSON object per line,
//! opened in append mode so earlier runs are never rewritten.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reconciler::{LogStatus, RunLog, RunLogRecord};

/// Shared handle for writing run-log records.
///
/// Stamping and appending happen under one lock, so timestamps are
/// non-decreasing in append order even with concurrent project workers.
#[derive(Clone)]
pub struct Journal {
    sink: Arc<dyn RunLog>,
    order: Arc<Mutex<()>>,
}

impl Journal {
    pub fn new(sink: Arc<dyn RunLog>) -> Self {
        Self {
            sink,
            order: Arc::new(Mutex::new(())),
        }
    }

    pub fn record(&self, action: &str, status: LogStatus, details: impl Into<String>) {
        let details = details.into();
        match status {
            LogStatus::Failed => {
                tracing::warn!(target: "run_log", action, %status, details = %details, "run log");
            }
            LogStatus::Info | LogStatus::Success => {
                tracing::info!(target: "run_log", action, %status, details = %details, "run log");
            }
        }

        let _guard = match self.order.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.sink.append(RunLogRecord::now(action, status, details));
    }

    pub fn info(&self, action: &str, details: impl Into<String>) {
        self.record(action, LogStatus::Info, details);
    }

    pub fn success(&self, action: &str, details: impl Into<String>) {
        self.record(action, LogStatus::Success, details);
    }

    pub fn failed(&self, action: &str, details: impl Into<String>) {
        self.record(action, LogStatus::Failed, details);
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal").finish_non_exhaustive()
    }
}

/// Appends records to a JSON-lines file.
#[derive(Debug)]
pub struct JsonlRunLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlRunLog {
    /// Opens (creating if needed) the log file at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RunLog for JsonlRunLog {
    fn append(&self, record: RunLogRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, action = %record.action, "cannot serialise run log record");
                return;
            }
        };
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(file, "{line}").and_then(|()| file.flush()) {
            tracing::error!(error = %err, path = %self.path.display(), "cannot append to run log");
        }
    }
}

#[cfg(test)]
mod tests {
    use reconciler::MemoryRunLog;

    use super::*;

    #[test]
    fn journal_appends_in_order_with_monotonic_timestamps() {
        let sink = Arc::new(MemoryRunLog::new());
        let journal = Journal::new(sink.clone());

        journal.info("RunStarted", "run 1");
        journal.success("CreateRepo", "repatria-track");
        journal.failed("CreateItem", "Add login: boom");

        let records = sink.records();
        let statuses: Vec<LogStatus> = records.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![LogStatus::Info, LogStatus::Success, LogStatus::Failed]
        );
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn jsonl_log_appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("sync.jsonl");

        {
            let log = JsonlRunLog::open(&path).unwrap();
            log.append(RunLogRecord::now("RunStarted", LogStatus::Info, "first"));
        }
        {
            let log = JsonlRunLog::open(&path).unwrap();
            log.append(RunLogRecord::now("RunFinished", LogStatus::Info, "second"));
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<RunLogRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].details, "first");
        assert_eq!(lines[1].action, "RunFinished");
        assert_eq!(lines[1].service, "SyncWorker");
    }
}

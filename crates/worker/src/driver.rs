//! The run driver.
//!
//! [`Worker::run`] lists Active projects, reconciles each one, and folds the
//! per-project reports into a [`RunSummary`]. Failures stay inside the unit of
//! work they belong to: a feature failure never stops its project, a project
//! failure (or panic) never stops the run, and a run that cannot even list
//! projects is reported as aborted rather than returned as an error.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use reconciler::{
    find_tracking_project, reconcile, AdapterError, OutcomeKind, ProjectRecord, ProjectReport,
    ProjectSnapshot, RepoName, RunId, RunLog, RunSummary, SourceSystem, TargetState,
    TargetSystem, Timestamp,
};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::calls::CallPolicy;
use crate::executor::Executor;
use crate::journal::Journal;

/// Reason recorded for a Source project whose name is empty.
const UNNAMED_PROJECT: &str = "project has no name; cannot derive a repository";

/// Tuning for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub calls: CallPolicy,
    /// Upper bound on projects reconciled at the same time. `1` runs them
    /// one after another.
    pub max_concurrent_projects: usize,
    /// Plan every project but issue no mutating call.
    pub dry_run: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            calls: CallPolicy::default(),
            max_concurrent_projects: 1,
            dry_run: false,
        }
    }
}

/// Reconciles every Active Source project against the Target.
///
/// Cheap to clone; each concurrent project task holds its own clone.
#[derive(Clone)]
pub struct Worker {
    source: Arc<dyn SourceSystem>,
    target: Arc<dyn TargetSystem>,
    journal: Journal,
    config: WorkerConfig,
}

impl Worker {
    pub fn new(
        source: Arc<dyn SourceSystem>,
        target: Arc<dyn TargetSystem>,
        run_log: Arc<dyn RunLog>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            source,
            target,
            journal: Journal::new(run_log),
            config,
        }
    }

    /// Runs one full pass.
    ///
    /// Once `cancel` fires no further project is started; projects already in
    /// flight run to completion.
    pub async fn run(&self, cancel: CancellationToken) -> RunSummary {
        let run_id = RunId::new_random();
        let span = tracing::info_span!("sync_run", %run_id, dry_run = self.config.dry_run);
        self.run_pass(run_id, cancel).instrument(span).await
    }

    async fn run_pass(&self, run_id: RunId, cancel: CancellationToken) -> RunSummary {
        let started_at = Timestamp::now();
        let dry_run = self.config.dry_run;
        self.journal.info(
            "RunStarted",
            format!("run {run_id}{}", if dry_run { " (dry run)" } else { "" }),
        );

        let source = self.source.as_ref();
        let projects = match self
            .config
            .calls
            .read("list_active_projects", move || source.list_active_projects())
            .await
        {
            Ok(projects) => projects,
            Err(err) => {
                tracing::error!(error = %err, "cannot list projects; aborting run");
                self.journal
                    .failed("ListProjects", format!("cannot list active projects: {err}"));
                let summary = RunSummary::aborted(
                    run_id,
                    started_at,
                    dry_run,
                    format!("cannot list active projects: {err}"),
                );
                self.journal.failed("RunFinished", "run aborted");
                return summary;
            }
        };
        let total = projects.len();
        self.journal
            .info("ListProjects", format!("{total} active project(s)"));

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_projects.max(1)));
        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        let mut started = 0;
        let mut cancelled = false;

        for (index, record) in projects.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        cancelled = true;
                        break;
                    }
                },
            };
            started += 1;
            let worker = self.clone();
            let name = record.name.clone();
            let handle = tasks.spawn(
                async move {
                    let _permit = permit;
                    (index, worker.sync_project_guarded(record).await)
                }
                .in_current_span(),
            );
            names.insert(handle.id(), (index, name));
        }

        let not_started = total - started;
        if cancelled {
            tracing::info!(not_started, "cancellation requested; draining in-flight projects");
            self.journal.info(
                "RunCancelled",
                format!("{not_started} project(s) not started"),
            );
        }

        let reports = join_reports(&self.journal, tasks, names).await;

        let summary =
            RunSummary::finished(run_id, started_at, dry_run, reports, cancelled, not_started);
        tracing::info!(counts = %summary.counts, status = ?summary.status, "run finished");
        self.journal.info("RunFinished", summary.counts.to_string());
        summary
    }

    /// Reconciles one project, turning a panic into a `Failed` report.
    async fn sync_project_guarded(&self, record: ProjectRecord) -> ProjectReport {
        let name = record.name.clone();
        let span = tracing::info_span!("project", project = %name);
        match AssertUnwindSafe(self.sync_project(record))
            .catch_unwind()
            .instrument(span)
            .await
        {
            Ok(report) => report,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(project = %name, %message, "project reconciliation panicked");
                self.journal
                    .failed("ProjectFailed", format!("{name}: unexpected error: {message}"));
                ProjectReport::single(
                    name.as_str(),
                    RepoName::derive(&name),
                    OutcomeKind::Failed,
                    format!("unexpected error: {message}"),
                )
            }
        }
    }

    async fn sync_project(&self, record: ProjectRecord) -> ProjectReport {
        let Some(repo) = RepoName::derive(&record.name) else {
            self.journal.info("SkipProject", format!("{}: {UNNAMED_PROJECT}", record.id));
            return ProjectReport::single(
                record.name,
                None,
                OutcomeKind::Skipped,
                UNNAMED_PROJECT,
            );
        };

        let source = self.source.as_ref();
        let project_id = &record.id;
        let features = match self
            .config
            .calls
            .read("fetch_features", move || source.fetch_features(project_id))
            .await
        {
            Ok(features) => features,
            Err(err) => {
                self.journal
                    .failed("FetchFeatures", format!("{}: {err}", record.name));
                return ProjectReport::single(
                    record.name,
                    Some(repo),
                    OutcomeKind::Failed,
                    format!("could not fetch features: {err}"),
                );
            }
        };
        self.journal.info(
            "FetchFeatures",
            format!("{}: {} feature(s)", record.name, features.len()),
        );
        let snapshot = ProjectSnapshot::new(record, features);

        let state = match self.read_target_state(&snapshot.name, &repo).await {
            Ok(state) => state,
            Err(err) => {
                self.journal
                    .failed("ReadTargetState", format!("{}: {err}", snapshot.name));
                return ProjectReport::single(
                    snapshot.name,
                    Some(repo),
                    OutcomeKind::Failed,
                    format!("could not read target state: {err}"),
                );
            }
        };

        let Some(plan) = reconcile(&snapshot, &state) else {
            return ProjectReport::single(snapshot.name, None, OutcomeKind::Skipped, UNNAMED_PROJECT);
        };
        let operations = plan.operations();
        tracing::debug!(?operations, "planned");
        self.journal.info(
            "PlanProject",
            format!("{}: {} operation(s) planned", plan.project, operations.len()),
        );

        if self.config.dry_run {
            return plan.expected_report();
        }

        Executor {
            target: self.target.as_ref(),
            journal: &self.journal,
            calls: &self.config.calls,
        }
        .execute(&plan)
        .await
    }

    /// Reads repository existence, the matching tracking-project, and its
    /// items. Called once per project; nothing is re-read afterwards.
    async fn read_target_state(
        &self,
        title: &str,
        repo: &RepoName,
    ) -> Result<TargetState, AdapterError> {
        let target = self.target.as_ref();
        let calls = &self.config.calls;

        let repo_exists = calls
            .read("repo_exists", move || target.repo_exists(repo))
            .await?;
        let boards = calls
            .read("list_tracking_projects", move || target.list_tracking_projects())
            .await?;
        let tracking_project = find_tracking_project(&boards, title).cloned();

        let items = match &tracking_project {
            Some(board) => {
                let board_id = &board.id;
                calls
                    .read("list_items", move || target.list_items(board_id))
                    .await?
            }
            None => Vec::new(),
        };

        self.journal.info(
            "ReadTargetState",
            format!(
                "{title}: repo_exists={repo_exists} tracking_project={} items={}",
                tracking_project.is_some(),
                items.len()
            ),
        );
        Ok(TargetState {
            repo_exists,
            tracking_project,
            items,
        })
    }
}

/// Waits for every project task, in start order.
///
/// A task that dies outside its panic guard still yields a `Failed` report
/// under the name it was started with.
async fn join_reports(
    journal: &Journal,
    mut tasks: JoinSet<(usize, ProjectReport)>,
    mut names: HashMap<task::Id, (usize, String)>,
) -> Vec<ProjectReport> {
    let mut reports = Vec::with_capacity(names.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(entry) => reports.push(entry),
            Err(err) => {
                let Some((index, name)) = names.remove(&err.id()) else {
                    tracing::error!(error = %err, "unknown project task did not complete");
                    continue;
                };
                tracing::error!(project = %name, error = %err, "project task did not complete");
                journal.failed("ProjectFailed", format!("{name}: task did not complete: {err}"));
                let report = ProjectReport::single(
                    name.as_str(),
                    RepoName::derive(&name),
                    OutcomeKind::Failed,
                    format!("task did not complete: {err}"),
                );
                reports.push((index, report));
            }
        }
    }
    reports.sort_by_key(|(index, _)| *index);
    reports.into_iter().map(|(_, report)| report).collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_owned()
    }
}

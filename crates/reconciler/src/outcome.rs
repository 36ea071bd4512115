//! Outcomes of reconciliation, per project and per run.

use serde::{Deserialize, Serialize};

use crate::{RepoName, RunId, Timestamp};

// ---------------------------------------------------------------------------
// Single outcome
// ---------------------------------------------------------------------------

/// What happened to one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Created,
    Updated,
    UpToDate,
    Skipped,
    Failed,
}

/// The unit of work an outcome belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum OutcomeScope {
    /// The project's repository and tracking-project.
    Project,
    /// One feature, identified by its name (the item title).
    Feature { name: String },
}

/// One decision, with a reason a human can act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    #[serde(flatten)]
    pub scope: OutcomeScope,
    pub kind: OutcomeKind,
    pub reason: String,
}

impl ReconciliationOutcome {
    /// Outcome for the project as a whole.
    pub fn project(kind: OutcomeKind, reason: impl Into<String>) -> Self {
        Self {
            scope: OutcomeScope::Project,
            kind,
            reason: reason.into(),
        }
    }

    /// Outcome for the feature titled `name`.
    pub fn feature(name: impl Into<String>, kind: OutcomeKind, reason: impl Into<String>) -> Self {
        Self {
            scope: OutcomeScope::Feature { name: name.into() },
            kind,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a feature-level outcome.
    pub fn is_feature(&self) -> bool {
        matches!(self.scope, OutcomeScope::Feature { .. })
    }
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Number of outcomes of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub created: usize,
    pub updated: usize,
    pub up_to_date: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    /// Counts a single outcome.
    pub fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Created => self.created += 1,
            OutcomeKind::Updated => self.updated += 1,
            OutcomeKind::UpToDate => self.up_to_date += 1,
            OutcomeKind::Skipped => self.skipped += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
    }

    /// Total number of outcomes counted.
    pub fn total(&self) -> usize {
        self.created + self.updated + self.up_to_date + self.skipped + self.failed
    }
}

impl<'a> FromIterator<&'a ReconciliationOutcome> for OutcomeCounts {
    fn from_iter<I: IntoIterator<Item = &'a ReconciliationOutcome>>(iter: I) -> Self {
        let mut counts = Self::default();
        for outcome in iter {
            counts.record(outcome.kind);
        }
        counts
    }
}

impl std::ops::AddAssign for OutcomeCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.updated += rhs.updated;
        self.up_to_date += rhs.up_to_date;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

impl std::fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} updated={} up_to_date={} skipped={} failed={}",
            self.created, self.updated, self.up_to_date, self.skipped, self.failed
        )
    }
}

// ---------------------------------------------------------------------------
// Project report
// ---------------------------------------------------------------------------

/// All outcomes produced while reconciling one project.
///
/// Holds exactly one project-scoped outcome, listed first, followed by the
/// feature outcomes in Source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project: String,
    /// `None` only when the project name cannot form a repository name.
    pub repo: Option<RepoName>,
    pub outcomes: Vec<ReconciliationOutcome>,
}

impl ProjectReport {
    /// A report holding only a project-level outcome.
    pub fn single(
        project: impl Into<String>,
        repo: Option<RepoName>,
        kind: OutcomeKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            repo,
            outcomes: vec![ReconciliationOutcome::project(kind, reason)],
        }
    }

    /// The project-level outcome.
    pub fn project_outcome(&self) -> Option<&ReconciliationOutcome> {
        self.outcomes.iter().find(|o| !o.is_feature())
    }

    /// Feature-level outcomes, in Source order.
    pub fn feature_outcomes(&self) -> impl Iterator<Item = &ReconciliationOutcome> {
        self.outcomes.iter().filter(|o| o.is_feature())
    }

    /// Counts of every outcome in this report.
    pub fn counts(&self) -> OutcomeCounts {
        self.outcomes.iter().collect()
    }
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// Overall result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every unit of work succeeded or needed nothing.
    Completed,
    /// The run finished, but some outcomes are `Failed`.
    CompletedWithFailures,
    /// The run stopped before processing projects (e.g. the Source was
    /// unreachable).
    Aborted { reason: String },
}

/// Aggregated result of one run, produced whatever individual failures occur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub status: RunStatus,
    pub dry_run: bool,
    /// Reports in Source order.
    pub projects: Vec<ProjectReport>,
    pub counts: OutcomeCounts,
    /// `true` when cancellation stopped new projects from starting.
    pub cancelled: bool,
    /// Projects listed by the Source but never started.
    pub not_started: usize,
}

impl RunSummary {
    /// Builds the summary of a run that processed `projects`.
    pub fn finished(
        run_id: RunId,
        started_at: Timestamp,
        dry_run: bool,
        projects: Vec<ProjectReport>,
        cancelled: bool,
        not_started: usize,
    ) -> Self {
        let mut counts = OutcomeCounts::default();
        for report in &projects {
            counts += report.counts();
        }
        let status = if counts.failed > 0 {
            RunStatus::CompletedWithFailures
        } else {
            RunStatus::Completed
        };
        Self {
            run_id,
            started_at,
            finished_at: Timestamp::now(),
            status,
            dry_run,
            projects,
            counts,
            cancelled,
            not_started,
        }
    }

    /// Builds the summary of a run that could not process any project.
    pub fn aborted(
        run_id: RunId,
        started_at: Timestamp,
        dry_run: bool,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: Timestamp::now(),
            status: RunStatus::Aborted {
                reason: reason.into(),
            },
            dry_run,
            projects: Vec::new(),
            counts: OutcomeCounts::default(),
            cancelled: false,
            not_started: 0,
        }
    }

    /// Returns `true` unless the run was aborted.
    pub fn is_completed(&self) -> bool {
        !matches!(self.status, RunStatus::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_every_outcome_and_flags_failures() {
        let failing = ProjectReport::single("A", None, OutcomeKind::Failed, "boom");
        let created = ProjectReport {
            project: "B".into(),
            repo: RepoName::new("b"),
            outcomes: vec![
                ReconciliationOutcome::project(OutcomeKind::Created, "created"),
                ReconciliationOutcome::feature("Add login", OutcomeKind::Created, "created"),
            ],
        };

        let summary = RunSummary::finished(
            RunId::new_random(),
            Timestamp::now(),
            false,
            vec![failing, created],
            false,
            0,
        );

        assert_eq!(summary.status, RunStatus::CompletedWithFailures);
        assert!(summary.is_completed());
        assert_eq!(summary.counts.failed, 1);
        assert_eq!(summary.counts.created, 2);
        assert_eq!(summary.counts.total(), 3);
    }

    #[test]
    fn outcome_serialises_with_flat_scope() {
        let outcome = ReconciliationOutcome::feature("Add login", OutcomeKind::UpToDate, "same");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["scope"], "feature");
        assert_eq!(json["name"], "Add login");
        assert_eq!(json["kind"], "up_to_date");
    }
}

//! The reconciliation planner.
//!
//! [`reconcile`] compares one [`ProjectSnapshot`] with the [`TargetState`]
//! read for it and decides, per project and per Active feature, whether to
//! create, update, or leave things alone. It performs no I/O: the resulting
//! [`ProjectPlan`] is executed by the `worker` crate, or only inspected in a
//! dry run.
//!
//! The Target is only ever added to. A feature that is deactivated or deleted
//! in the Source is simply not visited; its item stays where it is.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::target::repo_description;
use crate::{
    FeatureSnapshot, ItemId, OutcomeKind, ProjectReport, ProjectSnapshot, ReconciliationOutcome,
    RepoName, TargetItemRef, TargetState, TrackingProjectId,
};

/// Reason recorded when a repository exists without its tracking-project.
pub const REPO_WITHOUT_TRACKING_PROJECT: &str =
    "repository without tracking project — manual resolution required";

/// Reason recorded when a tracking-project exists without its repository.
pub const TRACKING_PROJECT_WITHOUT_REPO: &str =
    "tracking project without repository — manual resolution required";

/// Reason recorded for an Active feature whose title an earlier Active
/// feature of the same project already uses.
pub const DUPLICATE_FEATURE_TITLE: &str =
    "duplicate feature title in source — manual resolution required";

// ---------------------------------------------------------------------------
// Plan types
// ---------------------------------------------------------------------------

/// What happens to the project's repository and tracking-project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flow", rename_all = "snake_case")]
pub enum Disposition {
    /// Neither exists: create both, then every feature.
    Create { description: String },
    /// Both exist: bring features in line with the Source.
    Update { tracking_project: TrackingProjectId },
    /// Exactly one exists. Nothing is touched.
    Skip { reason: String },
}

/// What happens to one Active feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FeatureAction {
    /// No item has this title: create an issue and add it to the board.
    Create { body: String },
    /// An item has this title but a different body.
    UpdateBody { item: ItemId, body: String },
    /// An item has this title and the same body.
    UpToDate { item: ItemId },
    /// Another Active feature of the project already claims this title.
    Skip { reason: String },
}

/// Plan for one Active feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturePlan {
    /// Item title.
    pub name: String,
    /// Decision taken for the feature.
    pub action: FeatureAction,
}

/// The board an [`Operation::AddItemToProject`] targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardRef {
    /// A board that already exists.
    Existing(TrackingProjectId),
    /// The board created earlier in the same plan, by title.
    Created(String),
}

/// A single mutating call against the Target, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Create the project's repository.
    CreateRepo {
        /// Derived repository name.
        name: RepoName,
        /// Repository description, `Repo for <project>`.
        description: String,
    },
    /// Create the tracking-project (board) named after the project.
    CreateTrackingProject {
        /// Board title; equals the project name.
        title: String,
    },
    /// Open an issue in the project's repository.
    CreateItem {
        /// Repository that receives the issue.
        repo: RepoName,
        /// Issue title; equals the feature name.
        title: String,
        /// Issue body; the feature content.
        body: String,
    },
    /// Attach the issue created just before to a board.
    AddItemToProject {
        /// Board receiving the item.
        board: BoardRef,
        /// Title of the issue being attached.
        title: String,
    },
    /// Replace the body of an existing issue.
    UpdateItemBody {
        /// Issue to rewrite.
        item: ItemId,
        /// New body; the feature content.
        body: String,
    },
}

impl Operation {
    /// Short name used as the run-log action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRepo { .. } => "CreateRepo",
            Self::CreateTrackingProject { .. } => "CreateTrackingProject",
            Self::CreateItem { .. } => "CreateItem",
            Self::AddItemToProject { .. } => "AddItemToProject",
            Self::UpdateItemBody { .. } => "UpdateItemBody",
        }
    }
}

/// The full decision for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectPlan {
    /// Project name; also the tracking-project title.
    pub project: String,
    /// Repository derived from the project name.
    pub repo: RepoName,
    /// Project-level flow: create, update, or skip.
    pub disposition: Disposition,
    /// One entry per Active feature, in Source order. Empty for
    /// [`Disposition::Skip`].
    pub features: Vec<FeaturePlan>,
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Decides what to do for `project` given what exists on the Target.
///
/// Returns `None` only if the project name is empty, since no repository name
/// can be derived from it.
///
/// Items are matched by title, so when several Active features share a title
/// only the first is planned; the others are skipped without any mutation.
pub fn reconcile(project: &ProjectSnapshot, target: &TargetState) -> Option<ProjectPlan> {
    let repo = RepoName::derive(&project.name)?;

    let (disposition, features) = match (target.repo_exists, &target.tracking_project) {
        (false, None) => {
            let features = plan_features(project, |f| FeatureAction::Create {
                body: f.content.clone(),
            });
            let disposition = Disposition::Create {
                description: repo_description(&project.name),
            };
            (disposition, features)
        }
        (true, Some(board)) => {
            // First item wins when titles repeat on the board.
            let mut by_title: HashMap<&str, &TargetItemRef> = HashMap::new();
            for item in &target.items {
                by_title.entry(item.title.as_str()).or_insert(item);
            }

            let features = plan_features(project, |f| match by_title.get(f.name.as_str()) {
                None => FeatureAction::Create {
                    body: f.content.clone(),
                },
                Some(item) if item.body != f.content => FeatureAction::UpdateBody {
                    item: item.id.clone(),
                    body: f.content.clone(),
                },
                Some(item) => FeatureAction::UpToDate {
                    item: item.id.clone(),
                },
            });
            let disposition = Disposition::Update {
                tracking_project: board.id.clone(),
            };
            (disposition, features)
        }
        (true, None) => (
            Disposition::Skip {
                reason: REPO_WITHOUT_TRACKING_PROJECT.to_owned(),
            },
            Vec::new(),
        ),
        (false, Some(_)) => (
            Disposition::Skip {
                reason: TRACKING_PROJECT_WITHOUT_REPO.to_owned(),
            },
            Vec::new(),
        ),
    };

    Some(ProjectPlan {
        project: project.name.clone(),
        repo,
        disposition,
        features,
    })
}

/// Plans each Active feature with `decide`, skipping repeated titles.
fn plan_features<F>(project: &ProjectSnapshot, mut decide: F) -> Vec<FeaturePlan>
where
    F: FnMut(&FeatureSnapshot) -> FeatureAction,
{
    let mut titles = HashSet::new();
    project
        .active_features()
        .map(|f| {
            let action = if titles.insert(f.name.as_str()) {
                decide(f)
            } else {
                tracing::warn!(
                    project = %project.name,
                    feature = %f.id,
                    title = %f.name,
                    "another active feature already uses this title; skipping"
                );
                FeatureAction::Skip {
                    reason: DUPLICATE_FEATURE_TITLE.to_owned(),
                }
            };
            FeaturePlan {
                name: f.name.clone(),
                action,
            }
        })
        .collect()
}

impl ProjectPlan {
    /// The mutating calls this plan issues, in the order they must run.
    pub fn operations(&self) -> Vec<Operation> {
        let mut ops = Vec::new();
        let board = match &self.disposition {
            Disposition::Skip { .. } => return ops,
            Disposition::Create { description } => {
                ops.push(Operation::CreateRepo {
                    name: self.repo.clone(),
                    description: description.clone(),
                });
                ops.push(Operation::CreateTrackingProject {
                    title: self.project.clone(),
                });
                BoardRef::Created(self.project.clone())
            }
            Disposition::Update { tracking_project } => BoardRef::Existing(tracking_project.clone()),
        };

        for feature in &self.features {
            match &feature.action {
                FeatureAction::Create { body } => {
                    ops.push(Operation::CreateItem {
                        repo: self.repo.clone(),
                        title: feature.name.clone(),
                        body: body.clone(),
                    });
                    ops.push(Operation::AddItemToProject {
                        board: board.clone(),
                        title: feature.name.clone(),
                    });
                }
                FeatureAction::UpdateBody { item, body } => {
                    ops.push(Operation::UpdateItemBody {
                        item: item.clone(),
                        body: body.clone(),
                    });
                }
                FeatureAction::UpToDate { .. } | FeatureAction::Skip { .. } => {}
            }
        }
        ops
    }

    /// The project-level outcome this plan yields if its creation calls succeed.
    pub fn expected_project_outcome(&self) -> ReconciliationOutcome {
        match &self.disposition {
            Disposition::Create { .. } => ReconciliationOutcome::project(
                OutcomeKind::Created,
                format!(
                    "created repository '{}' and tracking project '{}'",
                    self.repo, self.project
                ),
            ),
            Disposition::Update { .. } => ReconciliationOutcome::project(
                OutcomeKind::UpToDate,
                "repository and tracking project present",
            ),
            Disposition::Skip { reason } => {
                ReconciliationOutcome::project(OutcomeKind::Skipped, reason.clone())
            }
        }
    }

    /// Feature outcomes this plan yields if every mutation succeeds.
    pub fn expected_feature_outcomes(&self) -> Vec<ReconciliationOutcome> {
        self.features.iter().map(FeaturePlan::expected_outcome).collect()
    }

    /// The full outcome list (project first, then features) assuming every
    /// mutation succeeds.
    pub fn expected_outcomes(&self) -> Vec<ReconciliationOutcome> {
        let mut outcomes = vec![self.expected_project_outcome()];
        outcomes.extend(self.expected_feature_outcomes());
        outcomes
    }

    /// Wraps [`Self::expected_outcomes`] into a report.
    pub fn expected_report(&self) -> ProjectReport {
        ProjectReport {
            project: self.project.clone(),
            repo: Some(self.repo.clone()),
            outcomes: self.expected_outcomes(),
        }
    }

    /// Returns `true` if executing the plan would change the Target.
    pub fn has_mutations(&self) -> bool {
        !self.operations().is_empty()
    }
}

impl FeaturePlan {
    /// Outcome of this feature if its mutation succeeds.
    pub fn expected_outcome(&self) -> ReconciliationOutcome {
        let (kind, reason) = match &self.action {
            FeatureAction::Create { .. } => (OutcomeKind::Created, "issue created"),
            FeatureAction::UpdateBody { .. } => (OutcomeKind::Updated, "issue body updated"),
            FeatureAction::UpToDate { .. } => (OutcomeKind::UpToDate, "issue body already matches"),
            FeatureAction::Skip { reason } => (OutcomeKind::Skipped, reason.as_str()),
        };
        ReconciliationOutcome::feature(self.name.clone(), kind, reason)
    }
}

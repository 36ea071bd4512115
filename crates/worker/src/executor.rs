//! Applies a [`ProjectPlan`] to the Target.
//!
//! Within one project the calls form a strict chain: the repository, then the
//! tracking-project, then the items, since later calls need identifiers the
//! earlier ones return. Each call's failure is recorded and the chain moves on
//! to whatever does not depend on it.

use reconciler::{
    Disposition, FeatureAction, FeaturePlan, OutcomeKind, ProjectPlan, ProjectReport,
    ReconciliationOutcome, TargetSystem, TrackingProjectId,
};

use crate::calls::CallPolicy;
use crate::journal::Journal;

pub(crate) struct Executor<'a> {
    pub(crate) target: &'a dyn TargetSystem,
    pub(crate) journal: &'a Journal,
    pub(crate) calls: &'a CallPolicy,
}

impl Executor<'_> {
    #[tracing::instrument(skip_all, fields(project = %plan.project, repo = %plan.repo))]
    pub(crate) async fn execute(&self, plan: &ProjectPlan) -> ProjectReport {
        let board = match &plan.disposition {
            Disposition::Skip { reason } => {
                tracing::warn!(reason = %reason, "project left untouched");
                self.journal
                    .info("SkipProject", format!("{}: warning: {reason}", plan.project));
                return plan.expected_report();
            }
            Disposition::Create { description } => {
                match self.create_containers(plan, description).await {
                    Ok(board) => board,
                    Err(failure) => {
                        return ProjectReport {
                            project: plan.project.clone(),
                            repo: Some(plan.repo.clone()),
                            outcomes: vec![failure],
                        }
                    }
                }
            }
            Disposition::Update { tracking_project } => tracking_project.clone(),
        };

        let mut outcomes = Vec::with_capacity(plan.features.len() + 1);
        outcomes.push(plan.expected_project_outcome());
        for feature in &plan.features {
            outcomes.push(self.apply_feature(plan, &board, feature).await);
        }

        ProjectReport {
            project: plan.project.clone(),
            repo: Some(plan.repo.clone()),
            outcomes,
        }
    }

    /// Creates the repository and then the tracking-project.
    ///
    /// On failure returns the project-level `Failed` outcome; no feature is
    /// attempted.
    async fn create_containers(
        &self,
        plan: &ProjectPlan,
        description: &str,
    ) -> Result<TrackingProjectId, ReconciliationOutcome> {
        let pending = plan.features.len();

        if let Err(err) = self
            .calls
            .bounded("create_repo", self.target.create_repo(&plan.repo, description))
            .await
        {
            self.journal
                .failed("CreateRepo", format!("{}: {err}", plan.repo));
            return Err(ReconciliationOutcome::project(
                OutcomeKind::Failed,
                format!(
                    "could not create repository '{}': {err}; {pending} feature(s) not attempted",
                    plan.repo
                ),
            ));
        }
        self.journal.success("CreateRepo", plan.repo.as_str());

        match self
            .calls
            .bounded(
                "create_tracking_project",
                self.target.create_tracking_project(&plan.project),
            )
            .await
        {
            Ok(board) => {
                self.journal
                    .success("CreateTrackingProject", format!("{} ({board})", plan.project));
                Ok(board)
            }
            Err(err) => {
                self.journal
                    .failed("CreateTrackingProject", format!("{}: {err}", plan.project));
                Err(ReconciliationOutcome::project(
                    OutcomeKind::Failed,
                    format!(
                        "repository '{}' created but tracking project failed: {err}; \
                         manual resolution required, {pending} feature(s) not attempted",
                        plan.repo
                    ),
                ))
            }
        }
    }

    async fn apply_feature(
        &self,
        plan: &ProjectPlan,
        board: &TrackingProjectId,
        feature: &FeaturePlan,
    ) -> ReconciliationOutcome {
        let name = feature.name.as_str();
        match &feature.action {
            FeatureAction::Create { body } => {
                let item = match self
                    .calls
                    .bounded("create_item", self.target.create_item(&plan.repo, name, body))
                    .await
                {
                    Ok(item) => item,
                    Err(err) => {
                        self.journal.failed("CreateItem", format!("{name}: {err}"));
                        return ReconciliationOutcome::feature(
                            name,
                            OutcomeKind::Failed,
                            format!("could not create issue: {err}"),
                        );
                    }
                };
                self.journal
                    .success("CreateItem", format!("{name} ({})", item.id));

                match self
                    .calls
                    .bounded("add_item_to_project", self.target.add_item_to_project(board, &item))
                    .await
                {
                    Ok(()) => {
                        self.journal
                            .success("AddItemToProject", format!("{name} -> {board}"));
                        feature.expected_outcome()
                    }
                    Err(err) => {
                        self.journal
                            .failed("AddItemToProject", format!("{name}: {err}"));
                        ReconciliationOutcome::feature(
                            name,
                            OutcomeKind::Failed,
                            format!(
                                "issue {} created but not added to tracking project: {err}",
                                item.id
                            ),
                        )
                    }
                }
            }
            FeatureAction::UpdateBody { item, body } => {
                match self
                    .calls
                    .bounded("update_item_body", self.target.update_item_body(item, body))
                    .await
                {
                    Ok(()) => {
                        self.journal
                            .success("UpdateItemBody", format!("{name} ({item})"));
                        feature.expected_outcome()
                    }
                    Err(err) => {
                        self.journal.failed("UpdateItemBody", format!("{name}: {err}"));
                        ReconciliationOutcome::feature(
                            name,
                            OutcomeKind::Failed,
                            format!("could not update issue body: {err}"),
                        )
                    }
                }
            }
            FeatureAction::UpToDate { item } => {
                self.journal.info("ItemUpToDate", format!("{name} ({item})"));
                feature.expected_outcome()
            }
            FeatureAction::Skip { reason } => {
                self.journal
                    .info("SkipFeature", format!("{name}: warning: {reason}"));
                feature.expected_outcome()
            }
        }
    }
}

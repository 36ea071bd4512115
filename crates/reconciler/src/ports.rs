//! Port traits the infrastructure crates implement.
//!
//! Adapters are constructed from explicit configuration and hold no mutable
//! state beyond their HTTP transport; every call is a function of its inputs.
//! Timeouts and retries are applied by the caller (the `worker` crate), so an
//! implementation only needs to report failures faithfully.

use async_trait::async_trait;

use crate::{
    AdapterError, FeatureSnapshot, ItemId, ProjectId, ProjectRecord, RepoName, TargetItemRef,
    TargetProjectRef, TrackingProjectId,
};

/// Read-only view over the Source System of record.
#[async_trait]
pub trait SourceSystem: Send + Sync {
    /// Lists projects whose status is Active. Order is Source-defined.
    async fn list_active_projects(&self) -> Result<Vec<ProjectRecord>, AdapterError>;

    /// Fetches every feature reachable from the project, whatever its status.
    ///
    /// The reconciler filters on status itself, so inactive features may be
    /// returned. Duplicates (same id) are tolerated.
    async fn fetch_features(&self, project: &ProjectId)
        -> Result<Vec<FeatureSnapshot>, AdapterError>;
}

/// Read/write view over the Target System.
///
/// Write calls either succeed or fail with a descriptive error. They are not
/// idempotent: calling [`TargetSystem::create_item`] twice creates two items.
#[async_trait]
pub trait TargetSystem: Send + Sync {
    /// Returns `true` if a repository with this name is owned by the account.
    async fn repo_exists(&self, name: &RepoName) -> Result<bool, AdapterError>;

    /// Lists every tracking-project owned by the account.
    async fn list_tracking_projects(&self) -> Result<Vec<TargetProjectRef>, AdapterError>;

    /// Lists the items attached to a tracking-project.
    async fn list_items(
        &self,
        project: &TrackingProjectId,
    ) -> Result<Vec<TargetItemRef>, AdapterError>;

    async fn create_repo(&self, name: &RepoName, description: &str) -> Result<(), AdapterError>;

    /// Creates a tracking-project and returns its id.
    async fn create_tracking_project(&self, title: &str)
        -> Result<TrackingProjectId, AdapterError>;

    /// Creates an item in `repo`. The item is not yet on any board.
    async fn create_item(
        &self,
        repo: &RepoName,
        title: &str,
        body: &str,
    ) -> Result<TargetItemRef, AdapterError>;

    async fn add_item_to_project(
        &self,
        project: &TrackingProjectId,
        item: &TargetItemRef,
    ) -> Result<(), AdapterError>;

    /// Replaces an item's body. Last writer wins.
    async fn update_item_body(&self, item: &ItemId, body: &str) -> Result<(), AdapterError>;
}

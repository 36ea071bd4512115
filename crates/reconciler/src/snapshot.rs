//! Normalised, read-only views of Source System records.
//!
//! Snapshots are built fresh by the Source Adapter for each run and dropped
//! once the project has been reconciled. Nothing here is persisted.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{FeatureId, ProjectId, Status};

/// A project as listed by the Source, before its features are fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    /// Natural key: drives the repository name and the tracking-project title.
    pub name: String,
    pub status: Status,
}

/// One feature of a project, with its body already flattened to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub id: FeatureId,
    /// Matched verbatim against item titles on the Target.
    pub name: String,
    pub status: Status,
    /// Canonical body the Target item must carry.
    pub content: String,
}

/// A project together with its features, immutable for one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub id: ProjectId,
    pub name: String,
    pub status: Status,
    /// Features in Source order.
    pub features: Vec<FeatureSnapshot>,
}

impl ProjectSnapshot {
    /// Joins a listed project with its fetched features.
    pub fn new(record: ProjectRecord, features: Vec<FeatureSnapshot>) -> Self {
        Self {
            id: record.id,
            name: record.name,
            status: record.status,
            features,
        }
    }

    /// Returns the Active features in Source order, each id at most once.
    ///
    /// A feature reachable through two characteristics shows up twice in the
    /// raw list; only its first occurrence counts.
    pub fn active_features(&self) -> impl Iterator<Item = &FeatureSnapshot> {
        let mut seen = HashSet::new();
        self.features
            .iter()
            .filter(move |f| f.status.is_active() && seen.insert(f.id.clone()))
    }
}

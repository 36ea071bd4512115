//! References to Target System objects, as read at the start of a project's
//! reconciliation.

use serde::{Deserialize, Serialize};

use crate::{ItemId, TrackingProjectId};

/// A tracking-project (board), matched against a project name by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProjectRef {
    /// Board node id.
    pub id: TrackingProjectId,
    /// Board title, compared verbatim with the project name.
    pub title: String,
}

/// An item (issue) inside a tracking-project, matched against a feature name
/// by title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetItemRef {
    /// Issue node id.
    pub id: ItemId,
    /// Issue title, compared verbatim with the feature name.
    pub title: String,
    /// Issue body; an absent body is the empty string.
    pub body: String,
}

/// Everything the planner needs to know about one project on the Target.
///
/// Read once per project and never refreshed mid-pass. Concurrent edits made
/// by someone else after the read are not detected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    /// Whether the derived repository exists for the authenticated user.
    pub repo_exists: bool,
    /// Board titled after the project, if any.
    pub tracking_project: Option<TargetProjectRef>,
    /// Items of `tracking_project`; empty when there is none.
    pub items: Vec<TargetItemRef>,
}

impl TargetState {
    /// State of a project that has never been synchronised.
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Picks the tracking-project whose title equals `title` exactly.
///
/// When the Target holds several boards with that title the first one listed
/// wins.
pub fn find_tracking_project<'a>(
    projects: &'a [TargetProjectRef],
    title: &str,
) -> Option<&'a TargetProjectRef> {
    let mut matches = projects.iter().filter(|p| p.title == title);
    let first = matches.next()?;
    let extra = matches.count();
    if extra > 0 {
        tracing::warn!(
            title,
            duplicates = extra,
            chosen = %first.id,
            "several tracking projects share a title; using the first"
        );
    }
    Some(first)
}

/// Description given to a repository created for `project_name`.
pub fn repo_description(project_name: &str) -> String {
    format!("Repo for {project_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(id: &str, title: &str) -> TargetProjectRef {
        TargetProjectRef {
            id: TrackingProjectId::new(id).unwrap(),
            title: title.into(),
        }
    }

    #[test]
    fn tracking_project_match_is_exact() {
        let boards = vec![board("PVT_1", "repatria track"), board("PVT_2", "Repatria Track")];
        let found = find_tracking_project(&boards, "Repatria Track").unwrap();
        assert_eq!(found.id.as_str(), "PVT_2");
        assert!(find_tracking_project(&boards, "Repatria").is_none());
    }

    #[test]
    fn first_duplicate_title_wins() {
        let boards = vec![board("PVT_1", "Synapse"), board("PVT_2", "Synapse")];
        assert_eq!(
            find_tracking_project(&boards, "Synapse").unwrap().id.as_str(),
            "PVT_1"
        );
    }
}

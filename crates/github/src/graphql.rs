//! GraphQL documents and response shapes for Projects (v2).
//!
//! Tracking projects and their items only exist in the GraphQL API; issues and
//! repositories go through REST (see [`crate::client`]).

use reconciler::{ItemId, TargetItemRef, TargetProjectRef, TrackingProjectId};
use serde::Deserialize;

use crate::error::GithubError;

pub const VIEWER: &str = "query { viewer { id login } }";

pub const VIEWER_PROJECTS: &str = r#"
query($cursor: String) {
  viewer {
    projectsV2(first: 100, after: $cursor) {
      nodes { id title }
      pageInfo { hasNextPage endCursor }
    }
  }
}"#;

pub const PROJECT_ITEMS: &str = r#"
query($project: ID!, $cursor: String) {
  node(id: $project) {
    ... on ProjectV2 {
      items(first: 100, after: $cursor) {
        nodes {
          content {
            __typename
            ... on Issue { id title body }
          }
        }
        pageInfo { hasNextPage endCursor }
      }
    }
  }
}"#;

pub const CREATE_PROJECT: &str = r#"
mutation($ownerId: ID!, $title: String!) {
  createProjectV2(input: {ownerId: $ownerId, title: $title}) {
    projectV2 { id }
  }
}"#;

pub const ADD_ITEM: &str = r#"
mutation($projectId: ID!, $contentId: ID!) {
  addProjectV2ItemById(input: {projectId: $projectId, contentId: $contentId}) {
    item { id }
  }
}"#;

pub const UPDATE_ISSUE_BODY: &str = r#"
mutation($id: ID!, $body: String!) {
  updateIssue(input: {id: $id, body: $body}) {
    issue { id }
  }
}"#;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Response<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEntry {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl<T> Response<T> {
    /// Unwraps `data`, turning any reported error into a [`GithubError`].
    ///
    /// GraphQL answers HTTP 200 even for failures; `NOT_FOUND` and
    /// `RATE_LIMITED` entries are lifted to their HTTP equivalents.
    pub fn into_data(self) -> Result<T, GithubError> {
        if let Some(first) = self.errors.first() {
            return Err(match first.kind.as_deref() {
                Some("NOT_FOUND") => GithubError::NotFound(first.message.clone()),
                Some("RATE_LIMITED") => GithubError::RateLimited { retry_after: None },
                _ => GithubError::GraphQl(
                    self.errors
                        .iter()
                        .map(|e| e.message.as_str())
                        .collect::<Vec<_>>()
                        .join("; "),
                ),
            });
        }
        self.data
            .ok_or_else(|| GithubError::Shape("GraphQL response without data".to_owned()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl PageInfo {
    pub fn next(&self) -> Option<String> {
        if self.has_next_page {
            self.end_cursor.clone()
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
    pub page_info: PageInfo,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ViewerData {
    pub viewer: Viewer,
}

/// The account the token acts for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Viewer {
    pub id: String,
    pub login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerProjectsData {
    pub viewer: ViewerProjects,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerProjects {
    pub projects_v2: Connection<ProjectNode>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectNode {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectItemsData {
    pub node: Option<ProjectItemsNode>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectItemsNode {
    /// Absent when the id resolves to something other than a ProjectV2.
    pub items: Option<Connection<ItemNode>>,
}

#[derive(Debug, Deserialize)]
pub struct ItemNode {
    pub content: Option<ItemContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
pub enum ItemContent {
    Issue {
        id: String,
        title: String,
        body: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectData {
    pub create_project_v2: CreatedProject,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProject {
    pub project_v2: ProjectIdNode,
}

#[derive(Debug, Deserialize)]
pub struct ProjectIdNode {
    pub id: String,
}

/// Mutations whose payload is not read back.
#[derive(Debug, Deserialize)]
pub struct Ignored {}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Board refs of one `projectsV2` page, skipping null and id-less nodes.
pub fn project_refs(page: Connection<ProjectNode>) -> Vec<TargetProjectRef> {
    page.nodes
        .into_iter()
        .flatten()
        .filter_map(|node| {
            Some(TargetProjectRef {
                id: TrackingProjectId::new(node.id)?,
                title: node.title,
            })
        })
        .collect()
}

/// Issue refs of one `items` page. Draft items and pull requests are dropped;
/// a null issue body reads as empty.
pub fn issue_refs(page: Connection<ItemNode>) -> Vec<TargetItemRef> {
    page.nodes
        .into_iter()
        .flatten()
        .filter_map(|node| match node.content? {
            ItemContent::Issue { id, title, body } => Some(TargetItemRef {
                id: ItemId::new(id)?,
                title,
                body: body.unwrap_or_default(),
            }),
            ItemContent::Other => None,
        })
        .collect()
}

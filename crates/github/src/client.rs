//! HTTP client for the GitHub REST and GraphQL APIs.

use std::time::Duration;

use async_trait::async_trait;
use reconciler::{
    AdapterError, ItemId, RepoName, TargetItemRef, TargetProjectRef, TargetSystem,
    TrackingProjectId,
};
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, instrument};

use crate::error::GithubError;
use crate::graphql::{self, Viewer};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_USER_AGENT: &str = concat!("synapse-sync/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const API_VERSION: &str = "2022-11-28";

/// Connection settings for [`GithubClient`].
#[derive(Clone)]
pub struct GithubConfig {
    pub token: String,
    pub api_url: String,
    /// Defaults to `<api_url>/graphql`.
    pub graphql_url: Option<String>,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// New repositories are public unless set.
    pub private_repos: bool,
}

impl GithubConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_owned(),
            graphql_url: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            private_repos: false,
        }
    }

    pub fn graphql_endpoint(&self) -> String {
        self.graphql_url
            .clone()
            .unwrap_or_else(|| format!("{}/graphql", self.api_url.trim_end_matches('/')))
    }
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("graphql_url", &self.graphql_url)
            .field("user_agent", &self.user_agent)
            .field("request_timeout", &self.request_timeout)
            .field("private_repos", &self.private_repos)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RestIssue {
    node_id: String,
    title: String,
    body: Option<String>,
}

/// Target adapter acting as the authenticated user.
///
/// Repositories and tracking projects are created under, and looked up in,
/// the account that owns the token.
#[derive(Debug, Clone)]
pub struct GithubClient {
    config: GithubConfig,
    http: Client,
    viewer: Viewer,
}

impl GithubClient {
    /// Builds the client and resolves the token's account.
    #[instrument(skip_all, fields(api_url = %config.api_url))]
    pub async fn connect(config: GithubConfig) -> Result<Self, GithubError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let mut client = Self {
            config,
            http,
            viewer: Viewer {
                id: String::new(),
                login: String::new(),
            },
        };
        let data: graphql::ViewerData = client.graphql(graphql::VIEWER, json!({})).await?;
        info!(login = %data.viewer.login, "GitHub credentials verified");
        client.viewer = data.viewer;
        Ok(client)
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    fn rest(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.api_url.trim_end_matches('/'), path);
        self.http
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, GithubError> {
        let response = self
            .http
            .request(Method::POST, self.config.graphql_endpoint())
            .bearer_auth(&self.config.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let envelope: graphql::Response<T> = check(response).await?.json().await?;
        envelope.into_data()
    }

    async fn all_projects(&self) -> Result<Vec<TargetProjectRef>, GithubError> {
        let mut projects = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let data: graphql::ViewerProjectsData = self
                .graphql(graphql::VIEWER_PROJECTS, json!({ "cursor": cursor }))
                .await?;
            let page = data.viewer.projects_v2;
            cursor = page.page_info.next();
            projects.extend(graphql::project_refs(page));
            if cursor.is_none() {
                return Ok(projects);
            }
        }
    }

    async fn all_items(&self, project: &TrackingProjectId) -> Result<Vec<TargetItemRef>, GithubError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let data: graphql::ProjectItemsData = self
                .graphql(
                    graphql::PROJECT_ITEMS,
                    json!({ "project": project.as_str(), "cursor": cursor }),
                )
                .await?;
            let page = data
                .node
                .and_then(|node| node.items)
                .ok_or_else(|| GithubError::NotFound(format!("tracking project {project}")))?;
            cursor = page.page_info.next();
            items.extend(graphql::issue_refs(page));
            if cursor.is_none() {
                return Ok(items);
            }
        }
    }
}

#[async_trait]
impl TargetSystem for GithubClient {
    #[instrument(skip_all, fields(repo = %name))]
    async fn repo_exists(&self, name: &RepoName) -> Result<bool, AdapterError> {
        let path = format!("/repos/{}/{}", self.viewer.login, name);
        let response = self
            .rest(Method::GET, &path)
            .send()
            .await
            .map_err(GithubError::from)?;
        match check(response).await {
            Ok(_) => Ok(true),
            Err(GithubError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip_all)]
    async fn list_tracking_projects(&self) -> Result<Vec<TargetProjectRef>, AdapterError> {
        let projects = self.all_projects().await?;
        debug!(count = projects.len(), "listed tracking projects");
        Ok(projects)
    }

    #[instrument(skip_all, fields(project = %project))]
    async fn list_items(
        &self,
        project: &TrackingProjectId,
    ) -> Result<Vec<TargetItemRef>, AdapterError> {
        let items = self.all_items(project).await?;
        debug!(count = items.len(), "listed tracking project items");
        Ok(items)
    }

    #[instrument(skip_all, fields(repo = %name))]
    async fn create_repo(&self, name: &RepoName, description: &str) -> Result<(), AdapterError> {
        let response = self
            .rest(Method::POST, "/user/repos")
            .json(&json!({
                "name": name.as_str(),
                "description": description,
                "private": self.config.private_repos,
            }))
            .send()
            .await
            .map_err(GithubError::from)?;
        check(response).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(title = %title))]
    async fn create_tracking_project(
        &self,
        title: &str,
    ) -> Result<TrackingProjectId, AdapterError> {
        let data: graphql::CreateProjectData = self
            .graphql(
                graphql::CREATE_PROJECT,
                json!({ "ownerId": self.viewer.id, "title": title }),
            )
            .await?;
        TrackingProjectId::new(data.create_project_v2.project_v2.id)
            .ok_or_else(|| AdapterError::Malformed("created project has an empty id".to_owned()))
    }

    #[instrument(skip_all, fields(repo = %repo, title = %title))]
    async fn create_item(
        &self,
        repo: &RepoName,
        title: &str,
        body: &str,
    ) -> Result<TargetItemRef, AdapterError> {
        let path = format!("/repos/{}/{}/issues", self.viewer.login, repo);
        let response = self
            .rest(Method::POST, &path)
            .json(&json!({ "title": title, "body": body }))
            .send()
            .await
            .map_err(GithubError::from)?;
        let issue: RestIssue = check(response)
            .await?
            .json()
            .await
            .map_err(GithubError::from)?;
        Ok(TargetItemRef {
            id: ItemId::new(issue.node_id)
                .ok_or_else(|| AdapterError::Malformed("issue without node_id".to_owned()))?,
            title: issue.title,
            body: issue.body.unwrap_or_default(),
        })
    }

    #[instrument(skip_all, fields(project = %project, item = %item.id))]
    async fn add_item_to_project(
        &self,
        project: &TrackingProjectId,
        item: &TargetItemRef,
    ) -> Result<(), AdapterError> {
        let _: graphql::Ignored = self
            .graphql(
                graphql::ADD_ITEM,
                json!({ "projectId": project.as_str(), "contentId": item.id.as_str() }),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip_all, fields(item = %item))]
    async fn update_item_body(&self, item: &ItemId, body: &str) -> Result<(), AdapterError> {
        let _: graphql::Ignored = self
            .graphql(
                graphql::UPDATE_ISSUE_BODY,
                json!({ "id": item.as_str(), "body": body }),
            )
            .await?;
        Ok(())
    }
}

/// Passes successful responses through and classifies the rest.
async fn check(response: Response) -> Result<Response, GithubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let headers = response.headers().clone();
    let path = response.url().path().to_owned();
    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &headers, path, body))
}

fn classify(status: StatusCode, headers: &HeaderMap, path: String, body: String) -> GithubError {
    let retry_after = retry_after(headers);
    match status {
        StatusCode::TOO_MANY_REQUESTS => GithubError::RateLimited { retry_after },
        // Secondary rate limits answer 403 with a back-off hint.
        StatusCode::FORBIDDEN if retry_after.is_some() || quota_exhausted(headers) => {
            GithubError::RateLimited { retry_after }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GithubError::Unauthorized(body),
        StatusCode::NOT_FOUND => GithubError::NotFound(path),
        _ => GithubError::Api { status, body },
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0")
}

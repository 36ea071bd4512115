//! HTTP client for the Notion REST API.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use reconciler::{
    AdapterError, FeatureId, FeatureSnapshot, ProjectId, ProjectRecord, SourceSystem, Status,
    DEFAULT_ACTIVE_LABEL,
};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::blocks::{to_markdown, Block};
use crate::error::NotionError;
use crate::properties::{
    page_property, page_title, property_id, property_text, relation_has_more, relation_ids,
    relation_item_id,
};

pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
pub const API_VERSION: &str = "2022-06-28";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const PAGE_SIZE: u32 = 100;

/// Names of the database properties the sync reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    pub project_name: String,
    pub project_status: String,
    pub quality_characteristics: String,
    pub features: String,
    pub feature_name: String,
    pub feature_status: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            project_name: "Project Name".to_owned(),
            project_status: "Status".to_owned(),
            quality_characteristics: "Quality Characteristics".to_owned(),
            features: "Features".to_owned(),
            feature_name: "Name".to_owned(),
            feature_status: "Status".to_owned(),
        }
    }
}

/// Connection settings for [`NotionClient`].
#[derive(Clone)]
pub struct NotionConfig {
    pub api_key: String,
    pub base_url: String,
    pub api_version: String,
    pub projects_db_id: String,
    pub properties: PropertyNames,
    pub active_label: String,
    pub request_timeout: Duration,
}

impl NotionConfig {
    pub fn new(api_key: impl Into<String>, projects_db_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_version: API_VERSION.to_owned(),
            projects_db_id: projects_db_id.into(),
            properties: PropertyNames::default(),
            active_label: DEFAULT_ACTIVE_LABEL.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("projects_db_id", &self.projects_db_id)
            .field("properties", &self.properties)
            .field("active_label", &self.active_label)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// One page of a paginated list endpoint.
#[derive(Debug, Deserialize)]
struct ListPage {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

impl ListPage {
    fn cursor(&self) -> Option<String> {
        if self.has_more {
            self.next_cursor.clone()
        } else {
            None
        }
    }
}

/// Source adapter over the Notion workspace holding the projects database.
#[derive(Debug, Clone)]
pub struct NotionClient {
    config: NotionConfig,
    http: Client,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Result<Self, NotionError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self { config, http })
    }

    /// Builds the client and verifies the API key against `/users/me`.
    #[instrument(skip_all, fields(base_url = %config.base_url))]
    pub async fn connect(config: NotionConfig) -> Result<Self, NotionError> {
        let client = Self::new(config)?;
        let me = client.send(client.request(Method::GET, "/users/me")).await?;
        debug!(
            bot = me.get("name").and_then(serde_json::Value::as_str).unwrap_or("unnamed"),
            "Notion credentials verified"
        );
        Ok(client)
    }

    pub fn config(&self) -> &NotionConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        self.http
            .request(method, url)
            .bearer_auth(&self.config.api_key)
            .header("Notion-Version", &self.config.api_version)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, NotionError> {
        let response = request.send().await?;
        handle_response(response).await
    }

    async fn list<F>(&self, mut build: F) -> Result<Vec<Value>, NotionError>
    where
        F: FnMut(Option<&str>) -> RequestBuilder,
    {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let body = self.send(build(cursor.as_deref())).await?;
            let page: ListPage =
                serde_json::from_value(body).map_err(|e| NotionError::Shape(e.to_string()))?;
            cursor = page.cursor();
            results.extend(page.results);
            if cursor.is_none() {
                return Ok(results);
            }
        }
    }

    async fn query_database(&self, database_id: &str) -> Result<Vec<Value>, NotionError> {
        let path = format!("/databases/{database_id}/query");
        self.list(|cursor| {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = cursor {
                body["start_cursor"] = json!(cursor);
            }
            self.request(Method::POST, &path).json(&body)
        })
        .await
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value, NotionError> {
        self.send(self.request(Method::GET, &format!("/pages/{page_id}")))
            .await
    }

    async fn block_children(&self, block_id: &str) -> Result<Vec<Value>, NotionError> {
        let path = format!("/blocks/{block_id}/children");
        self.list(|cursor| {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(cursor) = cursor {
                query.push(("start_cursor", cursor.to_owned()));
            }
            self.request(Method::GET, &path).query(&query)
        })
        .await
    }

    fn block_tree<'a>(&'a self, parent: &'a str) -> BoxFuture<'a, Result<Vec<Block>, NotionError>> {
        async move {
            let mut blocks = Vec::new();
            for raw in self.block_children(parent).await? {
                let mut block = Block::leaf(raw);
                if descends(&block) {
                    if let Some(id) = block.id().map(str::to_owned) {
                        block.children = self.block_tree(&id).await?;
                    }
                }
                blocks.push(block);
            }
            Ok(blocks)
        }
        .boxed()
    }

    /// Page body rendered as Markdown.
    pub async fn page_markdown(&self, page_id: &str) -> Result<String, NotionError> {
        let blocks = self.block_tree(page_id).await?;
        Ok(to_markdown(&blocks))
    }

    #[instrument(skip(self))]
    pub async fn active_projects(&self) -> Result<Vec<ProjectRecord>, NotionError> {
        let pages = self.query_database(&self.config.projects_db_id).await?;
        let total = pages.len();
        let projects: Vec<ProjectRecord> = pages
            .iter()
            .filter_map(|page| project_record(page, &self.config))
            .filter(|p| p.status.is_active())
            .collect();
        debug!(total, active = projects.len(), "queried projects database");
        Ok(projects)
    }

    /// Ids linked by a relation property, read past the 25-link page object
    /// limit when Notion truncated it.
    async fn relation(&self, page: &Value, name: &str) -> Result<Vec<String>, NotionError> {
        match relation_links(page, name)? {
            RelationLinks::Complete(ids) => Ok(ids),
            RelationLinks::Paged {
                page_id,
                property_id,
            } => {
                let path = format!("/pages/{page_id}/properties/{property_id}");
                let items = self
                    .list(|cursor| {
                        let mut query = vec![("page_size", PAGE_SIZE.to_string())];
                        if let Some(cursor) = cursor {
                            query.push(("start_cursor", cursor.to_owned()));
                        }
                        self.request(Method::GET, &path).query(&query)
                    })
                    .await?;
                debug!(property = name, links = items.len(), "read paginated relation");
                Ok(items.iter().filter_map(relation_item_id).collect())
            }
        }
    }

    /// Features reachable from a project through its quality characteristics.
    #[instrument(skip_all, fields(project = %project))]
    pub async fn project_features(
        &self,
        project: &ProjectId,
    ) -> Result<Vec<FeatureSnapshot>, NotionError> {
        let names = &self.config.properties;
        let page = self.retrieve_page(project.as_str()).await?;
        let characteristics = self.relation(&page, &names.quality_characteristics).await?;

        let mut seen = HashSet::new();
        let mut features = Vec::new();
        for characteristic in characteristics {
            let qc_page = self.retrieve_page(&characteristic).await?;
            for feature_id in self.relation(&qc_page, &names.features).await? {
                if !seen.insert(feature_id.clone()) {
                    continue;
                }
                let feature_page = self.retrieve_page(&feature_id).await?;
                let content = self.page_markdown(&feature_id).await?;
                features.push(feature_snapshot(&feature_page, content, &self.config)?);
            }
        }
        debug!(count = features.len(), "fetched features");
        Ok(features)
    }
}

#[async_trait]
impl SourceSystem for NotionClient {
    async fn list_active_projects(&self) -> Result<Vec<ProjectRecord>, AdapterError> {
        Ok(self.active_projects().await?)
    }

    async fn fetch_features(
        &self,
        project: &ProjectId,
    ) -> Result<Vec<FeatureSnapshot>, AdapterError> {
        Ok(self.project_features(project).await?)
    }
}

async fn handle_response(response: Response) -> Result<Value, NotionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let retry_after = retry_after(&response);
    let url = response.url().path().to_owned();
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NotionError::Unauthorized(body),
        StatusCode::NOT_FOUND => NotionError::NotFound(url),
        StatusCode::TOO_MANY_REQUESTS => NotionError::RateLimited { retry_after },
        _ => NotionError::Api { status, body },
    })
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Where the full link list of a relation property comes from.
#[derive(Debug, PartialEq, Eq)]
enum RelationLinks {
    /// The page object holds every link.
    Complete(Vec<String>),
    /// Truncated on the page object; page through the property endpoint.
    Paged { page_id: String, property_id: String },
}

fn relation_links(page: &Value, name: &str) -> Result<RelationLinks, NotionError> {
    let Some(property) = page_property(page, name) else {
        return Ok(RelationLinks::Complete(Vec::new()));
    };
    if !relation_has_more(property) {
        return Ok(RelationLinks::Complete(relation_ids(property)));
    }
    let page_id = page.get("id").and_then(Value::as_str);
    match (page_id, property_id(property)) {
        (Some(page_id), Some(property_id)) => Ok(RelationLinks::Paged {
            page_id: page_id.to_owned(),
            property_id: property_id.to_owned(),
        }),
        _ => Err(NotionError::Shape(format!(
            "relation '{name}' is truncated but the page or property id is missing"
        ))),
    }
}

/// Child pages and databases are separate documents, not part of the body.
fn descends(block: &Block) -> bool {
    block.has_children() && !matches!(block.kind(), "child_page" | "child_database")
}

fn status_of(page: &Value, property: &str, active_label: &str) -> Status {
    let label = page_property(page, property)
        .and_then(property_text)
        .unwrap_or_default();
    Status::from_label(&label, active_label)
}

/// Reads a projects-database row. Rows without an id or a name are skipped.
fn project_record(page: &Value, config: &NotionConfig) -> Option<ProjectRecord> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .and_then(ProjectId::new)?;
    let name = page_property(page, &config.properties.project_name)
        .and_then(property_text)
        .map(|n| n.trim().to_owned())
        .unwrap_or_default();
    if name.is_empty() {
        warn!(page = %id, "project page has no name; skipping");
        return None;
    }
    Some(ProjectRecord {
        id,
        name,
        status: status_of(page, &config.properties.project_status, &config.active_label),
    })
}

fn feature_snapshot(
    page: &Value,
    content: String,
    config: &NotionConfig,
) -> Result<FeatureSnapshot, NotionError> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .and_then(FeatureId::new)
        .ok_or_else(|| NotionError::Shape("feature page without id".to_owned()))?;
    let name = page_property(page, &config.properties.feature_name)
        .and_then(property_text)
        .or_else(|| page_title(page))
        .unwrap_or_default();
    Ok(FeatureSnapshot {
        id,
        name,
        status: status_of(page, &config.properties.feature_status, &config.active_label),
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotionConfig {
        NotionConfig::new("secret_test", "db-1")
    }

    fn project_page(id: &str, name: &str, status: &str) -> Value {
        json!({
            "object": "page",
            "id": id,
            "properties": {
                "Project Name": {"type": "title", "title": [{"plain_text": name}]},
                "Status": {"type": "select", "select": {"name": status}}
            }
        })
    }

    #[test]
    fn project_rows_are_read_with_status() {
        let record = project_record(&project_page("p-1", "Repatria", "Active"), &config())
            .expect("named page");
        assert_eq!(record.id.as_str(), "p-1");
        assert_eq!(record.name, "Repatria");
        assert!(record.status.is_active());

        let paused = project_record(&project_page("p-2", "Orbit", "Paused"), &config())
            .expect("named page");
        assert_eq!(paused.status, Status::Inactive("Paused".to_owned()));
    }

    #[test]
    fn unnamed_project_rows_are_skipped() {
        assert!(project_record(&project_page("p-1", "  ", "Active"), &config()).is_none());
        assert!(project_record(&json!({"id": "p-2", "properties": {}}), &config()).is_none());
    }

    #[test]
    fn feature_pages_fall_back_to_the_title_property() {
        let page = json!({
            "id": "f-1",
            "properties": {
                "Feature": {"type": "title", "title": [{"plain_text": "Login"}]},
                "Status": {"type": "status", "status": {"name": "Active"}}
            }
        });
        let feature = feature_snapshot(&page, "body".to_owned(), &config()).unwrap();
        assert_eq!(feature.name, "Login");
        assert_eq!(feature.content, "body");
        assert!(feature.status.is_active());
    }

    #[test]
    fn feature_without_status_is_inactive() {
        let page = json!({
            "id": "f-2",
            "properties": {"Name": {"type": "title", "title": [{"plain_text": "Export"}]}}
        });
        let feature = feature_snapshot(&page, String::new(), &config()).unwrap();
        assert!(!feature.status.is_active());
    }

    #[test]
    fn list_page_cursor_follows_has_more() {
        let more: ListPage = serde_json::from_value(json!({
            "results": [{"id": "a"}],
            "has_more": true,
            "next_cursor": "c-2"
        }))
        .unwrap();
        assert_eq!(more.cursor().as_deref(), Some("c-2"));

        let last: ListPage = serde_json::from_value(json!({
            "results": [],
            "has_more": false,
            "next_cursor": null
        }))
        .unwrap();
        assert_eq!(last.cursor(), None);
    }

    #[test]
    fn short_relations_are_read_from_the_page() {
        let page = json!({
            "id": "qc-1",
            "properties": {
                "Features": {
                    "id": "rel1",
                    "type": "relation",
                    "relation": [{"id": "f-1"}, {"id": "f-2"}],
                    "has_more": false
                }
            }
        });
        assert_eq!(
            relation_links(&page, "Features").unwrap(),
            RelationLinks::Complete(vec!["f-1".to_owned(), "f-2".to_owned()])
        );
        assert_eq!(
            relation_links(&page, "Owners").unwrap(),
            RelationLinks::Complete(Vec::new())
        );
    }

    #[test]
    fn truncated_relations_are_paged_through_the_property_endpoint() {
        let links: Vec<Value> = (1..=25).map(|n| json!({"id": format!("f-{n}")})).collect();
        let page = json!({
            "id": "qc-1",
            "properties": {
                "Features": {"id": "rel1", "type": "relation", "relation": links, "has_more": true}
            }
        });
        assert_eq!(
            relation_links(&page, "Features").unwrap(),
            RelationLinks::Paged {
                page_id: "qc-1".to_owned(),
                property_id: "rel1".to_owned(),
            }
        );
    }

    #[test]
    fn truncated_relation_without_ids_is_a_shape_error() {
        let page = json!({
            "properties": {
                "Features": {"type": "relation", "relation": [{"id": "f-1"}], "has_more": true}
            }
        });
        let err = relation_links(&page, "Features").unwrap_err();
        assert!(matches!(err, NotionError::Shape(_)));
    }

    #[test]
    fn relation_item_pages_chain_their_cursor() {
        let page: ListPage = serde_json::from_value(json!({
            "object": "list",
            "results": [
                {"object": "property_item", "type": "relation", "relation": {"id": "f-26"}}
            ],
            "has_more": true,
            "next_cursor": "c-2",
            "type": "property_item"
        }))
        .unwrap();
        assert_eq!(page.cursor().as_deref(), Some("c-2"));
        let ids: Vec<String> = page.results.iter().filter_map(relation_item_id).collect();
        assert_eq!(ids, vec!["f-26"]);
    }

    #[test]
    fn child_pages_are_not_descended() {
        let child_page = Block::leaf(json!({"type": "child_page", "has_children": true}));
        let toggle = Block::leaf(json!({"type": "toggle", "has_children": true}));
        assert!(!descends(&child_page));
        assert!(descends(&toggle));
    }

    #[test]
    fn debug_redacts_the_key() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret_test"));
    }
}

//! In-memory Source and Target fakes for driver tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reconciler::{
    AdapterError, FeatureId, FeatureSnapshot, ItemId, ProjectId, ProjectRecord, RepoName,
    SourceSystem, Status, TargetItemRef, TargetProjectRef, TargetSystem, TrackingProjectId,
};
use tokio_util::sync::CancellationToken;
use worker::{CallPolicy, WorkerConfig};

pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        calls: CallPolicy {
            timeout: Duration::from_millis(200),
            read_retries: 2,
            retry_backoff: Duration::from_millis(1),
        },
        max_concurrent_projects: 1,
        dry_run: false,
    }
}

pub fn active_feature(name: &str, content: &str) -> FeatureSnapshot {
    FeatureSnapshot {
        id: FeatureId::new(format!("feat-{name}")).unwrap(),
        name: name.to_owned(),
        status: Status::Active,
        content: content.to_owned(),
    }
}

pub fn draft_feature(name: &str, content: &str) -> FeatureSnapshot {
    FeatureSnapshot {
        status: Status::Inactive("Draft".to_owned()),
        ..active_feature(name, content)
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeSource {
    pub projects: Vec<ProjectRecord>,
    pub features: HashMap<ProjectId, Vec<FeatureSnapshot>>,
    pub unreachable: bool,
    /// Project names whose feature fetch panics.
    pub panic_on: HashSet<String>,
    /// Cancelled when the first feature fetch starts.
    pub cancel_on_fetch: Option<CancellationToken>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, name: &str, features: Vec<FeatureSnapshot>) -> Self {
        let id = ProjectId::new(format!("page-{}", self.projects.len())).unwrap();
        self.projects.push(ProjectRecord {
            id: id.clone(),
            name: name.to_owned(),
            status: Status::Active,
        });
        self.features.insert(id, features);
        self
    }
}

#[async_trait]
impl SourceSystem for FakeSource {
    async fn list_active_projects(&self) -> Result<Vec<ProjectRecord>, AdapterError> {
        if self.unreachable {
            return Err(AdapterError::Unauthorized {
                message: "API token is invalid.".to_owned(),
            });
        }
        Ok(self.projects.clone())
    }

    async fn fetch_features(
        &self,
        project: &ProjectId,
    ) -> Result<Vec<FeatureSnapshot>, AdapterError> {
        if let Some(token) = &self.cancel_on_fetch {
            token.cancel();
        }
        let record = self.projects.iter().find(|p| &p.id == project);
        if let Some(record) = record {
            if self.panic_on.contains(&record.name) {
                panic!("corrupt page for {}", record.name);
            }
        }
        self.features
            .get(project)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(project.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TargetData {
    repos: HashSet<String>,
    boards: Vec<TargetProjectRef>,
    board_items: HashMap<TrackingProjectId, Vec<ItemId>>,
    issues: HashMap<ItemId, (String, TargetItemRef)>,
    next_id: usize,
    /// Every mutating call, in order, as `op:key`.
    mutations: Vec<String>,
    /// `op:key` pairs that fail every time.
    failing: HashSet<String>,
    /// `op:key` pairs that fail transiently this many more times.
    flaky: HashMap<String, usize>,
    /// Per-operation artificial latency.
    delays: HashMap<String, Duration>,
}

#[derive(Default)]
pub struct FakeTarget {
    data: Mutex<TargetData>,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(self, name: &str) -> Self {
        self.data.lock().unwrap().repos.insert(name.to_owned());
        self
    }

    pub fn with_board(self, title: &str) -> Self {
        {
            let mut data = self.data.lock().unwrap();
            let id = TrackingProjectId::new(format!("PVT_{}", data.boards.len())).unwrap();
            data.boards.push(TargetProjectRef {
                id,
                title: title.to_owned(),
            });
        }
        self
    }

    pub fn with_item(self, board_title: &str, title: &str, body: &str) -> Self {
        {
            let mut data = self.data.lock().unwrap();
            let board = data
                .boards
                .iter()
                .find(|b| b.title == board_title)
                .expect("board must exist")
                .id
                .clone();
            let item = data.new_issue("seed", title, body);
            data.board_items.entry(board).or_default().push(item.id);
        }
        self
    }

    /// Makes `op` fail permanently for `key` (repo name, title, or item id).
    pub fn failing(self, op: &str, key: &str) -> Self {
        self.data
            .lock()
            .unwrap()
            .failing
            .insert(format!("{op}:{key}"));
        self
    }

    /// Makes `op` fail with a transient error `times` times for `key`.
    pub fn flaky(self, op: &str, key: &str, times: usize) -> Self {
        self.data
            .lock()
            .unwrap()
            .flaky
            .insert(format!("{op}:{key}"), times);
        self
    }

    pub fn delayed(self, op: &str, delay: Duration) -> Self {
        self.data
            .lock()
            .unwrap()
            .delays
            .insert(op.to_owned(), delay);
        self
    }

    pub fn mutations(&self) -> Vec<String> {
        self.data.lock().unwrap().mutations.clone()
    }

    pub fn items_on(&self, board_title: &str) -> Vec<TargetItemRef> {
        let data = self.data.lock().unwrap();
        let Some(board) = data.boards.iter().find(|b| b.title == board_title) else {
            return Vec::new();
        };
        data.board_items
            .get(&board.id)
            .map(|ids| ids.iter().map(|id| data.issues[id].1.clone()).collect())
            .unwrap_or_default()
    }

    pub fn issue_count(&self) -> usize {
        self.data.lock().unwrap().issues.len()
    }

    pub fn has_repo(&self, name: &str) -> bool {
        self.data.lock().unwrap().repos.contains(name)
    }

    pub fn board_count(&self) -> usize {
        self.data.lock().unwrap().boards.len()
    }

    async fn enter(&self, op: &str, key: &str, mutating: bool) -> Result<(), AdapterError> {
        let delay = self.data.lock().unwrap().delays.get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut data = self.data.lock().unwrap();
        let tag = format!("{op}:{key}");
        if data.failing.contains(&tag) {
            return Err(AdapterError::Rejected {
                message: format!("{op} refused for {key}"),
            });
        }
        if let Some(remaining) = data.flaky.get_mut(&tag) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AdapterError::Unavailable {
                    message: format!("{op} temporarily unavailable"),
                    retry_after: None,
                });
            }
        }
        if mutating {
            data.mutations.push(tag);
        }
        Ok(())
    }
}

impl TargetData {
    fn new_issue(&mut self, repo: &str, title: &str, body: &str) -> TargetItemRef {
        self.next_id += 1;
        let item = TargetItemRef {
            id: ItemId::new(format!("I_{}", self.next_id)).unwrap(),
            title: title.to_owned(),
            body: body.to_owned(),
        };
        self.issues
            .insert(item.id.clone(), (repo.to_owned(), item.clone()));
        item
    }
}

#[async_trait]
impl TargetSystem for FakeTarget {
    async fn repo_exists(&self, name: &RepoName) -> Result<bool, AdapterError> {
        self.enter("repo_exists", name.as_str(), false).await?;
        Ok(self.has_repo(name.as_str()))
    }

    async fn list_tracking_projects(&self) -> Result<Vec<TargetProjectRef>, AdapterError> {
        self.enter("list_tracking_projects", "*", false).await?;
        Ok(self.data.lock().unwrap().boards.clone())
    }

    async fn list_items(
        &self,
        project: &TrackingProjectId,
    ) -> Result<Vec<TargetItemRef>, AdapterError> {
        self.enter("list_items", project.as_str(), false).await?;
        let data = self.data.lock().unwrap();
        Ok(data
            .board_items
            .get(project)
            .map(|ids| ids.iter().map(|id| data.issues[id].1.clone()).collect())
            .unwrap_or_default())
    }

    async fn create_repo(&self, name: &RepoName, _description: &str) -> Result<(), AdapterError> {
        self.enter("create_repo", name.as_str(), true).await?;
        self.data
            .lock()
            .unwrap()
            .repos
            .insert(name.as_str().to_owned());
        Ok(())
    }

    async fn create_tracking_project(
        &self,
        title: &str,
    ) -> Result<TrackingProjectId, AdapterError> {
        self.enter("create_tracking_project", title, true).await?;
        let mut data = self.data.lock().unwrap();
        let id = TrackingProjectId::new(format!("PVT_{}", data.boards.len())).unwrap();
        data.boards.push(TargetProjectRef {
            id: id.clone(),
            title: title.to_owned(),
        });
        Ok(id)
    }

    async fn create_item(
        &self,
        repo: &RepoName,
        title: &str,
        body: &str,
    ) -> Result<TargetItemRef, AdapterError> {
        self.enter("create_item", title, true).await?;
        Ok(self
            .data
            .lock()
            .unwrap()
            .new_issue(repo.as_str(), title, body))
    }

    async fn add_item_to_project(
        &self,
        project: &TrackingProjectId,
        item: &TargetItemRef,
    ) -> Result<(), AdapterError> {
        self.enter("add_item_to_project", &item.title, true).await?;
        self.data
            .lock()
            .unwrap()
            .board_items
            .entry(project.clone())
            .or_default()
            .push(item.id.clone());
        Ok(())
    }

    async fn update_item_body(&self, item: &ItemId, body: &str) -> Result<(), AdapterError> {
        self.enter("update_item_body", item.as_str(), true).await?;
        let mut data = self.data.lock().unwrap();
        match data.issues.get_mut(item) {
            Some((_, issue)) => {
                issue.body = body.to_owned();
                Ok(())
            }
            None => Err(AdapterError::NotFound(item.to_string())),
        }
    }
}

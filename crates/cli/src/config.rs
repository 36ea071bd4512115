//! Configuration file parsing, environment overrides, and validation.
//!
//! Every section is optional in the file. Secrets are normally supplied through
//! the environment (`NOTION_API_KEY`, `GITHUB_TOKEN`, `PROJECTS_DB_ID`), which
//! takes precedence over anything written in the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use github::GithubConfig;
use notion::{NotionConfig, PropertyNames};
use serde::Deserialize;
use worker::{CallPolicy, WorkerConfig};

pub const DEFAULT_CONFIG_PATH: &str = "synapse-sync.toml";

pub const ENV_NOTION_API_KEY: &str = "NOTION_API_KEY";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_PROJECTS_DB_ID: &str = "PROJECTS_DB_ID";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub notion: NotionSection,
    pub github: GithubSection,
    pub worker: WorkerSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotionSection {
    pub api_key: Option<String>,
    pub projects_db_id: Option<String>,
    pub base_url: String,
    pub active_label: String,
    pub request_timeout_secs: u64,
    pub properties: PropertySection,
}

impl Default for NotionSection {
    fn default() -> Self {
        Self {
            api_key: None,
            projects_db_id: None,
            base_url: notion::DEFAULT_BASE_URL.to_owned(),
            active_label: reconciler::DEFAULT_ACTIVE_LABEL.to_owned(),
            request_timeout_secs: 30,
            properties: PropertySection::default(),
        }
    }
}

/// Database property names, for workspaces that renamed them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropertySection {
    pub project_name: String,
    pub project_status: String,
    pub quality_characteristics: String,
    pub features: String,
    pub feature_name: String,
    pub feature_status: String,
}

impl Default for PropertySection {
    fn default() -> Self {
        let names = PropertyNames::default();
        Self {
            project_name: names.project_name,
            project_status: names.project_status,
            quality_characteristics: names.quality_characteristics,
            features: names.features,
            feature_name: names.feature_name,
            feature_status: names.feature_status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubSection {
    pub token: Option<String>,
    pub api_url: String,
    pub graphql_url: Option<String>,
    pub user_agent: Option<String>,
    pub request_timeout_secs: u64,
    pub private_repos: bool,
}

impl Default for GithubSection {
    fn default() -> Self {
        Self {
            token: None,
            api_url: github::DEFAULT_API_URL.to_owned(),
            graphql_url: None,
            user_agent: None,
            request_timeout_secs: 30,
            private_repos: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSection {
    pub call_timeout_secs: u64,
    pub read_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_concurrent_projects: usize,
    pub dry_run: bool,
    /// JSON-lines run log, appended to on every run.
    pub run_log: PathBuf,
}

impl Default for WorkerSection {
    fn default() -> Self {
        let calls = CallPolicy::default();
        Self {
            call_timeout_secs: calls.timeout.as_secs(),
            read_retries: calls.read_retries,
            retry_backoff_ms: calls.retry_backoff.as_millis() as u64,
            max_concurrent_projects: 1,
            dry_run: false,
            run_log: PathBuf::from("logs/sync-run-log.jsonl"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub format: LogFormat,
    /// OTLP gRPC endpoint; spans are exported only when set.
    pub otlp_endpoint: Option<String>,
}

impl SyncConfig {
    /// Loads `path`, or the default file when `path` is `None`.
    ///
    /// A missing default file yields the built-in defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overrides secrets with values from `lookup` (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(key) = get(ENV_NOTION_API_KEY) {
            self.notion.api_key = Some(key);
        }
        if let Some(id) = get(ENV_PROJECTS_DB_ID) {
            self.notion.projects_db_id = Some(id);
        }
        if let Some(token) = get(ENV_GITHUB_TOKEN) {
            self.github.token = Some(token);
        }
    }

    /// Rejects configurations no run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if is_blank(&self.notion.api_key) {
            missing.push(ENV_NOTION_API_KEY);
        }
        if is_blank(&self.notion.projects_db_id) {
            missing.push(ENV_PROJECTS_DB_ID);
        }
        if is_blank(&self.github.token) {
            missing.push(ENV_GITHUB_TOKEN);
        }
        if !missing.is_empty() {
            return Err(ConfigError::Validation(format!(
                "missing credentials: {}",
                missing.join(", ")
            )));
        }
        if self.worker.call_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "worker.call_timeout_secs must be greater than zero".to_owned(),
            ));
        }
        if self.worker.max_concurrent_projects == 0 {
            return Err(ConfigError::Validation(
                "worker.max_concurrent_projects must be greater than zero".to_owned(),
            ));
        }
        if self.notion.request_timeout_secs == 0 || self.github.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "request_timeout_secs must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn notion(&self) -> NotionConfig {
        let props = &self.notion.properties;
        let mut config = NotionConfig::new(
            self.notion.api_key.clone().unwrap_or_default(),
            self.notion.projects_db_id.clone().unwrap_or_default(),
        );
        config.base_url = self.notion.base_url.clone();
        config.active_label = self.notion.active_label.clone();
        config.request_timeout = Duration::from_secs(self.notion.request_timeout_secs);
        config.properties = PropertyNames {
            project_name: props.project_name.clone(),
            project_status: props.project_status.clone(),
            quality_characteristics: props.quality_characteristics.clone(),
            features: props.features.clone(),
            feature_name: props.feature_name.clone(),
            feature_status: props.feature_status.clone(),
        };
        config
    }

    pub fn github(&self) -> GithubConfig {
        let mut config = GithubConfig::new(self.github.token.clone().unwrap_or_default());
        config.api_url = self.github.api_url.clone();
        config.graphql_url = self.github.graphql_url.clone();
        if let Some(agent) = &self.github.user_agent {
            config.user_agent = agent.clone();
        }
        config.request_timeout = Duration::from_secs(self.github.request_timeout_secs);
        config.private_repos = self.github.private_repos;
        config
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            calls: CallPolicy {
                timeout: Duration::from_secs(self.worker.call_timeout_secs),
                read_retries: self.worker.read_retries,
                retry_backoff: Duration::from_millis(self.worker.retry_backoff_ms),
            },
            max_concurrent_projects: self.worker.max_concurrent_projects,
            dry_run: self.worker.dry_run,
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn with_secrets() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.apply_env(env(&[
            (ENV_NOTION_API_KEY, "secret_n"),
            (ENV_PROJECTS_DB_ID, "db-1"),
            (ENV_GITHUB_TOKEN, "ghp_x"),
        ]));
        config
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = SyncConfig::from_toml("").unwrap();
        assert_eq!(config.worker.call_timeout_secs, 30);
        assert_eq!(config.worker.read_retries, 2);
        assert_eq!(config.worker.max_concurrent_projects, 1);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.notion.properties.project_name, "Project Name");
        assert_eq!(config.notion.active_label, "Active");
    }

    #[test]
    fn sections_override_defaults() {
        let config = SyncConfig::from_toml(
            r#"
            [worker]
            max_concurrent_projects = 4
            dry_run = true

            [notion.properties]
            project_name = "Name"

            [logging]
            format = "pretty"
            otlp_endpoint = "http://localhost:4317"
            "#,
        )
        .unwrap();
        assert_eq!(config.worker.max_concurrent_projects, 4);
        assert!(config.worker.dry_run);
        assert_eq!(config.notion.properties.project_name, "Name");
        assert_eq!(config.notion.properties.features, "Features");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(
            config.logging.otlp_endpoint.as_deref(),
            Some("http://localhost:4317")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SyncConfig::from_toml("[worker]\nthreads = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn environment_overrides_file_secrets() {
        let mut config = SyncConfig::from_toml(
            r#"
            [github]
            token = "from-file"
            "#,
        )
        .unwrap();
        config.apply_env(env(&[(ENV_GITHUB_TOKEN, "from-env"), (ENV_NOTION_API_KEY, "  ")]));
        assert_eq!(config.github.token.as_deref(), Some("from-env"));
        assert_eq!(config.notion.api_key, None);
    }

    #[test]
    fn missing_secrets_are_listed() {
        let mut config = SyncConfig::default();
        config.apply_env(env(&[(ENV_GITHUB_TOKEN, "ghp_x")]));
        match config.validate() {
            Err(ConfigError::Validation(message)) => {
                assert!(message.contains(ENV_NOTION_API_KEY));
                assert!(message.contains(ENV_PROJECTS_DB_ID));
                assert!(!message.contains(ENV_GITHUB_TOKEN));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn zero_timeout_or_concurrency_is_invalid() {
        let mut config = with_secrets();
        assert!(config.validate().is_ok());

        config.worker.call_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.worker.call_timeout_secs = 5;
        config.worker.max_concurrent_projects = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn adapter_configs_carry_settings() {
        let mut config = with_secrets();
        config.worker.retry_backoff_ms = 250;
        config.github.private_repos = true;

        let worker = config.worker();
        assert_eq!(worker.calls.retry_backoff, Duration::from_millis(250));
        assert_eq!(config.notion().projects_db_id, "db-1");
        assert!(config.github().private_repos);
        assert_eq!(config.github().token, "ghp_x");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            SyncConfig::load(Some(missing.as_path())),
            Err(ConfigError::Io { .. })
        ));

        let present = dir.path().join("present.toml");
        std::fs::write(&present, "[worker]\nread_retries = 0\n").unwrap();
        assert_eq!(
            SyncConfig::load(Some(present.as_path())).unwrap().worker.read_retries,
            0
        );
    }
}

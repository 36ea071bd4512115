use std::time::Duration;

use reconciler::AdapterError;
use reqwest::StatusCode;
use thiserror::Error;

/// GitHub client errors.
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("GitHub API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

impl From<GithubError> for AdapterError {
    fn from(err: GithubError) -> Self {
        match err {
            GithubError::Http(e) if e.is_decode() => AdapterError::Malformed(e.to_string()),
            GithubError::Http(e) => AdapterError::Unavailable {
                message: e.to_string(),
                retry_after: None,
            },
            GithubError::Unauthorized(message) => AdapterError::Unauthorized { message },
            GithubError::NotFound(what) => AdapterError::NotFound(what),
            GithubError::RateLimited { retry_after } => AdapterError::Unavailable {
                message: "rate limited by GitHub".to_owned(),
                retry_after,
            },
            GithubError::Api { status, body } if status.is_server_error() => {
                AdapterError::Unavailable {
                    message: format!("{status}: {body}"),
                    retry_after: None,
                }
            }
            GithubError::Api { status, body } => AdapterError::Rejected {
                message: format!("{status}: {body}"),
            },
            GithubError::GraphQl(message) => AdapterError::Rejected { message },
            GithubError::Shape(message) => AdapterError::Malformed(message),
        }
    }
}

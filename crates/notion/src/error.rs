use std::time::Duration;

use reconciler::AdapterError;
use reqwest::StatusCode;
use thiserror::Error;

/// Notion client errors.
#[derive(Debug, Error)]
pub enum NotionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Notion API error {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("Unexpected page shape: {0}")]
    Shape(String),
}

impl From<NotionError> for AdapterError {
    fn from(err: NotionError) -> Self {
        match err {
            NotionError::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                AdapterError::Unavailable {
                    message: e.to_string(),
                    retry_after: None,
                }
            }
            NotionError::Http(e) if e.is_decode() => AdapterError::Malformed(e.to_string()),
            NotionError::Http(e) => AdapterError::Unavailable {
                message: e.to_string(),
                retry_after: None,
            },
            NotionError::Unauthorized(message) => AdapterError::Unauthorized { message },
            NotionError::NotFound(what) => AdapterError::NotFound(what),
            NotionError::RateLimited { retry_after } => AdapterError::Unavailable {
                message: "rate limited by Notion".to_owned(),
                retry_after,
            },
            NotionError::Api { status, body } if status.is_server_error() => {
                AdapterError::Unavailable {
                    message: format!("{status}: {body}"),
                    retry_after: None,
                }
            }
            NotionError::Api { status, body } => AdapterError::Rejected {
                message: format!("{status}: {body}"),
            },
            NotionError::Shape(message) => AdapterError::Malformed(message),
        }
    }
}

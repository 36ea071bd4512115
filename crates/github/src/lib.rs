//! Synapse sync Target adapter for GitHub.
//!
//! Implements [`reconciler::TargetSystem`] for a personal GitHub account:
//! repositories and issues through REST, tracking projects (Projects v2) and
//! their items through GraphQL.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Pagination,
//! authentication, and status-code classification are handled here; the
//! [`reconciler`] crate only ever sees [`reconciler::AdapterError`].

pub mod client;
pub mod error;
pub mod graphql;

pub use client::{GithubClient, GithubConfig, DEFAULT_API_URL};
pub use error::GithubError;
pub use graphql::Viewer;

//! Synapse sync Source adapter for Notion.
//!
//! Implements [`reconciler::SourceSystem`] over the Notion REST API. Projects
//! come from a single database; a project's features are reached through its
//! "Quality Characteristics" relation, and each feature's page body becomes
//! the Markdown content mirrored onto the Target.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, pagination, property flattening and
//! block rendering live here. The [`reconciler`] crate sees only
//! [`reconciler::SourceSystem`] and [`reconciler::AdapterError`].

pub mod blocks;
pub mod client;
pub mod error;
pub mod properties;

pub use client::{NotionClient, NotionConfig, PropertyNames, API_VERSION, DEFAULT_BASE_URL};
pub use error::NotionError;

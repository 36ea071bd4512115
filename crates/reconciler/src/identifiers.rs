//! Newtype domain identifiers.
//!
//! Each system hands out its own kind of identity: the Source System names
//! pages by opaque ids, the Target System names repositories by slug and
//! tracking-projects/issues by GraphQL node id. Wrapping each in a distinct
//! newtype keeps a [`FeatureId`] from ever being passed where an [`ItemId`] is
//! expected, even though both are strings underneath.
//!
//! No identifier is shared across the two systems. The only bridge between
//! them is the name mapping in [`RepoName::derive`] and exact title matching.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Source System identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a project record (a page in the projects database).
    ProjectId
}

string_id! {
    /// Identifies a feature record reachable from a project.
    FeatureId
}

// ---------------------------------------------------------------------------
// Target System identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// The name (slug) of a repository owned by the authenticated account.
    ///
    /// Use [`RepoName::derive`] to obtain the canonical name for a project.
    RepoName
}

string_id! {
    /// GraphQL node id of a tracking-project (a GitHub Projects v2 board).
    TrackingProjectId
}

string_id! {
    /// GraphQL node id of an item (issue) inside a tracking-project.
    ItemId
}

impl RepoName {
    /// Derives the canonical repository name for a project name.
    ///
    /// Every space becomes `-` and the result is lower-cased, so
    /// `"Repatria Track"` maps to `"repatria-track"`. Runs of spaces are kept
    /// as runs of hyphens, which matches the names existing repositories
    /// were created with.
    ///
    /// Returns `None` for an empty project name.
    pub fn derive(project_name: &str) -> Option<Self> {
        Self::new(project_name.replace(' ', "-").to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed, generated internally
// ---------------------------------------------------------------------------

/// Identifies a single synchronisation run.
///
/// Generated fresh for every invocation; attached to the run span so all
/// activity from one run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//! Project model.
//!
//! # Responsibility
//! - Pair a display name with a schema document and a session-local id.
//! - Derive the slug used for file lookup and the session bookmark.
//!
//! # Invariants
//! - `id` is fresh for every created or loaded project and is never persisted.
//! - Two names with the same slug address the same persisted file.

use crate::model::document::SchemaDocument;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session-local identifier of an open project.
pub type ProjectId = Uuid;

/// One schema-diagram project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Human-readable display name; the slug is derived from it.
    pub name: String,
    pub document: SchemaDocument,
}

impl Project {
    /// Creates a project with a generated id.
    pub fn new(name: impl Into<String>, document: SchemaDocument) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            document,
        }
    }

    /// Creates a project holding [`SchemaDocument::empty`].
    pub fn blank(name: impl Into<String>) -> Self {
        Self::new(name, SchemaDocument::empty())
    }

    /// File-system key of this project.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Lower-cases `name` and replaces spaces with underscores.
pub fn slugify(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

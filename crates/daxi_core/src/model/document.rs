//! Schema document model.
//!
//! # Responsibility
//! - Hold one project's entity-relationship data as opaque JSON.
//! - Provide the text codec used by storage, history and the mirror file.
//!
//! # Invariants
//! - No field-level validation: any well-formed JSON value is accepted.
//! - `SchemaDocument::parse(&doc.serialize()) == Ok(doc)` for every document.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Malformed document text (stored file, history snapshot or AI output).
#[derive(Debug)]
pub struct FormatError(serde_json::Error);

impl FormatError {
    /// 1-based line of the first syntax error, or 0 when not positional.
    pub fn line(&self) -> usize {
        self.0.line()
    }

    /// 1-based column of the first syntax error, or 0 when not positional.
    pub fn column(&self) -> usize {
        self.0.column()
    }
}

impl Display for FormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed schema document: {}", self.0)
    }
}

impl Error for FormatError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl From<serde_json::Error> for FormatError {
    fn from(value: serde_json::Error) -> Self {
        Self(value)
    }
}

/// Entity-relationship data of one project.
///
/// Serialized transparently: the JSON on disk is the document itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDocument(Value);

impl SchemaDocument {
    /// The blank schema every new project starts with.
    pub fn empty() -> Self {
        Self(json!({
            "entities": [],
            "relationships": []
        }))
    }

    /// Wraps an already-structured value without validation.
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Parses document text.
    ///
    /// # Errors
    /// - Returns [`FormatError`] when `text` is not a single JSON value.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let value = serde_json::from_str::<Value>(text)?;
        Ok(Self(value))
    }

    /// Pretty-printed JSON text, the on-disk representation.
    pub fn serialize(&self) -> String {
        format!("{:#}", self.0)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Number of items under `entities` when it is an array; 0 otherwise.
    ///
    /// Used for metadata-only logging.
    pub fn entity_count(&self) -> usize {
        self.array_len("entities")
    }

    /// Number of items under `relationships` when it is an array; 0 otherwise.
    pub fn relationship_count(&self) -> usize {
        self.array_len("relationships")
    }

    fn array_len(&self, key: &str) -> usize {
        self.0
            .get(key)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for SchemaDocument {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

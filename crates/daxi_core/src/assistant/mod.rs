//! Contracts for the hosted language-model collaborator.
//!
//! # Responsibility
//! - Define generation and export requests sent to the assistant.
//! - Serialize assistant calls per session and bound them with a timeout.
//! - Turn raw assistant replies into documents and downloadable artifacts.
//!
//! # Invariants
//! - Nothing in this module mutates session state; callers apply results
//!   only after a call completed successfully.

pub mod export;
pub mod extract;
pub mod guard;
#[cfg(feature = "http")]
pub mod http;
pub mod timeout;

use crate::model::document::{FormatError, SchemaDocument};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Kind of assistant call holding the in-flight slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Generate,
    ExportDdl,
    ExportDocumentation,
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => f.write_str("generate"),
            Self::ExportDdl => f.write_str("export_ddl"),
            Self::ExportDocumentation => f.write_str("export_documentation"),
        }
    }
}

#[derive(Debug)]
pub enum AssistantError {
    /// Another call is in flight for this session.
    Busy(Operation),
    TimedOut(Duration),
    /// The service failed or returned unusable content.
    Service(String),
    /// No assistant is attached to the session.
    NotConfigured,
    /// Generated text is not a well-formed document.
    Format(FormatError),
    /// The reply could not be packaged into a downloadable file.
    Packaging(String),
}

impl Display for AssistantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Busy(operation) => write!(f, "another assistant call is in progress: {operation}"),
            Self::TimedOut(timeout) => write!(f, "assistant call timed out after {timeout:?}"),
            Self::Service(message) => write!(f, "assistant service error: {message}"),
            Self::NotConfigured => write!(f, "no assistant service configured"),
            Self::Format(err) => write!(f, "assistant returned an unusable document: {err}"),
            Self::Packaging(message) => write!(f, "failed to package export: {message}"),
        }
    }
}

impl Error for AssistantError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FormatError> for AssistantError {
    fn from(value: FormatError) -> Self {
        Self::Format(value)
    }
}

/// Uploaded file forwarded to the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// UTF-8 view of the content, when it is text.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Prompt plus context for one schema generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub current_document: SchemaDocument,
    /// Background material (requirements, notes).
    pub reference_files: Vec<Attachment>,
    /// Legacy schema sources to convert.
    pub schema_files: Vec<Attachment>,
}

impl GenerationRequest {
    /// Request with no attachments.
    pub fn new(prompt: impl Into<String>, current_document: SchemaDocument) -> Self {
        Self {
            prompt: prompt.into(),
            current_document,
            reference_files: Vec::new(),
            schema_files: Vec::new(),
        }
    }
}

/// Target database of a DDL export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DdlDialect {
    Oracle,
    SqlServer,
    Postgre,
    MongoDb,
    Db2,
}

impl DdlDialect {
    pub const ALL: [DdlDialect; 5] = [
        Self::Oracle,
        Self::SqlServer,
        Self::Postgre,
        Self::MongoDb,
        Self::Db2,
    ];

    /// Display label offered to the user.
    pub fn label(self) -> &'static str {
        match self {
            Self::Oracle => "Oracle",
            Self::SqlServer => "SQL Server",
            Self::Postgre => "Postgre",
            Self::MongoDb => "MongoDB",
            Self::Db2 => "DB2",
        }
    }

    /// Label lower-cased with spaces removed, used in file names.
    pub fn file_token(self) -> String {
        self.label().to_lowercase().replace(' ', "")
    }
}

impl Display for DdlDialect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DdlDialect {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_lowercase().replace([' ', '_', '-'], "");
        Self::ALL
            .into_iter()
            .find(|dialect| dialect.file_token() == wanted)
            .ok_or_else(|| {
                format!(
                    "unsupported dialect `{}`; expected one of: {}",
                    value.trim(),
                    Self::ALL.map(DdlDialect::label).join(", ")
                )
            })
    }
}

/// Hosted language-model service.
///
/// Implementations block until the service replies. Returned text is raw
/// model output; callers extract documents and fenced code themselves.
pub trait SchemaAssistant: Send + Sync {
    fn generate_schema(&self, request: &GenerationRequest) -> Result<String, AssistantError>;

    fn export_ddl(
        &self,
        dialect: DdlDialect,
        document: &SchemaDocument,
    ) -> Result<String, AssistantError>;

    fn write_documentation(&self, document: &SchemaDocument) -> Result<String, AssistantError>;
}

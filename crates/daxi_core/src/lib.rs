//! Project state and history core for the DAXI schema-diagram editor.
//!
//! This crate owns the single active project of a session, its undo/redo
//! history, the on-disk project store and the current-model mirror file read
//! by the diagram renderer. The hosted language model is reached only through
//! the [`SchemaAssistant`] contract.

pub mod assistant;
mod atomic_write;
pub mod config;
pub mod history;
pub mod logging;
pub mod mirror;
pub mod model;
pub mod repo;
pub mod service;

pub use assistant::export::ExportArtifact;
pub use assistant::guard::{InFlightGuard, InFlightTicket};
pub use assistant::{
    AssistantError, Attachment, DdlDialect, GenerationRequest, Operation, SchemaAssistant,
};
pub use config::{ConfigError, WorkspaceConfig};
pub use history::{Direction, HistoryError, HistoryManager};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel};
pub use mirror::{FileMirror, MirrorError, MirrorOrder, ModelMirror};
pub use model::document::{FormatError, SchemaDocument};
pub use model::project::{slugify, Project, ProjectId};
pub use repo::project_repo::{FsProjectRepository, ProjectRepository, RepoError, RepoResult};
pub use service::session::{Notice, SessionController, SessionError, SessionResult, Severity};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Session controller.
//!
//! # Responsibility
//! - Own the single active project, its history and the restore bookmark.
//! - Route user actions through the project store, history and mirror.
//! - Run assistant calls one at a time and apply only completed results.
//!
//! # Invariants
//! - A failed operation leaves the active project, history and store as they
//!   were before the call.
//! - After create or load, history holds exactly one entry at index 0.
//! - Mirror failures never fail an operation; they become warning notices.

use crate::assistant::export::{ddl_artifact, documentation_artifact, ExportArtifact};
use crate::assistant::extract::{extract_code, extract_document};
use crate::assistant::guard::InFlightGuard;
use crate::assistant::timeout::run_with_timeout;
use crate::assistant::{
    AssistantError, Attachment, DdlDialect, GenerationRequest, Operation, SchemaAssistant,
};
use crate::config::WorkspaceConfig;
use crate::history::{Direction, HistoryError, HistoryManager};
use crate::mirror::{FileMirror, MirrorOrder, ModelMirror};
use crate::model::document::{FormatError, SchemaDocument};
use crate::model::project::Project;
use crate::repo::project_repo::{
    validated_slug, FsProjectRepository, ProjectRepository, RepoError,
};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PROJECT_NAME: &str = "Untitled Project";
const DEFAULT_ASSISTANT_TIMEOUT: Duration = Duration::from_secs(120);

pub type SessionResult<T> = Result<T, SessionError>;

/// How a surfaced condition should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Nothing changed, or the change succeeded with a caveat.
    Warning,
    /// The attempted operation was aborted.
    Error,
}

/// User-visible message raised without failing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    /// The operation needs an open project.
    NoActiveProject,
    /// A generated document could not be parsed.
    Format(FormatError),
    Repo(RepoError),
    History(HistoryError),
    Assistant(AssistantError),
}

impl SessionError {
    /// Boundary, no-change and busy conditions are warnings; the rest abort.
    pub fn severity(&self) -> Severity {
        match self {
            Self::History(HistoryError::AtBoundary(_))
            | Self::Repo(RepoError::NoChange)
            | Self::Assistant(AssistantError::Busy(_)) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveProject => write!(f, "no project is open"),
            Self::Format(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::History(err) => write!(f, "{err}"),
            Self::Assistant(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoActiveProject => None,
            Self::Format(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::History(err) => Some(err),
            Self::Assistant(err) => Some(err),
        }
    }
}

impl From<FormatError> for SessionError {
    fn from(value: FormatError) -> Self {
        Self::Format(value)
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<HistoryError> for SessionError {
    fn from(value: HistoryError) -> Self {
        Self::History(value)
    }
}

impl From<AssistantError> for SessionError {
    fn from(value: AssistantError) -> Self {
        Self::Assistant(value)
    }
}

/// One user's editing session.
pub struct SessionController<R: ProjectRepository, M: ModelMirror> {
    store: R,
    mirror: M,
    mirror_order: MirrorOrder,
    history: HistoryManager,
    active: Option<Project>,
    bookmark: Option<String>,
    notices: Vec<Notice>,
    assistant: Option<Arc<dyn SchemaAssistant>>,
    assistant_timeout: Duration,
    in_flight: Arc<InFlightGuard>,
}

impl SessionController<FsProjectRepository, FileMirror> {
    /// File-backed session using the configured directories and timeouts.
    pub fn from_config(config: &WorkspaceConfig) -> Self {
        Self::new(
            FsProjectRepository::new(config.projects_dir.clone()),
            FileMirror::new(config.mirror_path.clone()),
        )
        .with_mirror_order(config.mirror_order)
        .with_assistant_timeout(config.assistant_timeout)
    }
}

impl<R: ProjectRepository, M: ModelMirror> SessionController<R, M> {
    pub fn new(store: R, mirror: M) -> Self {
        Self {
            store,
            mirror,
            mirror_order: MirrorOrder::default(),
            history: HistoryManager::new(),
            active: None,
            bookmark: None,
            notices: Vec::new(),
            assistant: None,
            assistant_timeout: DEFAULT_ASSISTANT_TIMEOUT,
            in_flight: InFlightGuard::new(),
        }
    }

    pub fn with_mirror_order(mut self, order: MirrorOrder) -> Self {
        self.mirror_order = order;
        self
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn SchemaAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn with_assistant_timeout(mut self, timeout: Duration) -> Self {
        self.assistant_timeout = timeout;
        self
    }

    pub fn active(&self) -> Option<&Project> {
        self.active.as_ref()
    }

    /// Display name to echo in the restore parameter, if any.
    pub fn bookmark(&self) -> Option<&str> {
        self.bookmark.as_deref()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn mirror(&self) -> &M {
        &self.mirror
    }

    /// Slot shared with anything that must observe in-flight assistant calls.
    pub fn in_flight(&self) -> Arc<InFlightGuard> {
        Arc::clone(&self.in_flight)
    }

    /// Drains notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn list_projects(&self) -> SessionResult<Vec<String>> {
        Ok(self.store.list()?)
    }

    /// Opens a blank project.
    ///
    /// A missing or blank `name` picks the first free `Untitled Project[ N]`.
    pub fn create_project(&mut self, name: Option<&str>) -> SessionResult<&Project> {
        let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => self.default_project_name()?,
        };
        let slug = validated_slug(&name)?;
        if self.store.exists(&name)? {
            self.notices.push(Notice::warning(format!(
                "a saved project `{slug}` already exists; saving will replace it"
            )));
        }

        let project = Project::blank(name);
        self.activate(project)?;
        info!("event=project_create module=session status=ok slug={slug}");
        self.active_project()
    }

    /// Opens a persisted project, replacing the active one.
    pub fn load_project(&mut self, name: &str) -> SessionResult<&Project> {
        let project = self.store.load(name)?;
        let slug = project.slug();
        let entities = project.document.entity_count();
        self.activate(project)?;
        info!("event=project_open module=session status=ok slug={slug} entities={entities}");
        self.active_project()
    }

    /// Reopens the bookmarked project on startup.
    ///
    /// Does nothing when a project is already open or `name` is absent. When
    /// the load fails the bookmark is cleared so the next start does not retry.
    pub fn restore_from_bookmark(&mut self, name: Option<&str>) -> SessionResult<Option<&Project>> {
        let name = match name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) if self.active.is_none() => name,
            _ => return Ok(None),
        };

        self.bookmark = Some(name.to_string());
        let outcome = self.load_project(name).map(|_| ());
        if let Err(err) = outcome {
            warn!("event=bookmark_restore module=session status=error error={err}");
            self.bookmark = None;
            self.notices.push(Notice::error(format!(
                "could not reopen `{name}`: {err}"
            )));
            return Err(err);
        }
        Ok(self.active.as_ref())
    }

    /// Steps back one history entry.
    pub fn undo(&mut self) -> SessionResult<&Project> {
        self.step(Direction::Undo)
    }

    /// Steps forward one history entry.
    pub fn redo(&mut self) -> SessionResult<&Project> {
        self.step(Direction::Redo)
    }

    /// Renames the active project and its persisted file.
    pub fn rename_project(&mut self, new_name: &str) -> SessionResult<&Project> {
        let project = self.active.as_mut().ok_or(SessionError::NoActiveProject)?;
        self.store.rename(project, new_name)?;
        self.bookmark = Some(project.name.clone());
        self.history.record(project)?;
        self.active_project()
    }

    /// Replaces the active document with assistant output and records it.
    ///
    /// # Errors
    /// - [`SessionError::Format`] when no document can be extracted; nothing
    ///   changes in that case.
    pub fn apply_generated_document(&mut self, reply: &str) -> SessionResult<&Project> {
        let document = extract_document(reply)?;
        self.commit_document(document, false)?;
        self.active_project()
    }

    /// Replaces the active document and records it.
    pub fn apply_document(&mut self, document: SchemaDocument) -> SessionResult<&Project> {
        self.commit_document(document, false)?;
        self.active_project()
    }

    /// Persists the active project under its slug.
    pub fn save(&mut self) -> SessionResult<()> {
        let project = self.active.as_ref().ok_or(SessionError::NoActiveProject)?;
        self.store.save(project)?;
        Ok(())
    }

    /// Deletes a persisted project; the active project stays open in memory.
    pub fn delete_project(&mut self, name: &str) -> SessionResult<()> {
        self.store.delete(name)?;
        Ok(())
    }

    /// Asks the assistant for a new document, then applies and saves it.
    ///
    /// Rejected with [`AssistantError::Busy`] while another assistant call is
    /// in flight, including a timed-out call whose worker is still running.
    /// Timeouts, service failures and unusable replies leave the session
    /// untouched.
    pub fn generate(
        &mut self,
        prompt: &str,
        reference_files: Vec<Attachment>,
        schema_files: Vec<Attachment>,
    ) -> SessionResult<&Project> {
        let current = self.active_project()?.document.clone();
        let assistant = self.assistant()?;
        let ticket = self.in_flight.try_acquire(Operation::Generate)?;

        let request = GenerationRequest {
            prompt: prompt.to_string(),
            current_document: current,
            reference_files,
            schema_files,
        };
        info!(
            "event=generate module=session status=start references={} schemas={}",
            request.reference_files.len(),
            request.schema_files.len()
        );
        let reply = run_with_timeout(self.assistant_timeout, ticket, move || {
            assistant.generate_schema(&request)
        })?;
        let document = extract_document(&reply).map_err(AssistantError::Format)?;

        self.commit_document(document, true)?;
        self.active_project()
    }

    /// Asks the assistant for DDL of the active document.
    pub fn export_ddl(&mut self, dialect: DdlDialect) -> SessionResult<ExportArtifact> {
        let document = self.active_project()?.document.clone();
        let assistant = self.assistant()?;
        let ticket = self.in_flight.try_acquire(Operation::ExportDdl)?;

        let reply = run_with_timeout(self.assistant_timeout, ticket, move || {
            assistant.export_ddl(dialect, &document)
        })?;
        let ddl = extract_code(&reply, ddl_fence_languages(dialect));
        if ddl.is_empty() {
            return Err(AssistantError::Service("assistant returned empty DDL".to_string()).into());
        }
        let artifact = ddl_artifact(dialect, &ddl, chrono::Local::now().naive_local());
        info!(
            "event=export_ddl module=session status=ok dialect={} bytes={}",
            dialect.file_token(),
            artifact.bytes.len()
        );
        Ok(artifact)
    }

    /// Asks the assistant for documentation and packages it as `.docx`.
    pub fn export_documentation(&mut self) -> SessionResult<ExportArtifact> {
        let document = self.active_project()?.document.clone();
        let assistant = self.assistant()?;
        let ticket = self.in_flight.try_acquire(Operation::ExportDocumentation)?;

        let text = run_with_timeout(self.assistant_timeout, ticket, move || {
            assistant.write_documentation(&document)
        })?;
        if text.trim().is_empty() {
            return Err(
                AssistantError::Service("assistant returned empty documentation".to_string()).into(),
            );
        }
        let artifact = documentation_artifact(&text, chrono::Local::now().naive_local())?;
        info!(
            "event=export_documentation module=session status=ok bytes={}",
            artifact.bytes.len()
        );
        Ok(artifact)
    }

    fn active_project(&self) -> SessionResult<&Project> {
        self.active.as_ref().ok_or(SessionError::NoActiveProject)
    }

    fn assistant(&self) -> SessionResult<Arc<dyn SchemaAssistant>> {
        self.assistant
            .clone()
            .ok_or(SessionError::Assistant(AssistantError::NotConfigured))
    }

    fn default_project_name(&self) -> SessionResult<String> {
        if !self.store.exists(DEFAULT_PROJECT_NAME)? {
            return Ok(DEFAULT_PROJECT_NAME.to_string());
        }
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{DEFAULT_PROJECT_NAME} {suffix}");
            if !self.store.exists(&candidate)? {
                return Ok(candidate);
            }
            suffix += 1;
        }
    }

    /// Makes `project` active with a fresh single-entry history.
    fn activate(&mut self, project: Project) -> SessionResult<()> {
        let mut history = HistoryManager::new();
        history.record(&project)?;

        self.bookmark = Some(project.name.clone());
        self.sync_mirror(&project.document);
        self.active = Some(project);
        self.history = history;
        Ok(())
    }

    fn step(&mut self, direction: Direction) -> SessionResult<&Project> {
        let target = match self.history.peek(direction) {
            Ok(target) => target,
            Err(err) => {
                if matches!(err, HistoryError::AtBoundary(_)) {
                    warn!("event=history_step module=session status=warn reason=at_boundary direction={direction}");
                }
                return Err(err.into());
            }
        };
        self.follow_rename(&target)?;

        if self.mirror_order == MirrorOrder::BeforeTransition {
            if let Some(project) = self.active.take() {
                self.sync_mirror(&project.document);
                self.active = Some(project);
            }
        }

        let project = match direction {
            Direction::Undo => self.history.undo()?,
            Direction::Redo => self.history.redo()?,
        };
        if self.mirror_order == MirrorOrder::AfterTransition {
            self.sync_mirror(&project.document);
        }
        self.bookmark = Some(project.name.clone());
        self.active = Some(project);
        self.active_project()
    }

    /// Moves the persisted file to `target`'s slug when a history step
    /// crosses a rename.
    fn follow_rename(&mut self, target: &Project) -> SessionResult<()> {
        let mut moving = match self.active.as_ref() {
            Some(current) if current.slug() != target.slug() => current.clone(),
            _ => return Ok(()),
        };
        self.store.rename(&mut moving, &target.name)?;
        Ok(())
    }

    /// Records `document` as the next state of the active project.
    ///
    /// With `persist`, the store write happens first so a failed save leaves
    /// memory untouched.
    fn commit_document(&mut self, document: SchemaDocument, persist: bool) -> SessionResult<()> {
        let mut next = self.active_project()?.clone();
        next.document = document;
        if persist {
            self.store.save(&next)?;
        }
        self.history.record(&next)?;
        self.sync_mirror(&next.document);
        info!(
            "event=document_apply module=session status=ok slug={} entities={} relationships={} history_len={}",
            next.slug(),
            next.document.entity_count(),
            next.document.relationship_count(),
            self.history.len()
        );
        self.active = Some(next);
        Ok(())
    }

    fn sync_mirror(&mut self, document: &SchemaDocument) {
        if let Err(err) = self.mirror.sync(document) {
            self.notices.push(Notice::warning(err.to_string()));
        }
    }
}

fn ddl_fence_languages(dialect: DdlDialect) -> &'static [&'static str] {
    match dialect {
        DdlDialect::MongoDb => &["javascript", "js", "json", "mongodb"],
        _ => &["sql", "plsql", "tsql"],
    }
}

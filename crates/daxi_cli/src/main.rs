//! `daxi` command-line entry point.
//!
//! # Responsibility
//! - Map subcommands onto one session per process.
//! - Carry the restore bookmark between runs in a small text file.
//! - Print notices as `warning:`/`error:` lines; exit 1 on error.

use clap::{Parser, Subcommand};
use daxi_core::assistant::http::{AssistantConfig, HttpAssistant};
use daxi_core::{
    init_logging, slugify, Attachment, AssistantError, ConfigError, DdlDialect, FileMirror,
    FsProjectRepository, Notice, Project, SessionController, SessionError, Severity,
    WorkspaceConfig,
};
use log::info;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

type Session = SessionController<FsProjectRepository, FileMirror>;

#[derive(Parser, Debug)]
#[command(name = "daxi", version, about = "Schema diagram projects from the terminal")]
struct Cli {
    /// Directory holding `<slug>.json` project files.
    #[arg(long, global = true)]
    projects_dir: Option<PathBuf>,
    /// File the diagram renderer reads the current model from.
    #[arg(long, global = true)]
    mirror_path: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List saved project slugs.
    List,
    /// Create and save a blank project.
    Create { name: Option<String> },
    /// Print a project's document; the bookmarked project by default.
    Show { name: Option<String> },
    /// Rename a saved project.
    Rename { old: String, new: String },
    /// Delete a saved project.
    Delete { name: String },
    /// Reopen the bookmarked project.
    Restore,
    /// Ask the assistant to rework a project's schema.
    Generate {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        project: Option<String>,
        /// Reference document passed to the assistant; repeatable.
        #[arg(long = "reference")]
        references: Vec<PathBuf>,
        /// Legacy schema file passed to the assistant; repeatable.
        #[arg(long = "schema")]
        schemas: Vec<PathBuf>,
    },
    /// Export DDL for a database dialect.
    ExportDdl {
        #[arg(long)]
        dialect: DdlDialect,
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Export documentation as a Word document.
    ExportDocs {
        #[arg(long)]
        project: Option<String>,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

impl Command {
    fn needs_assistant(&self) -> bool {
        matches!(
            self,
            Self::Generate { .. } | Self::ExportDdl { .. } | Self::ExportDocs { .. }
        )
    }
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Session(SessionError),
    Io { path: PathBuf, source: std::io::Error },
    Usage(String),
}

impl CliError {
    fn severity(&self) -> Severity {
        match self {
            Self::Session(err) => err.severity(),
            _ => Severity::Error,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Session(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Usage(message) => f.write_str(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<SessionError> for CliError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl From<AssistantError> for CliError {
    fn from(value: AssistantError) -> Self {
        Self::Session(SessionError::Assistant(value))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match workspace_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    start_logging(&config);

    let mut session = match build_session(&config, &cli.command) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let outcome = run(&mut session, &config, cli.command);

    let notices = session.take_notices();
    print_notices(&notices);
    if let Some(bookmark) = session.bookmark() {
        if let Err(err) = store_bookmark(&config.bookmark_path, Some(bookmark)) {
            eprintln!("warning: {err}");
        }
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.severity() == Severity::Warning => {
            eprintln!("warning: {err}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let already_reported = notices
                .iter()
                .any(|notice| notice.severity == Severity::Error);
            if !already_reported {
                eprintln!("error: {err}");
            }
            ExitCode::FAILURE
        }
    }
}

fn workspace_config(cli: &Cli) -> Result<WorkspaceConfig, ConfigError> {
    let mut config = WorkspaceConfig::from_env()?;
    if let Some(dir) = &cli.projects_dir {
        config.projects_dir = dir.clone();
    }
    if let Some(path) = &cli.mirror_path {
        config.mirror_path = path.clone();
    }
    Ok(config)
}

fn start_logging(config: &WorkspaceConfig) {
    let log_dir = if config.log_dir.is_absolute() {
        config.log_dir.clone()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(&config.log_dir),
            Err(err) => {
                eprintln!("warning: logging disabled: {err}");
                return;
            }
        }
    };
    if let Err(err) = init_logging(&config.log_level, &log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}

/// File-backed session; assistant commands also get the hosted assistant.
fn build_session(config: &WorkspaceConfig, command: &Command) -> Result<Session, CliError> {
    let session = SessionController::from_config(config);
    if !command.needs_assistant() {
        return Ok(session);
    }
    let mut assistant_config = AssistantConfig::from_env()?;
    assistant_config.timeout = config.assistant_timeout;
    let assistant = HttpAssistant::new(assistant_config)?;
    Ok(session.with_assistant(Arc::new(assistant)))
}

fn run(session: &mut Session, config: &WorkspaceConfig, command: Command) -> Result<(), CliError> {
    let saved = read_bookmark(&config.bookmark_path)?;
    let bookmark = Bookmark {
        name: saved.as_deref(),
        path: &config.bookmark_path,
    };

    match command {
        Command::List => {
            for slug in session.list_projects()? {
                println!("{slug}");
            }
        }
        Command::Create { name } => {
            let project = session.create_project(name.as_deref())?;
            let (name, slug) = (project.name.clone(), project.slug());
            session.save()?;
            println!("created `{name}` ({slug}.json)");
        }
        Command::Show { name } => {
            open_project(session, name.as_deref(), &bookmark)?;
            if let Some(project) = session.active() {
                println!("{}", project.document.serialize());
            }
        }
        Command::Rename { old, new } => {
            session.load_project(&old)?;
            let renamed = session.rename_project(&new)?;
            println!("renamed `{old}` to `{}` ({}.json)", renamed.name, renamed.slug());
        }
        Command::Delete { name } => {
            session.delete_project(&name)?;
            if bookmark.name.map(slugify) == Some(slugify(&name)) {
                bookmark.clear()?;
            }
            println!("deleted `{name}`");
        }
        Command::Restore => match bookmark.restore(session)? {
            Some(project) => println!("restored `{}`", project.name),
            None => println!("no bookmark to restore"),
        },
        Command::Generate {
            prompt,
            project,
            references,
            schemas,
        } => {
            open_project(session, project.as_deref(), &bookmark)?;
            let reference_files = read_attachments(&references)?;
            let schema_files = read_attachments(&schemas)?;
            let project = session.generate(&prompt, reference_files, schema_files)?;
            println!(
                "generated `{}`: {} entities, {} relationships",
                project.name,
                project.document.entity_count(),
                project.document.relationship_count()
            );
        }
        Command::ExportDdl {
            dialect,
            project,
            out,
        } => {
            open_project(session, project.as_deref(), &bookmark)?;
            let artifact = session.export_ddl(dialect)?;
            let path = artifact
                .write_to(&out)
                .map_err(|source| CliError::Io { path: out.clone(), source })?;
            println!("{}", path.display());
        }
        Command::ExportDocs { project, out } => {
            open_project(session, project.as_deref(), &bookmark)?;
            let artifact = session.export_documentation()?;
            let path = artifact
                .write_to(&out)
                .map_err(|source| CliError::Io { path: out.clone(), source })?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Bookmark read at startup and the file it came from.
struct Bookmark<'a> {
    name: Option<&'a str>,
    path: &'a Path,
}

impl Bookmark<'_> {
    /// Restores the bookmarked project; a failed restore also removes the file.
    fn restore<'s>(&self, session: &'s mut Session) -> Result<Option<&'s Project>, CliError> {
        match session.restore_from_bookmark(self.name) {
            Ok(project) => Ok(project),
            Err(err) => {
                self.clear()?;
                Err(err.into())
            }
        }
    }

    fn clear(&self) -> Result<(), CliError> {
        store_bookmark(self.path, None)
    }
}

/// Loads `name`, or falls back to the bookmarked project.
fn open_project(session: &mut Session, name: Option<&str>, bookmark: &Bookmark<'_>) -> Result<(), CliError> {
    if let Some(name) = name {
        session.load_project(name)?;
        return Ok(());
    }
    match bookmark.restore(session)? {
        Some(project) => {
            info!("event=cli_open module=cli status=ok source=bookmark slug={}", project.slug());
            Ok(())
        }
        None => Err(CliError::Usage(
            "no project given and nothing bookmarked; pass a project name".to_string(),
        )),
    }
}

fn read_attachments(paths: &[PathBuf]) -> Result<Vec<Attachment>, CliError> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path).map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(Attachment::new(file_name, bytes, mime_type_for(path)))
        })
        .collect()
}

fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "sql" | "ddl" => "application/sql",
        "xml" => "application/xml",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => "application/octet-stream",
    }
}

fn read_bookmark(path: &Path) -> Result<Option<String>, CliError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let name = text.trim();
            Ok((!name.is_empty()).then(|| name.to_string()))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(CliError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes the bookmark, or removes the file when there is none.
fn store_bookmark(path: &Path, bookmark: Option<&str>) -> Result<(), CliError> {
    let io_error = |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    };
    match bookmark {
        Some(name) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }
            std::fs::write(path, format!("{name}\n")).map_err(io_error)
        }
        None => match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(io_error(source)),
        },
    }
}

fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice.severity {
            Severity::Warning => eprintln!("warning: {}", notice.message),
            Severity::Error => eprintln!("error: {}", notice.message),
        }
    }
}

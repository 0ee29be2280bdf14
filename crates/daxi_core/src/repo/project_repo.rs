//! Project repository contracts and file-system implementation.
//!
//! # Responsibility
//! - Map project names to persisted documents (`{slug}.json`).
//! - List, load, save, rename and delete persisted projects.
//!
//! # Invariants
//! - At most one file per slug; files hold the document only.
//! - Rename either moves the file completely or leaves it untouched.
//! - Any write invalidates the cached listing.

use crate::atomic_write::write_atomic;
use crate::model::document::{FormatError, SchemaDocument};
use crate::model::project::{slugify, Project};
use log::{error, info, warn};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

const PROJECT_FILE_EXTENSION: &str = "json";

pub type RepoResult<T> = Result<T, RepoError>;

/// Project store error.
#[derive(Debug)]
pub enum RepoError {
    /// No persisted file matches the slug.
    NotFound(String),
    /// Persisted content is not a well-formed document.
    Format { slug: String, source: FormatError },
    /// Rename target is empty or equal to the current name.
    NoChange,
    /// Name cannot be mapped to a file inside the store.
    InvalidName(String),
    /// Rename target slug is already persisted by another project.
    AlreadyExists(String),
    Io { path: PathBuf, source: io::Error },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(slug) => write!(f, "project not found: {slug}"),
            Self::Format { slug, source } => write!(f, "project `{slug}`: {source}"),
            Self::NoChange => write!(f, "new project name is empty or unchanged"),
            Self::InvalidName(name) => write!(f, "invalid project name: `{name}`"),
            Self::AlreadyExists(slug) => write!(f, "project already exists: {slug}"),
            Self::Io { path, source } => write!(f, "I/O error at `{}`: {source}", path.display()),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Format { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Durable name-to-document mapping.
pub trait ProjectRepository {
    /// Persisted project slugs, sorted lexicographically.
    fn list(&self) -> RepoResult<Vec<String>>;
    fn exists(&self, name: &str) -> RepoResult<bool>;
    /// Reads the document for `name` into a fresh project named `name`
    /// (trimmed).
    fn load(&self, name: &str) -> RepoResult<Project>;
    /// Fully replaces the persisted document for `project.name`.
    fn save(&mut self, project: &Project) -> RepoResult<()>;
    /// Moves the persisted file to the slug of `new_name` and renames `project`.
    ///
    /// `project.name` is only updated when the move succeeded.
    fn rename(&mut self, project: &mut Project, new_name: &str) -> RepoResult<()>;
    fn delete(&mut self, name: &str) -> RepoResult<()>;
}

/// Directory of `{slug}.json` documents.
pub struct FsProjectRepository {
    root: PathBuf,
    listing: RefCell<Option<Vec<String>>>,
}

impl FsProjectRepository {
    /// Uses `root` as the projects directory; it is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            listing: RefCell::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the persisted file for `name`.
    pub fn path_for(&self, name: &str) -> RepoResult<PathBuf> {
        let slug = validated_slug(name)?;
        Ok(self.slug_path(&slug))
    }

    fn slug_path(&self, slug: &str) -> PathBuf {
        self.root.join(format!("{slug}.{PROJECT_FILE_EXTENSION}"))
    }

    fn invalidate_listing(&self) {
        self.listing.replace(None);
    }

    fn scan(&self) -> RepoResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&self.root, err)),
        };

        let mut slugs = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| io_error(&self.root, err))?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(PROJECT_FILE_EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(stem) => slugs.push(stem.to_string()),
                None => warn!(
                    "event=project_list module=repo status=warn reason=non_utf8_file_name path={}",
                    path.display()
                ),
            }
        }
        slugs.sort();
        Ok(slugs)
    }
}

impl ProjectRepository for FsProjectRepository {
    fn list(&self) -> RepoResult<Vec<String>> {
        if let Some(cached) = self.listing.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let slugs = self.scan()?;
        self.listing.replace(Some(slugs.clone()));
        Ok(slugs)
    }

    fn exists(&self, name: &str) -> RepoResult<bool> {
        Ok(self.path_for(name)?.is_file())
    }

    fn load(&self, name: &str) -> RepoResult<Project> {
        let started_at = Instant::now();
        let name = name.trim();
        let slug = validated_slug(name)?;
        let path = self.slug_path(&slug);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("event=project_load module=repo status=error error_code=not_found slug={slug}");
                return Err(RepoError::NotFound(slug));
            }
            Err(err) => {
                error!("event=project_load module=repo status=error error_code=io slug={slug} error={err}");
                return Err(io_error(&path, err));
            }
        };

        let document = SchemaDocument::parse(&text).map_err(|source| {
            error!(
                "event=project_load module=repo status=error error_code=format slug={slug} line={} column={}",
                source.line(),
                source.column()
            );
            RepoError::Format {
                slug: slug.clone(),
                source,
            }
        })?;

        info!(
            "event=project_load module=repo status=ok slug={slug} bytes={} duration_ms={}",
            text.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Project::new(name, document))
    }

    fn save(&mut self, project: &Project) -> RepoResult<()> {
        let started_at = Instant::now();
        let slug = validated_slug(&project.name)?;
        let path = self.slug_path(&slug);
        let text = project.document.serialize();

        let result = write_atomic(&path, text.as_bytes());
        self.invalidate_listing();
        if let Err(err) = result {
            error!("event=project_save module=repo status=error slug={slug} error={err}");
            return Err(io_error(&path, err));
        }

        info!(
            "event=project_save module=repo status=ok slug={slug} bytes={} duration_ms={}",
            text.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn rename(&mut self, project: &mut Project, new_name: &str) -> RepoResult<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() || new_name == project.name {
            return Err(RepoError::NoChange);
        }

        let old_slug = validated_slug(&project.name)?;
        let new_slug = validated_slug(new_name)?;
        if old_slug == new_slug {
            project.name = new_name.to_string();
            info!("event=project_rename module=repo status=ok slug={new_slug} moved=false");
            return Ok(());
        }

        let old_path = self.slug_path(&old_slug);
        let new_path = self.slug_path(&new_slug);
        if new_path.exists() {
            warn!(
                "event=project_rename module=repo status=error error_code=already_exists from={old_slug} to={new_slug}"
            );
            return Err(RepoError::AlreadyExists(new_slug));
        }

        let moved = old_path.is_file();
        if moved {
            if let Err(err) = fs::rename(&old_path, &new_path) {
                error!(
                    "event=project_rename module=repo status=error error_code=io from={old_slug} to={new_slug} error={err}"
                );
                return Err(io_error(&old_path, err));
            }
            self.invalidate_listing();
        }

        project.name = new_name.to_string();
        info!("event=project_rename module=repo status=ok from={old_slug} to={new_slug} moved={moved}");
        Ok(())
    }

    fn delete(&mut self, name: &str) -> RepoResult<()> {
        let slug = validated_slug(name)?;
        let path = self.slug_path(&slug);
        match fs::remove_file(&path) {
            Ok(()) => {
                self.invalidate_listing();
                info!("event=project_delete module=repo status=ok slug={slug}");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(RepoError::NotFound(slug)),
            Err(err) => Err(io_error(&path, err)),
        }
    }
}

/// Derives the slug for `name`, rejecting names that escape the store.
pub fn validated_slug(name: &str) -> RepoResult<String> {
    let slug = slugify(name.trim());
    let escapes = slug.is_empty()
        || slug == "."
        || slug == ".."
        || slug.contains(['/', '\\', '\0']);
    if escapes {
        return Err(RepoError::InvalidName(name.to_string()));
    }
    Ok(slug)
}

fn io_error(path: &Path, source: io::Error) -> RepoError {
    RepoError::Io {
        path: path.to_path_buf(),
        source,
    }
}

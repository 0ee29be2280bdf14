//! Current-model mirror consumed by the external diagram renderer.
//!
//! # Responsibility
//! - Write the active document (document only) to one well-known path.
//!
//! # Invariants
//! - Each write fully replaces the previous content.
//! - Write failures are reported to the caller, who treats them as warnings.

use crate::atomic_write::write_atomic;
use crate::model::document::SchemaDocument;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Conventional file name of the mirror.
pub const MIRROR_FILE_NAME: &str = "curr_model.json";

#[derive(Debug)]
pub struct MirrorError {
    pub path: PathBuf,
    pub source: io::Error,
}

impl Display for MirrorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to update current model at `{}`: {}",
            self.path.display(),
            self.source
        )
    }
}

impl Error for MirrorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// When undo/redo refresh the mirror relative to the history move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorOrder {
    /// Write the state being left, then move.
    #[default]
    BeforeTransition,
    /// Move, then write the state arrived at.
    AfterTransition,
}

impl FromStr for MirrorOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "before" | "before_transition" => Ok(Self::BeforeTransition),
            "after" | "after_transition" => Ok(Self::AfterTransition),
            other => Err(format!(
                "unsupported mirror order `{other}`; expected before|after"
            )),
        }
    }
}

/// Sink for the active document.
pub trait ModelMirror {
    fn sync(&self, document: &SchemaDocument) -> Result<(), MirrorError>;
}

/// Mirror backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct FileMirror {
    path: PathBuf,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ModelMirror for FileMirror {
    fn sync(&self, document: &SchemaDocument) -> Result<(), MirrorError> {
        let text = document.serialize();
        match write_atomic(&self.path, text.as_bytes()) {
            Ok(()) => {
                debug!(
                    "event=mirror_sync module=mirror status=ok bytes={} entities={}",
                    text.len(),
                    document.entity_count()
                );
                Ok(())
            }
            Err(source) => {
                warn!("event=mirror_sync module=mirror status=error error={source}");
                Err(MirrorError {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}

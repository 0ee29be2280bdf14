//! Downloadable export artifacts.
//!
//! # Responsibility
//! - Name DDL and documentation downloads with a timestamp.
//! - Package documentation text into a paginated `.docx` file.

use crate::assistant::{AssistantError, DdlDialect};
use chrono::NaiveDateTime;
use docx_rs::{BreakType, Docx, Paragraph, Run};
use std::io::Cursor;
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const SQL_MIME: &str = "application/sql";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// File offered to the user for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl ExportArtifact {
    /// Writes the artifact into `dir` under its file name.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// `{dialect}_ddl_{timestamp}.sql`
pub fn ddl_file_name(dialect: DdlDialect, at: NaiveDateTime) -> String {
    format!("{}_ddl_{}.sql", dialect.file_token(), at.format(TIMESTAMP_FORMAT))
}

/// `documentation_{timestamp}.docx`
pub fn documentation_file_name(at: NaiveDateTime) -> String {
    format!("documentation_{}.docx", at.format(TIMESTAMP_FORMAT))
}

pub fn ddl_artifact(dialect: DdlDialect, ddl: &str, at: NaiveDateTime) -> ExportArtifact {
    let mut bytes = ddl.trim_end().as_bytes().to_vec();
    bytes.push(b'\n');
    ExportArtifact {
        file_name: ddl_file_name(dialect, at),
        bytes,
        mime_type: SQL_MIME,
    }
}

pub fn documentation_artifact(text: &str, at: NaiveDateTime) -> Result<ExportArtifact, AssistantError> {
    Ok(ExportArtifact {
        file_name: documentation_file_name(at),
        bytes: render_docx(text)?,
        mime_type: DOCX_MIME,
    })
}

/// Renders markdown-ish text as a Word document.
///
/// Lines starting with `#` become headings; every level-1 heading after the
/// first starts a new page. Blank lines separate paragraphs.
pub fn render_docx(text: &str) -> Result<Vec<u8>, AssistantError> {
    let mut docx = Docx::new();
    let mut seen_top_heading = false;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let paragraph = match heading(line) {
            Some((level, title)) => {
                let mut paragraph = Paragraph::new();
                if level == 1 {
                    if seen_top_heading {
                        paragraph = paragraph.add_run(Run::new().add_break(BreakType::Page));
                    }
                    seen_top_heading = true;
                }
                paragraph.add_run(Run::new().add_text(title).bold().size(heading_size(level)))
            }
            None => Paragraph::new().add_run(Run::new().add_text(line)),
        };
        docx = docx.add_paragraph(paragraph);
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|err| AssistantError::Packaging(err.to_string()))?;
    Ok(buffer.into_inner())
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 {
        return None;
    }
    let title = line[level..].trim();
    if title.is_empty() {
        return None;
    }
    Some((level, title))
}

/// Half-points, as used by `w:sz`.
fn heading_size(level: usize) -> usize {
    match level {
        1 => 36,
        2 => 30,
        _ => 26,
    }
}

//! Recovery of structured content from raw model replies.
//!
//! Models often wrap output in markdown fences or add a sentence around it.
//! Extraction prefers, in order: the whole reply, the first fenced block,
//! then the outermost `{ ... }` span.

use crate::model::document::{FormatError, SchemaDocument};
use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)```").expect("valid fence regex")
});

/// Parses a schema document out of `reply`.
///
/// # Errors
/// - Returns the parse error of the whole reply when no candidate parses.
pub fn extract_document(reply: &str) -> Result<SchemaDocument, FormatError> {
    let trimmed = reply.trim();
    let whole = match SchemaDocument::parse(trimmed) {
        Ok(document) => return Ok(document),
        Err(err) => err,
    };

    for (_, body) in fenced_blocks(trimmed) {
        if let Ok(document) = SchemaDocument::parse(body.trim()) {
            return Ok(document);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(document) = SchemaDocument::parse(&trimmed[start..=end]) {
                return Ok(document);
            }
        }
    }

    Err(whole)
}

/// Body of the first fenced block tagged with one of `languages`, or of the
/// first untagged block; the trimmed reply when it has no fences.
pub fn extract_code(reply: &str, languages: &[&str]) -> String {
    let blocks = fenced_blocks(reply);
    let tagged = blocks.iter().find(|(lang, _)| {
        languages
            .iter()
            .any(|wanted| lang.eq_ignore_ascii_case(wanted))
    });
    let chosen = tagged.or_else(|| blocks.iter().find(|(lang, _)| lang.is_empty()));
    match chosen {
        Some((_, body)) => body.trim().to_string(),
        None => reply.trim().to_string(),
    }
}

fn fenced_blocks(reply: &str) -> Vec<(&str, &str)> {
    FENCED_BLOCK_RE
        .captures_iter(reply)
        .filter_map(|caps| {
            let lang = caps.get(1).map_or("", |m| m.as_str());
            caps.get(2).map(|body| (lang, body.as_str()))
        })
        .collect()
}

//! Marker grammar for multi-file text blobs.
//!
//! A blob is read line by line. Every line is either a MARKER, which opens
//! a new file, or a CONTENT line, which belongs to the most recently opened
//! file. A marker is a comment opener (`//`, `#`, `/*` or `<!--`), optional
//! whitespace, then `filename:` followed by the path:
//!
//! ```text
//! // filename: index.html
//! <!DOCTYPE html>
//! /* filename: css/styles.css */
//! body { margin: 0; }
//! <!-- filename: templates/about.html -->
//! ```
//!
//! Content before the first marker cannot be attributed to a file and is
//! dropped. A blob without any marker becomes a single `index.html`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::artifact::FileRecord;
use crate::{slog_debug, slog_warn, Error, Result};

/// Path used when a blob carries no marker at all.
pub const DEFAULT_PATH: &str = "index.html";

/// The keyword that follows a comment opener on a marker line.
pub const MARKER_KEYWORD: &str = "filename:";

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?://|/\*|<!--|#)\s*filename:(.*)$").unwrap()
});

/// Closers stripped from the end of a marker's path.
const CLOSERS: &[&str] = &["*/", "-->"];

/// One classified input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Opens a new file at the given path.
    Marker(&'a str),
    Content(&'a str),
}

/// Classify a single line (without its trailing `\n`).
pub fn classify_line(line: &str) -> Line<'_> {
    match MARKER_RE.captures(line).and_then(|c| c.get(1)) {
        Some(rest) => Line::Marker(strip_closers(rest.as_str())),
        None => Line::Content(line),
    }
}

fn strip_closers(raw: &str) -> &str {
    let mut path = raw.trim();
    while let Some(stripped) = CLOSERS.iter().find_map(|c| path.strip_suffix(c)) {
        path = stripped.trim_end();
    }
    path
}

/// Result of parsing a blob, with the ambiguities that were resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArtifact {
    /// Records in marker order; never empty.
    pub records: Vec<FileRecord>,
    /// Non-blank lines before the first marker that were discarded.
    pub dropped_lines: usize,
    /// Paths that appear on more than one marker, in first-seen order.
    pub duplicates: Vec<String>,
    /// True when no marker was found and the whole blob became `index.html`.
    pub fallback: bool,
}

/// Split a generated blob into file records.
///
/// Never fails and always returns at least one record.
pub fn parse_artifact(blob: &str) -> Vec<FileRecord> {
    parse_artifact_detailed(blob).records
}

/// [`parse_artifact`] plus diagnostics about dropped and duplicated input.
pub fn parse_artifact_detailed(blob: &str) -> ParsedArtifact {
    let mut records = Vec::new();
    let mut current: Option<&str> = None;
    let mut buffer: Vec<&str> = Vec::new();
    let mut dropped_lines = 0;

    for line in blob.split('\n') {
        match classify_line(line) {
            Line::Marker(path) => {
                if let Some(open) = current.take() {
                    records.push(FileRecord::new(open, buffer.join("\n")));
                    buffer.clear();
                }
                slog_debug!("Marker for {}", path);
                current = Some(path);
            }
            Line::Content(text) => {
                if current.is_some() {
                    buffer.push(text);
                } else if !text.trim().is_empty() {
                    dropped_lines += 1;
                }
            }
        }
    }
    if let Some(open) = current {
        records.push(FileRecord::new(open, buffer.join("\n")));
    }

    if records.is_empty() {
        slog_debug!("No file markers found, treating blob as {}", DEFAULT_PATH);
        return ParsedArtifact {
            records: vec![FileRecord::new(DEFAULT_PATH, blob)],
            dropped_lines: 0,
            duplicates: Vec::new(),
            fallback: true,
        };
    }

    if dropped_lines > 0 {
        slog_warn!(
            "Dropped {} line(s) before the first file marker",
            dropped_lines
        );
    }

    let duplicates = duplicate_paths(&records);
    for path in &duplicates {
        slog_warn!("Path {} appears more than once in the artifact", path);
    }

    ParsedArtifact {
        records,
        dropped_lines,
        duplicates,
        fallback: false,
    }
}

fn duplicate_paths(records: &[FileRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for record in records {
        if !seen.insert(record.path.as_str()) && !duplicates.contains(&record.path) {
            duplicates.push(record.path.clone());
        }
    }
    duplicates
}

/// Encode records as a marker-delimited blob.
///
/// The output parses back to exactly `records`. An empty list is rejected
/// with [`Error::Validation`], since every blob parses to at least one
/// record. Paths that the grammar cannot carry are rejected with
/// [`Error::UnencodablePath`]: empty paths, paths with surrounding
/// whitespace or line breaks, paths containing
/// `filename:` and paths ending in a comment closer. Content with a line
/// that would read as a marker is rejected with [`Error::Validation`].
pub fn format_artifact(records: &[FileRecord]) -> Result<String> {
    if records.is_empty() {
        return Err(Error::Validation(
            "cannot encode an empty record list".to_string(),
        ));
    }
    let mut blocks = Vec::with_capacity(records.len());
    for record in records {
        validate_path(&record.path)?;
        if let Some(n) = record
            .content
            .split('\n')
            .position(|line| matches!(classify_line(line), Line::Marker(_)))
        {
            return Err(Error::Validation(format!(
                "content of {} has a file marker on line {}",
                record.path,
                n + 1
            )));
        }
        blocks.push(format!("// {} {}\n{}", MARKER_KEYWORD, record.path, record.content));
    }
    Ok(blocks.join("\n"))
}

fn validate_path(path: &str) -> Result<()> {
    let unencodable = path.is_empty()
        || path.trim() != path
        || path.contains(['\n', '\r'])
        || path.contains(MARKER_KEYWORD)
        || CLOSERS.iter().any(|c| path.ends_with(c));
    if unencodable {
        return Err(Error::UnencodablePath(path.to_string()));
    }
    Ok(())
}

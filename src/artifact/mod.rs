//! Generated artifacts: multi-file text blobs and the file records they
//! contain.

pub mod parser;

use serde::{Deserialize, Serialize};

pub use parser::{
    classify_line, format_artifact, parse_artifact, parse_artifact_detailed, Line,
    ParsedArtifact, DEFAULT_PATH,
};

/// One virtual file extracted from a generated blob.
///
/// `path` is relative and `/`-separated. Content is kept verbatim; the
/// deployment router trims it when writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
}

impl FileRecord {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

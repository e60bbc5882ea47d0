//! Conventional layout of a deployed site.
//!
//! The target runtime expects HTML under `templates/`, stylesheets,
//! scripts and images under `static/`, and the `app.py` entry point plus
//! other files at the top level. [`classify`] decides where a record goes
//! without touching the filesystem.

use std::path::Path;

use crate::{Error, Result};

pub const STATIC_DIR: &str = "static";
pub const TEMPLATES_DIR: &str = "templates";

/// Reserved top-level entry point of the deployed application.
pub const ENTRY_POINT: &str = "app.py";

/// Dependency manifest expected at the root of a deployed site.
pub const MANIFEST_FILE: &str = "requirements.txt";

/// Contents written when a deployment has no manifest of its own.
pub const DEFAULT_MANIFEST: &str = "flask\n";

const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "svg", "png", "jpg", "jpeg", "gif", "webp", "ico", "avif", "bmp",
];

/// Where a record lands, in rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Already under `static/` or `templates/`; kept as is.
    Conventional,
    /// The reserved entry point; written at the root.
    EntryPoint,
    /// HTML page; moved under `templates/`.
    Template,
    /// Stylesheet, script or image; moved under `static/`.
    StaticAsset,
    /// Anything else; written at the root as is.
    TopLevel,
}

impl Placement {
    /// Directory prepended to the record path, if any.
    pub fn subtree(&self) -> Option<&'static str> {
        match self {
            Placement::Template => Some(TEMPLATES_DIR),
            Placement::StaticAsset => Some(STATIC_DIR),
            Placement::Conventional | Placement::EntryPoint | Placement::TopLevel => None,
        }
    }

    /// Root-relative target for a normalized `path`.
    pub fn target(&self, path: &str) -> String {
        match self.subtree() {
            Some(dir) => format!("{}/{}", dir, path),
            None => path.to_string(),
        }
    }
}

/// Classify a normalized path. The first matching rule wins:
///
/// 1. `static/...` or `templates/...` → [`Placement::Conventional`]
/// 2. exactly `app.py` → [`Placement::EntryPoint`]
/// 3. `.html` / `.htm` → [`Placement::Template`]
/// 4. stylesheet, script or image extension → [`Placement::StaticAsset`]
/// 5. otherwise → [`Placement::TopLevel`]
pub fn classify(path: &str) -> Placement {
    let conventional = [STATIC_DIR, TEMPLATES_DIR]
        .iter()
        .any(|dir| path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/')));
    if conventional {
        return Placement::Conventional;
    }
    if path == ENTRY_POINT {
        return Placement::EntryPoint;
    }

    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some(ext) if HTML_EXTENSIONS.contains(&ext) => Placement::Template,
        Some(ext) if STATIC_EXTENSIONS.contains(&ext) => Placement::StaticAsset,
        _ => Placement::TopLevel,
    }
}

/// Normalize a record path into a safe relative `/`-separated path.
///
/// Backslashes become `/`, leading slashes and empty or `.` segments are
/// dropped, so `/css/a.css` is read relative to the root. Empty paths fail
/// with [`Error::MissingPath`]; `..` segments and drive or scheme prefixes
/// fail with [`Error::UnsafePath`].
pub fn normalize(path: &str) -> Result<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(Error::MissingPath);
    }
    let unified = trimmed.replace('\\', "/");

    let mut segments = Vec::new();
    for segment in unified.trim_start_matches('/').split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(Error::UnsafePath {
                    path: path.to_string(),
                    reason: "parent directory reference",
                })
            }
            s if s.contains(':') => {
                return Err(Error::UnsafePath {
                    path: path.to_string(),
                    reason: "drive or scheme prefix",
                })
            }
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return Err(Error::UnsafePath {
            path: path.to_string(),
            reason: "no file name",
        });
    }
    Ok(segments.join("/"))
}

/// Normalize and classify in one step, returning the root-relative target.
pub fn resolve(path: &str) -> Result<String> {
    let normalized = normalize(path)?;
    Ok(classify(&normalized).target(&normalized))
}

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::template::TemplateError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),

    #[error("Template error in task '{task}': {source}")]
    Template {
        task: String,
        #[source]
        source: TemplateError,
    },

    #[error("Task '{task}' depends on unknown task '{predecessor}'")]
    UnknownPredecessor { task: String, predecessor: String },

    #[error("Task '{task}' is assigned to unknown worker '{worker}'")]
    WorkerNotFound { task: String, worker: String },

    #[error("Dependency cycle between tasks: {}", .tasks.join(", "))]
    DependencyCycle { tasks: Vec<String> },

    #[error("Task declared more than once: {0}")]
    DuplicateTask(String),

    #[error("Worker '{worker}' failed: {message}")]
    WorkerFailed { worker: String, message: String },

    #[error("File record has no path")]
    MissingPath,

    #[error("Unsafe path '{path}': {reason}")]
    UnsafePath { path: String, reason: &'static str },

    #[error("Duplicate path: {0}")]
    DuplicatePath(String),

    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Deployment to {} produced no files", .root.display())]
    NothingDeployed { root: PathBuf },

    #[error("Path cannot be encoded as a file marker: {0:?}")]
    UnencodablePath(String),

    #[error("Failed to bind {addr}: {source}")]
    ServerBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

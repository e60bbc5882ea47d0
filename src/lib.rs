pub mod artifact;
pub mod config;
pub mod core;
pub mod crew;
pub mod deploy;
pub mod error;
pub mod log;
pub mod server;
pub mod util;

pub use artifact::{format_artifact, parse_artifact, parse_artifact_detailed, FileRecord};
pub use crate::core::{build_tasks, ExecutableTask, TaskDescriptor, TaskGraph, TaskId, TaskSet};
pub use crew::{select_site_output, SequentialEngine, TaskOutput, Worker, WorkerRegistry};
pub use deploy::{classify, deploy, DeployReport, Deployer, DuplicatePolicy};
pub use error::{Error, Result};
pub use server::{ServerManager, SiteServer};

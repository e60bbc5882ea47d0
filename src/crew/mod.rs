//! Worker execution for a built task list.

pub mod engine;
pub mod worker;

pub use engine::{select_site_output, EngineEvent, SequentialEngine, TaskOutput};
pub use worker::{CommandWorker, WorkRequest, Worker, WorkerProfile, WorkerRegistry};

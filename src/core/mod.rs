//! Task model and task graph construction.
//!
//! Declarative descriptors become executable tasks through
//! [`builder::build_tasks`]; the dependency graph behind it lives in
//! [`dag`].

pub mod builder;
pub mod dag;
pub mod plan;
pub mod task;
pub mod template;

pub use builder::build_tasks;
pub use dag::TaskGraph;
pub use plan::{plan, PlanStep};
pub use task::{ExecutableTask, TaskDescriptor, TaskId, TaskSet};

//! Turns a declarative task set into executable tasks.
//!
//! Construction runs in two passes so that `context` may name tasks
//! declared further down the file:
//!
//! 1. Materialize: substitute description placeholders and resolve the
//!    assigned worker for every task.
//! 2. Wire: resolve predecessors, reject cycles, then instantiate tasks in
//!    dependency order so each predecessor exists before its dependents.
//!
//! The returned list is always in declaration order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SiteConfig;
use crate::core::dag::TaskGraph;
use crate::core::task::{ExecutableTask, TaskDescriptor, TaskId, TaskSet};
use crate::core::template::{self, TemplateValues};
use crate::crew::worker::{Worker, WorkerRegistry};
use crate::{slog, slog_debug, Error, Result};

struct Draft<'a> {
    descriptor: &'a TaskDescriptor,
    description: String,
    worker: Arc<dyn Worker>,
}

/// Build executable tasks for one run.
///
/// # Errors
///
/// Fails before any task is executed with:
/// - [`Error::Template`] when a description references an unknown placeholder
/// - [`Error::WorkerNotFound`] when a task names an unregistered worker
/// - [`Error::UnknownPredecessor`] when `context` names an undeclared task
/// - [`Error::DependencyCycle`] when the `context` relation is cyclic
pub fn build_tasks(
    config: &SiteConfig,
    tasks: &TaskSet,
    workers: &WorkerRegistry,
) -> Result<Vec<Arc<ExecutableTask>>> {
    build_tasks_with_values(&config.template_values(), tasks, workers)
}

/// [`build_tasks`] with explicit placeholder values.
pub fn build_tasks_with_values(
    values: &TemplateValues,
    tasks: &TaskSet,
    workers: &WorkerRegistry,
) -> Result<Vec<Arc<ExecutableTask>>> {
    let mut drafts = materialize(values, tasks, workers)?;

    let graph = TaskGraph::from_task_set(tasks)?;
    let order = graph.execution_order()?;

    let mut built: HashMap<&TaskId, Arc<ExecutableTask>> = HashMap::with_capacity(tasks.len());
    for id in order {
        let draft = drafts
            .remove(id)
            .ok_or_else(|| Error::Validation(format!("Task {} was not materialized", id)))?;

        let context = draft
            .descriptor
            .context
            .iter()
            .map(|predecessor| {
                built.get(predecessor).cloned().ok_or_else(|| Error::UnknownPredecessor {
                    task: id.to_string(),
                    predecessor: predecessor.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        slog_debug!(
            "Wired task {} (worker={}, context={:?})",
            id,
            draft.worker.id(),
            draft.descriptor.context
        );

        let task = ExecutableTask::new(
            id.clone(),
            draft.description,
            draft.descriptor.expected_output.clone(),
            draft.worker,
            draft.descriptor.async_execution,
            context,
        );
        built.insert(id, Arc::new(task));
    }

    let ordered = tasks
        .ids()
        .map(|id| {
            built
                .get(id)
                .cloned()
                .ok_or_else(|| Error::Validation(format!("Task {} was not built", id)))
        })
        .collect::<Result<Vec<_>>>()?;

    slog!("Built {} tasks", ordered.len());
    Ok(ordered)
}

fn materialize<'a>(
    values: &TemplateValues,
    tasks: &'a TaskSet,
    workers: &WorkerRegistry,
) -> Result<HashMap<&'a TaskId, Draft<'a>>> {
    let mut drafts = HashMap::with_capacity(tasks.len());
    for (id, descriptor) in tasks.iter() {
        let description =
            template::render(&descriptor.description, values).map_err(|source| Error::Template {
                task: id.to_string(),
                source,
            })?;

        let worker = workers
            .get(&descriptor.worker)
            .ok_or_else(|| Error::WorkerNotFound {
                task: id.to_string(),
                worker: descriptor.worker.clone(),
            })?;

        drafts.insert(
            id,
            Draft {
                descriptor,
                description,
                worker,
            },
        );
    }
    Ok(drafts)
}

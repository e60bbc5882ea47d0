//! Dry-run view of a task set.
//!
//! A plan lists tasks in the order they would run, with the edges on both
//! sides of each task and the placeholders its text expects. Nothing is
//! rendered or executed.

use crate::core::dag::TaskGraph;
use crate::core::task::{TaskId, TaskSet};
use crate::core::template;
use crate::{slog_debug, Error, Result};

/// One task in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub id: TaskId,
    pub worker: String,
    /// Direct predecessors, in declaration order.
    pub after: Vec<TaskId>,
    /// Tasks that consume this task's output, in declaration order.
    pub feeds: Vec<TaskId>,
    /// Placeholders in the description and expected output, first use first.
    pub placeholders: Vec<String>,
}

/// Order `tasks` for execution and describe each step.
///
/// Fails with [`Error::UnknownPredecessor`] or [`Error::DependencyCycle`]
/// under the same conditions as [`crate::build_tasks`].
pub fn plan(tasks: &TaskSet) -> Result<Vec<PlanStep>> {
    let graph = TaskGraph::from_task_set(tasks)?;
    let order = graph.execution_order()?;

    let mut steps = Vec::with_capacity(order.len());
    for id in order {
        let descriptor = tasks
            .get(id)
            .ok_or_else(|| Error::Validation(format!("Task {} is not declared", id)))?;

        let mut placeholders = template::placeholders(&descriptor.description);
        for name in template::placeholders(&descriptor.expected_output) {
            if !placeholders.contains(&name) {
                placeholders.push(name);
            }
        }

        steps.push(PlanStep {
            id: id.clone(),
            worker: descriptor.worker.clone(),
            after: graph.dependencies(id).into_iter().cloned().collect(),
            feeds: graph.dependents(id).into_iter().cloned().collect(),
            placeholders,
        });
    }
    slog_debug!("Planned {} tasks", steps.len());
    Ok(steps)
}

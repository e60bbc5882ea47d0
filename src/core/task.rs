//! Task data model for the redesign crew.
//!
//! A [`TaskDescriptor`] is the declarative form read from `tasks.toml`;
//! an [`ExecutableTask`] is the resolved form handed to the execution
//! engine, with its worker and predecessors attached.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crew::worker::Worker;
use crate::{Error, Result};

/// Identifier of a task within a task set (the table name in `tasks.toml`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Declarative description of one unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Description template with `{placeholder}` references.
    pub description: String,
    /// Identifier of the worker that performs this task.
    #[serde(alias = "agent")]
    pub worker: String,
    /// What the worker is expected to hand back. Not interpreted.
    #[serde(default)]
    pub expected_output: String,
    /// Tasks whose output this task consumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<TaskId>,
    #[serde(default)]
    pub async_execution: bool,
}

impl TaskDescriptor {
    pub fn new(description: &str, worker: &str) -> Self {
        Self {
            description: description.to_string(),
            worker: worker.to_string(),
            expected_output: String::new(),
            context: Vec::new(),
            async_execution: false,
        }
    }

    pub fn with_context<I, S>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context = context.into_iter().map(|s| TaskId(s.into())).collect();
        self
    }

    pub fn with_expected_output(mut self, expected_output: &str) -> Self {
        self.expected_output = expected_output.to_string();
        self
    }
}

/// Ordered mapping of task identifiers to descriptors.
///
/// Iteration order is declaration order; identifiers are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskSet {
    entries: Vec<(TaskId, TaskDescriptor)>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task, rejecting an identifier that is already present.
    pub fn insert(&mut self, id: impl Into<TaskId>, descriptor: TaskDescriptor) -> Result<()> {
        let id = id.into();
        if self.contains(&id) {
            return Err(Error::DuplicateTask(id.0));
        }
        self.entries.push((id, descriptor));
        Ok(())
    }

    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (TaskId, TaskDescriptor)>,
    {
        let mut set = Self::new();
        for (id, descriptor) in entries {
            set.insert(id, descriptor)?;
        }
        Ok(set)
    }

    /// Parse a task set from TOML, one table per task.
    ///
    /// ```toml
    /// [analyze_website]
    /// description = "Analyze {current_website_url}"
    /// agent = "analysis_agent"
    /// expected_output = "A report"
    ///
    /// [propose_design]
    /// description = "Design for {industry}"
    /// agent = "design_advisor_agent"
    /// context = ["analyze_website"]
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(s)?;
        let mut set = Self::new();
        for (id, value) in table {
            let descriptor = value.try_into::<TaskDescriptor>()?;
            set.insert(TaskId(id), descriptor)?;
        }
        Ok(set)
    }

    pub fn get(&self, id: &TaskId) -> Option<&TaskDescriptor> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, d)| d)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.entries.iter().any(|(k, _)| k == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskId, &TaskDescriptor)> {
        self.entries.iter().map(|(k, d)| (k, d))
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fully resolved task, ready for the execution engine.
///
/// Predecessors are shared references to the very instances built for
/// the same run.
pub struct ExecutableTask {
    id: TaskId,
    description: String,
    expected_output: String,
    worker: Arc<dyn Worker>,
    async_execution: bool,
    context: Vec<Arc<ExecutableTask>>,
}

impl ExecutableTask {
    pub(crate) fn new(
        id: TaskId,
        description: String,
        expected_output: String,
        worker: Arc<dyn Worker>,
        async_execution: bool,
        context: Vec<Arc<ExecutableTask>>,
    ) -> Self {
        Self {
            id,
            description,
            expected_output,
            worker,
            async_execution,
            context,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Description with placeholders substituted.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn worker(&self) -> &Arc<dyn Worker> {
        &self.worker
    }

    pub fn is_async(&self) -> bool {
        self.async_execution
    }

    /// Resolved predecessor tasks, in declared order.
    pub fn context(&self) -> &[Arc<ExecutableTask>] {
        &self.context
    }
}

impl std::fmt::Debug for ExecutableTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutableTask")
            .field("id", &self.id)
            .field("worker", &self.worker.id())
            .field("async_execution", &self.async_execution)
            .field(
                "context",
                &self.context.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

//! Sequential execution of built tasks.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::core::dag::TaskGraph;
use crate::core::task::{ExecutableTask, TaskId};
use crate::crew::worker::WorkRequest;
use crate::{slog, slog_debug, slog_error, Error, Result};

/// Text produced by one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutput {
    pub task: TaskId,
    pub worker: String,
    pub text: String,
}

/// Progress notifications emitted while running.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started {
        task: TaskId,
        index: usize,
        total: usize,
    },
    Finished {
        task: TaskId,
        bytes: usize,
    },
}

/// Runs tasks one at a time.
///
/// Tasks run in declaration order, except that a task never runs before
/// its predecessors. Tasks flagged `async_execution` run inline.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialEngine;

impl SequentialEngine {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self, tasks: &[Arc<ExecutableTask>]) -> Result<Vec<TaskOutput>> {
        self.run_with(tasks, |_| {}).await
    }

    /// Run every task, reporting progress to `observer`.
    ///
    /// Stops at the first failing task.
    pub async fn run_with<F>(
        &self,
        tasks: &[Arc<ExecutableTask>],
        mut observer: F,
    ) -> Result<Vec<TaskOutput>>
    where
        F: FnMut(EngineEvent),
    {
        let graph = graph_of(tasks)?;
        let order = graph.execution_order()?;
        let by_id: HashMap<&TaskId, &Arc<ExecutableTask>> =
            tasks.iter().map(|t| (t.id(), t)).collect();

        let total = order.len();
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(total);
        let mut produced: HashMap<TaskId, usize> = HashMap::with_capacity(total);

        for (index, id) in order.into_iter().enumerate() {
            let task = by_id
                .get(id)
                .ok_or_else(|| Error::Validation(format!("Task {} not in run", id)))?;

            observer(EngineEvent::Started {
                task: id.clone(),
                index,
                total,
            });
            if task.is_async() {
                slog_debug!("Task {} is flagged async; running inline", id);
            }

            let context = task
                .context()
                .iter()
                .filter_map(|p| {
                    produced
                        .get(p.id())
                        .map(|&i| (p.id(), outputs[i].text.as_str()))
                })
                .collect();

            let request = WorkRequest {
                task: id,
                description: task.description(),
                expected_output: task.expected_output(),
                context,
            };

            let worker = task.worker();
            let text = worker.perform(request).await.map_err(|e| {
                slog_error!("Task {} failed on worker {}: {}", id, worker.id(), e);
                e
            })?;

            observer(EngineEvent::Finished {
                task: id.clone(),
                bytes: text.len(),
            });
            produced.insert(id.clone(), outputs.len());
            outputs.push(TaskOutput {
                task: id.clone(),
                worker: worker.id().to_string(),
                text,
            });
        }

        slog!("Ran {} tasks", outputs.len());
        Ok(outputs)
    }
}

fn graph_of(tasks: &[Arc<ExecutableTask>]) -> Result<TaskGraph> {
    let mut graph = TaskGraph::new();
    for task in tasks {
        graph.add_task(task.id().clone());
    }
    for task in tasks {
        for predecessor in task.context() {
            graph.add_task(predecessor.id().clone());
            graph.add_dependency(predecessor.id(), task.id())?;
        }
    }
    Ok(graph)
}

/// The first output that carries an HTML document, i.e. the generated
/// site code.
pub fn select_site_output(outputs: &[TaskOutput]) -> Option<&TaskOutput> {
    outputs
        .iter()
        .find(|o| o.text.to_ascii_lowercase().contains("<!doctype html"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::build_tasks_with_values;
    use crate::core::task::{TaskDescriptor, TaskSet};
    use crate::core::template::TemplateValues;
    use crate::crew::worker::{StaticWorker, Worker, WorkerRegistry};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::Mutex;

    /// Records the context it saw and answers with the task id.
    struct RecordingWorker {
        seen: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl Worker for RecordingWorker {
        fn id(&self) -> &str {
            "recorder"
        }

        fn perform<'a>(&'a self, request: WorkRequest<'a>) -> BoxFuture<'a, Result<String>> {
            let ctx = request.context.iter().map(|(_, o)| o.to_string()).collect();
            self.seen
                .lock()
                .unwrap()
                .push((request.task.to_string(), ctx));
            let reply = format!("out:{}", request.task);
            async move { Ok(reply) }.boxed()
        }
    }

    struct FailingWorker;

    impl Worker for FailingWorker {
        fn id(&self) -> &str {
            "failing"
        }

        fn perform<'a>(&'a self, _request: WorkRequest<'a>) -> BoxFuture<'a, Result<String>> {
            async move {
                Err(Error::WorkerFailed {
                    worker: "failing".to_string(),
                    message: "boom".to_string(),
                })
            }
            .boxed()
        }
    }

    fn build(
        entries: Vec<(&str, TaskDescriptor)>,
        workers: &WorkerRegistry,
    ) -> Vec<Arc<ExecutableTask>> {
        let set = TaskSet::from_entries(entries.into_iter().map(|(id, d)| (TaskId::from(id), d)))
            .unwrap();
        build_tasks_with_values(&TemplateValues::new(), &set, workers).unwrap()
    }

    #[tokio::test]
    async fn test_run_passes_predecessor_outputs() {
        let recorder = Arc::new(RecordingWorker {
            seen: Mutex::new(Vec::new()),
        });
        let mut workers = WorkerRegistry::new();
        workers.register(recorder.clone());

        let tasks = build(
            vec![
                (
                    "report",
                    TaskDescriptor::new("r", "recorder").with_context(["analyze", "design"]),
                ),
                ("analyze", TaskDescriptor::new("a", "recorder")),
                ("design", TaskDescriptor::new("d", "recorder").with_context(["analyze"])),
            ],
            &workers,
        );

        let outputs = SequentialEngine::new().run(&tasks).await.unwrap();
        let order: Vec<&str> = outputs.iter().map(|o| o.task.as_str()).collect();
        assert_eq!(order, vec!["analyze", "design", "report"]);

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0], ("analyze".to_string(), vec![]));
        assert_eq!(seen[1], ("design".to_string(), vec!["out:analyze".to_string()]));
        assert_eq!(
            seen[2],
            (
                "report".to_string(),
                vec!["out:analyze".to_string(), "out:design".to_string()]
            )
        );
    }

    #[tokio::test]
    async fn test_run_reports_progress() {
        let mut workers = WorkerRegistry::new();
        workers.register(Arc::new(StaticWorker::new("w", "hello")));
        let tasks = build(vec![("a", TaskDescriptor::new("a", "w"))], &workers);

        let mut events = Vec::new();
        SequentialEngine::new()
            .run_with(&tasks, |e| events.push(e))
            .await
            .unwrap();

        assert_eq!(
            events,
            vec![
                EngineEvent::Started {
                    task: "a".into(),
                    index: 0,
                    total: 1
                },
                EngineEvent::Finished {
                    task: "a".into(),
                    bytes: 5
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_run_stops_on_failure() {
        let mut workers = WorkerRegistry::new();
        workers.register(Arc::new(FailingWorker));
        workers.register(Arc::new(StaticWorker::new("ok", "fine")));
        let tasks = build(
            vec![
                ("first", TaskDescriptor::new("f", "failing")),
                ("second", TaskDescriptor::new("s", "ok")),
            ],
            &workers,
        );

        let err = SequentialEngine::new().run(&tasks).await.unwrap_err();
        assert!(matches!(err, Error::WorkerFailed { .. }));
    }

    #[test]
    fn test_select_site_output_finds_doctype() {
        let outputs = vec![
            TaskOutput {
                task: "analyze".into(),
                worker: "a".to_string(),
                text: "Website Analysis: slow".to_string(),
            },
            TaskOutput {
                task: "code".into(),
                worker: "c".to_string(),
                text: "// filename: index.html\n<!doctype HTML>\n<html></html>".to_string(),
            },
        ];
        assert_eq!(select_site_output(&outputs).unwrap().task.as_str(), "code");
        assert!(select_site_output(&outputs[..1]).is_none());
    }
}

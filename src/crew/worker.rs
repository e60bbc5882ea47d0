//! Workers that turn a task description into generated text.
//!
//! The [`Worker`] trait is the seam to whatever produces text. The
//! built-in [`CommandWorker`] shells out to a headless CLI (by default
//! `claude -p`), passing a prompt composed from the worker's profile and
//! the task.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::core::task::TaskId;
use crate::{slog_debug, slog_trace, Error, Result};

/// Default command used when a profile does not override it.
pub const DEFAULT_COMMAND: &str = "claude -p";

/// Default timeout for one worker invocation (10 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Everything a worker needs to perform one task.
#[derive(Debug, Clone)]
pub struct WorkRequest<'a> {
    pub task: &'a TaskId,
    pub description: &'a str,
    pub expected_output: &'a str,
    /// Outputs of the task's predecessors, in declared order.
    pub context: Vec<(&'a TaskId, &'a str)>,
}

pub trait Worker: Send + Sync {
    fn id(&self) -> &str;

    fn perform<'a>(&'a self, request: WorkRequest<'a>) -> BoxFuture<'a, Result<String>>;
}

/// Persona and command for one worker, as declared in `workers.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub role: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Overrides the default worker command for this worker only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl WorkerProfile {
    /// Parse worker profiles from TOML, one table per worker, keeping
    /// declaration order.
    pub fn parse_all(s: &str) -> Result<Vec<(String, WorkerProfile)>> {
        let table: toml::Table = toml::from_str(s)?;
        table
            .into_iter()
            .map(|(id, value)| -> Result<(String, WorkerProfile)> {
                Ok((id, value.try_into::<WorkerProfile>()?))
            })
            .collect()
    }
}

/// Lookup table from worker identifier to worker.
#[derive(Default, Clone)]
pub struct WorkerRegistry {
    workers: HashMap<String, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a [`CommandWorker`] for every profile.
    ///
    /// Tool names listed for a worker in `tools` are appended to the
    /// profile's own list.
    pub fn from_profiles(
        profiles: &[(String, WorkerProfile)],
        tools: &BTreeMap<String, Vec<String>>,
        default_command: &str,
        timeout: Duration,
    ) -> Self {
        let mut registry = Self::new();
        for (id, profile) in profiles {
            let mut profile = profile.clone();
            if let Some(extra) = tools.get(id) {
                for tool in extra {
                    if !profile.tools.contains(tool) {
                        profile.tools.push(tool.clone());
                    }
                }
            }
            let command = profile
                .command
                .clone()
                .unwrap_or_else(|| default_command.to_string());
            registry.register(Arc::new(
                CommandWorker::new(id, profile, &command).with_timeout(timeout),
            ));
        }
        registry
    }

    /// Register a worker, returning the one it replaced.
    pub fn register(&mut self, worker: Arc<dyn Worker>) -> Option<Arc<dyn Worker>> {
        self.workers.insert(worker.id().to_string(), worker)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.workers.contains_key(id)
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.workers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("workers", &self.ids())
            .finish()
    }
}

/// Worker backed by an external headless command.
///
/// The prompt is passed as the final argument; stdout is the result.
#[derive(Debug, Clone)]
pub struct CommandWorker {
    id: String,
    profile: WorkerProfile,
    base_command: Vec<String>,
    timeout: Duration,
}

impl CommandWorker {
    pub fn new(id: &str, profile: WorkerProfile, command: &str) -> Self {
        Self {
            id: id.to_string(),
            profile,
            base_command: command.split_whitespace().map(String::from).collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &str {
        self.base_command
            .first()
            .map(|s| s.as_str())
            .unwrap_or("claude")
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_available(&self) -> bool {
        which::which(self.binary()).is_ok()
    }

    /// Compose the prompt sent to the command for one request.
    pub fn prompt(&self, request: &WorkRequest<'_>) -> String {
        let mut prompt = String::new();
        let profile = &self.profile;
        if !profile.role.is_empty() {
            prompt.push_str(&format!("You are a {}.\n", profile.role));
        }
        if !profile.backstory.is_empty() {
            prompt.push_str(profile.backstory.trim());
            prompt.push('\n');
        }
        if !profile.goal.is_empty() {
            prompt.push_str(&format!("Your goal: {}\n", profile.goal));
        }
        if !profile.tools.is_empty() {
            prompt.push_str(&format!("Available tools: {}\n", profile.tools.join(", ")));
        }

        prompt.push_str("\n## Task\n");
        prompt.push_str(request.description.trim());
        prompt.push('\n');

        if !request.expected_output.is_empty() {
            prompt.push_str("\n## Expected output\n");
            prompt.push_str(request.expected_output.trim());
            prompt.push('\n');
        }

        for (task, output) in &request.context {
            prompt.push_str(&format!("\n## Output of {}\n", task));
            prompt.push_str(output.trim());
            prompt.push('\n');
        }
        prompt
    }

    async fn execute(&self, prompt: String) -> Result<String> {
        let binary = self.binary().to_string();
        slog_debug!("CommandWorker {} running {}", self.id, binary);
        slog_trace!("CommandWorker {} prompt:\n{}", self.id, prompt);

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&binary)
                .args(self.base_command.iter().skip(1))
                .arg(&prompt)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| Error::Timeout(self.timeout))?
        .map_err(|e| Error::WorkerFailed {
            worker: self.id.clone(),
            message: format!("failed to start {}: {}", binary, e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!(
                    "{} exited with code {}",
                    binary,
                    output.status.code().unwrap_or(-1)
                )
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::WorkerFailed {
                worker: self.id.clone(),
                message,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        slog_trace!("CommandWorker {} output:\n{}", self.id, stdout);
        Ok(stdout)
    }
}

impl Worker for CommandWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn perform<'a>(&'a self, request: WorkRequest<'a>) -> BoxFuture<'a, Result<String>> {
        let prompt = self.prompt(&request);
        self.execute(prompt).boxed()
    }
}

/// Worker that answers every task with the same text.
#[cfg(test)]
pub(crate) struct StaticWorker {
    id: String,
    reply: String,
}

#[cfg(test)]
impl StaticWorker {
    pub(crate) fn new(id: &str, reply: &str) -> Self {
        Self {
            id: id.to_string(),
            reply: reply.to_string(),
        }
    }
}

#[cfg(test)]
impl Worker for StaticWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn perform<'a>(&'a self, _request: WorkRequest<'a>) -> BoxFuture<'a, Result<String>> {
        let reply = self.reply.clone();
        async move { Ok(reply) }.boxed()
    }
}

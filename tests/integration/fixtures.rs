//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Creating temporary project directories
//! - Scripted workers that answer without spawning a process
//! - A generated multi-file site blob

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use tempfile::TempDir;

use sitecrew::crew::WorkRequest;
use sitecrew::{Result, Worker, WorkerRegistry};

/// Generated frontend code as a crew would return it.
pub const SITE_BLOB: &str = "Here is the redesigned site.
// filename: index.html
<!DOCTYPE html>
<html><head><link rel=\"stylesheet\" href=\"/css/styles.css\"></head>
<body><h1>Acme</h1></body></html>
/* filename: css/styles.css */
h1 { color: navy; }
// filename: js/main.js
console.log('ready');
# filename: app.py
from flask import Flask, render_template
app = Flask(__name__)
";

pub const CONFIG_TOML: &str = r#"
current_website_url = "www.acme.example"
industry = "Hardware"
target_audience = "Contractors"

[brand_guidelines]
tone = "direct"
"#;

pub const TASKS_TOML: &str = r#"
[analyze]
description = "Analyze {current_website_url} for {target_audience}."
worker = "analyst"
expected_output = "A report"

[design]
description = "Propose a design for the {industry} industry. Brand: {brand_guidelines}."
worker = "designer"
context = ["analyze"]

[code]
description = "Write the frontend code."
worker = "developer"
context = ["analyze", "design"]
"#;

pub const WORKERS_TOML: &str = r#"
[analyst]
role = "Website Analyst"

[designer]
role = "Designer"

[developer]
role = "Frontend Developer"
"#;

/// A project directory with `config/` populated.
pub struct TestProject {
    pub temp_dir: TempDir,
    pub path: PathBuf,
}

impl TestProject {
    pub fn new(config: &str, tasks: &str, workers: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().to_path_buf();
        let config_dir = path.join("config");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        fs::write(config_dir.join("config.toml"), config).expect("Failed to write config");
        fs::write(config_dir.join("tasks.toml"), tasks).expect("Failed to write tasks");
        fs::write(config_dir.join("workers.toml"), workers).expect("Failed to write workers");
        Self { temp_dir, path }
    }

    pub fn redesign() -> Self {
        Self::new(CONFIG_TOML, TASKS_TOML, WORKERS_TOML)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.path.join("output/redesigned_site")
    }
}

/// A worker that answers with a fixed reply and records what it was asked.
pub struct ScriptedWorker {
    id: String,
    reply: String,
    pub requests: Mutex<Vec<Request>>,
}

/// What a [`ScriptedWorker`] saw for one task.
#[derive(Debug, Clone)]
pub struct Request {
    pub task: String,
    pub description: String,
    pub context: Vec<(String, String)>,
}

impl ScriptedWorker {
    pub fn new(id: &str, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

impl Worker for ScriptedWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn perform<'a>(&'a self, request: WorkRequest<'a>) -> BoxFuture<'a, Result<String>> {
        self.requests.lock().unwrap().push(Request {
            task: request.task.to_string(),
            description: request.description.to_string(),
            context: request
                .context
                .iter()
                .map(|(id, text)| (id.to_string(), text.to_string()))
                .collect(),
        });
        let reply = self.reply.clone();
        async move { Ok(reply) }.boxed()
    }
}

/// Scripted workers for [`WORKERS_TOML`]; the developer returns [`SITE_BLOB`].
pub fn redesign_workers() -> (WorkerRegistry, Arc<ScriptedWorker>, Arc<ScriptedWorker>) {
    let designer = ScriptedWorker::new("designer", "Use a navy palette.");
    let developer = ScriptedWorker::new("developer", SITE_BLOB);
    let mut registry = WorkerRegistry::new();
    registry.register(ScriptedWorker::new("analyst", "The site is slow."));
    registry.register(designer.clone());
    registry.register(developer.clone());
    (registry, designer, developer)
}

/// An address on a port that was free a moment ago.
pub fn free_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    listener.local_addr().expect("No local address")
}

use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use sitecrew::artifact::parse_artifact_detailed;
use sitecrew::config::{Project, Settings};
use sitecrew::crew::EngineEvent;
use sitecrew::deploy::{DeployReport, Deployer, DuplicatePolicy};
use sitecrew::util::{blocking, preview};
use sitecrew::{
    build_tasks, parse_artifact, select_site_output, slog, slog_warn, Error, Result,
    SequentialEngine, ServerManager,
};
use sitecrew::core::plan;

/// Sitecrew - run a crew of AI workers that redesigns a website, then
/// deploy and preview the result
#[derive(Parser, Debug)]
#[command(name = "sitecrew")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    SITECREW_DEBUG=1     Enable debug logging \
                  (alternative to --debug)"
)]
pub struct Cli {
    /// Enable debug logging (writes to ~/.sitecrew/sitecrew.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run every task, deploy the generated site and serve it
    Run {
        /// Project directory containing config/
        #[arg(long, short = 'p', default_value = ".")]
        project: PathBuf,

        /// Deployment directory
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Port for the preview server
        #[arg(long)]
        port: Option<u16>,

        /// Deploy without starting the preview server
        #[arg(long)]
        no_serve: bool,

        /// Skip records whose target path was already written
        #[arg(long)]
        strict: bool,
    },

    /// Validate the task graph and print the execution order
    Plan {
        /// Project directory containing config/
        #[arg(long, short = 'p', default_value = ".")]
        project: PathBuf,
    },

    /// Parse a generated artifact file and deploy its files
    Deploy {
        /// File holding the generated multi-file blob
        artifact: PathBuf,

        /// Deployment directory
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Skip records whose target path was already written
        #[arg(long)]
        strict: bool,

        /// Print the deployment report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve a deployed directory until interrupted
    Serve {
        /// Directory to serve
        dir: PathBuf,

        /// Port for the preview server
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    sitecrew::log::init_with_debug(cli.debug);
    slog!("Sitecrew starting: {:?}", cli.command);

    let settings = Settings::load()?;
    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Command::Run {
            project,
            output,
            port,
            no_serve,
            strict,
        } => {
            let output = output.unwrap_or_else(|| settings.effective_output_dir());
            let policy = policy(&settings, strict);
            let addr = addr(&settings, port);
            rt.block_on(run_pipeline(&project, &settings, output, policy, addr, no_serve))
        }
        Command::Plan { project } => run_plan(&project, &settings),
        Command::Deploy {
            artifact,
            output,
            strict,
            json,
        } => {
            let output = output.unwrap_or_else(|| settings.effective_output_dir());
            run_deploy(&artifact, output, policy(&settings, strict), json)
        }
        Command::Serve { dir, port } => {
            rt.block_on(serve_until_interrupted(dir, addr(&settings, port)))
        }
    }
}

fn policy(settings: &Settings, strict: bool) -> DuplicatePolicy {
    if strict {
        DuplicatePolicy::Reject
    } else {
        settings.duplicate_policy()
    }
}

fn addr(settings: &Settings, port: Option<u16>) -> SocketAddr {
    let mut addr = settings.effective_addr();
    if let Some(port) = port {
        addr.set_port(port);
    }
    addr
}

/// Load the project, run every task, deploy the site blob and serve it.
async fn run_pipeline(
    project_dir: &Path,
    settings: &Settings,
    output: PathBuf,
    policy: DuplicatePolicy,
    addr: SocketAddr,
    no_serve: bool,
) -> Result<()> {
    let project = Project::load(project_dir)?;
    let workers = project.worker_registry(settings);
    let tasks = build_tasks(&project.site, &project.tasks, &workers)?;

    for binary in project.unavailable_commands(settings) {
        slog_warn!("Worker command {} not found on PATH", binary);
        println!("Warning: worker command '{}' not found on PATH", binary);
    }

    println!("Redesigning {}", project.site.current_website_url);
    println!();
    println!("Tasks:");
    for task in &tasks {
        println!(
            "  {} ({}): {}",
            task.id(),
            task.worker().id(),
            preview(task.description(), 100)
        );
    }
    println!();

    let outputs = SequentialEngine::new()
        .run_with(&tasks, |event| match event {
            EngineEvent::Started { task, index, total } => {
                println!("[{}/{}] {}", index + 1, total, task)
            }
            EngineEvent::Finished { bytes, .. } => println!("      done ({} bytes)", bytes),
        })
        .await?;

    let Some(site) = select_site_output(&outputs) else {
        slog_warn!("No task output contains an HTML document");
        return Err(Error::Validation(
            "no task produced an HTML document to deploy".to_string(),
        ));
    };
    println!();
    println!("Deploying output of {} to {}", site.task, output.display());

    let records = parse_artifact(&site.text);
    let deployer = Deployer::new(&output).with_duplicate_policy(policy);
    let report = blocking(move || Ok(deployer.deploy(&records))).await?;
    print_report(&report);
    report.into_result()?;

    if no_serve {
        return Ok(());
    }
    serve_until_interrupted(output, addr).await
}

/// Build the task graph without running anything.
fn run_plan(project_dir: &Path, settings: &Settings) -> Result<()> {
    let project = Project::load(project_dir)?;
    let workers = project.worker_registry(settings);
    let tasks = build_tasks(&project.site, &project.tasks, &workers)?;
    let steps = plan(&project.tasks)?;
    let by_id: HashMap<_, _> = tasks.iter().map(|t| (t.id(), t)).collect();

    let join = |ids: &[sitecrew::TaskId]| {
        ids.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ")
    };

    println!("Execution order ({} tasks):", steps.len());
    for (n, step) in steps.iter().enumerate() {
        println!("  {}. {} [{}]", n + 1, step.id, step.worker);
        if !step.after.is_empty() {
            println!("     after: {}", join(&step.after));
        }
        if !step.feeds.is_empty() {
            println!("     feeds: {}", join(&step.feeds));
        }
        if !step.placeholders.is_empty() {
            println!("     uses:  {}", step.placeholders.join(", "));
        }
        if let Some(task) = by_id.get(&step.id) {
            println!("     {}", preview(task.description(), 100));
        }
    }
    Ok(())
}

fn run_deploy(artifact: &Path, output: PathBuf, policy: DuplicatePolicy, json: bool) -> Result<()> {
    let blob = fs::read_to_string(artifact)?;
    let parsed = parse_artifact_detailed(&blob);
    let report = Deployer::new(&output)
        .with_duplicate_policy(policy)
        .deploy(&parsed.records);

    if json {
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|s| serde_json::json!({ "path": s.path, "reason": s.error.to_string() }))
            .collect();
        let json_output = serde_json::json!({
            "root": report.root,
            "records": parsed.records.len(),
            "fallback": parsed.fallback,
            "dropped_lines": parsed.dropped_lines,
            "duplicates": parsed.duplicates,
            "written": report.written,
            "skipped": skipped,
            "manifest": report.manifest,
        });
        println!("{}", serde_json::to_string_pretty(&json_output)?);
    } else {
        if parsed.fallback {
            println!("No file markers found; deploying the whole artifact as index.html");
        }
        if parsed.dropped_lines > 0 {
            println!("Dropped {} line(s) before the first marker", parsed.dropped_lines);
        }
        for path in &parsed.duplicates {
            println!("Duplicate path in artifact: {}", path);
        }
        print_report(&report);
    }
    report.into_result().map(|_| ())
}

fn print_report(report: &DeployReport) {
    println!();
    println!("  Root:     {}", report.root.display());
    println!("  Written:  {}", report.written.len());
    for path in &report.written {
        println!("    • {}", path.display());
    }
    if let Some(manifest) = &report.manifest {
        println!("  Created:  {}", manifest.display());
    }
    if !report.skipped.is_empty() {
        println!("  Skipped:  {}", report.skipped_count());
        for skipped in &report.skipped {
            println!("    • {:?}: {}", skipped.path, skipped.error);
        }
    }
    println!();
}

async fn serve_until_interrupted(dir: PathBuf, addr: SocketAddr) -> Result<()> {
    let mut manager = ServerManager::new(addr);
    let local_addr = manager.start(dir.clone()).await?;
    println!("Serving {} at http://{}/", dir.display(), local_addr);
    println!("Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    println!();
    println!("Stopping server...");
    manager.stop().await;
    Ok(())
}

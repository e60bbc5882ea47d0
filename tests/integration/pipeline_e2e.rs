//! End-to-end pipeline tests.
//!
//! Project files are loaded from a temporary directory, tasks are run with
//! scripted workers, and the selected output is parsed and deployed.

use std::fs;
use std::path::{Path, PathBuf};

use sitecrew::artifact::parse_artifact_detailed;
use sitecrew::config::{Project, Settings};
use sitecrew::deploy::{DuplicatePolicy, Deployer};
use sitecrew::util::blocking;
use sitecrew::{build_tasks, select_site_output, Error, SequentialEngine, TaskGraph};

use crate::fixtures::{redesign_workers, TestProject, CONFIG_TOML, SITE_BLOB, WORKERS_TOML};

/// Test: Full pipeline
/// Given a three-task project whose last task emits a site blob
/// When the tasks run and the blob is deployed
/// Then the conventional layout is written with a manifest
#[tokio::test]
async fn test_pipeline_deploys_generated_site() {
    let project_dir = TestProject::redesign();
    let project = Project::load(&project_dir.path).unwrap();
    let (workers, _, _) = redesign_workers();

    let tasks = build_tasks(&project.site, &project.tasks, &workers).unwrap();
    let outputs = SequentialEngine::new().run(&tasks).await.unwrap();
    assert_eq!(outputs.len(), 3);

    let site = select_site_output(&outputs).expect("no HTML output");
    assert_eq!(site.task.as_str(), "code");

    let parsed = parse_artifact_detailed(&site.text);
    assert_eq!(parsed.dropped_lines, 1);
    assert_eq!(parsed.records.len(), 4);

    let root = project_dir.output_dir();
    let deployer = Deployer::new(&root);
    let records = parsed.records.clone();
    let report = blocking(move || Ok(deployer.deploy(&records)))
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let written: Vec<PathBuf> = report.written.iter().cloned().collect();
    assert_eq!(
        written,
        vec![
            PathBuf::from("app.py"),
            PathBuf::from("static/css/styles.css"),
            PathBuf::from("static/js/main.js"),
            PathBuf::from("templates/index.html"),
        ]
    );
    assert_eq!(report.manifest, Some(PathBuf::from("requirements.txt")));

    let index = fs::read_to_string(root.join("templates/index.html")).unwrap();
    assert!(index.starts_with("<!DOCTYPE html>"));
    assert!(index.ends_with("</html>"));
    assert_eq!(
        fs::read_to_string(root.join("static/css/styles.css")).unwrap(),
        "h1 { color: navy; }"
    );
    assert_eq!(fs::read_to_string(root.join("requirements.txt")).unwrap(), "flask\n");
}

/// Test: Descriptions and context reach workers
#[tokio::test]
async fn test_workers_receive_rendered_descriptions_and_context() {
    let project_dir = TestProject::redesign();
    let project = Project::load(&project_dir.path).unwrap();
    let (workers, designer, developer) = redesign_workers();

    let tasks = build_tasks(&project.site, &project.tasks, &workers).unwrap();
    assert_eq!(
        tasks[0].description(),
        "Analyze https://acme.example for Contractors."
    );
    SequentialEngine::new().run(&tasks).await.unwrap();

    let design = &designer.requests()[0];
    assert_eq!(
        design.description,
        "Propose a design for the Hardware industry. Brand: tone: direct."
    );
    assert_eq!(
        design.context,
        vec![("analyze".to_string(), "The site is slow.".to_string())]
    );

    let code = &developer.requests()[0];
    let sources: Vec<&str> = code.context.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(sources, vec!["analyze", "design"]);
}

/// Test: Cycles are rejected before anything runs
#[test]
fn test_cyclic_project_fails_to_build() {
    let tasks = r#"
[draft]
description = "Draft"
worker = "analyst"
context = ["review"]

[review]
description = "Review"
worker = "designer"
context = ["draft"]
"#;
    let project_dir = TestProject::new(CONFIG_TOML, tasks, WORKERS_TOML);
    let project = Project::load(&project_dir.path).unwrap();
    let (workers, designer, _) = redesign_workers();

    let err = build_tasks(&project.site, &project.tasks, &workers).unwrap_err();
    match err {
        Error::DependencyCycle { tasks } => assert_eq!(tasks, vec!["draft", "review"]),
        other => panic!("expected a cycle, got {other}"),
    }
    assert!(designer.requests().is_empty());
}

/// Test: Unknown placeholders and workers are reported by task
#[test]
fn test_misconfigured_projects_name_the_task() {
    let bad_placeholder = "[intro]\ndescription = \"Hello {visitor}\"\nworker = \"analyst\"\n";
    let project_dir = TestProject::new(CONFIG_TOML, bad_placeholder, WORKERS_TOML);
    let project = Project::load(&project_dir.path).unwrap();
    let (workers, _, _) = redesign_workers();
    assert!(matches!(
        build_tasks(&project.site, &project.tasks, &workers),
        Err(Error::Template { task, .. }) if task == "intro"
    ));

    let bad_worker = "[intro]\ndescription = \"Hello\"\nworker = \"copywriter\"\n";
    let project_dir = TestProject::new(CONFIG_TOML, bad_worker, WORKERS_TOML);
    let project = Project::load(&project_dir.path).unwrap();
    assert!(matches!(
        build_tasks(&project.site, &project.tasks, &workers),
        Err(Error::WorkerNotFound { worker, .. }) if worker == "copywriter"
    ));
}

/// Test: Strict deployment of a blob with repeated and unsafe paths
#[test]
fn test_strict_deploy_reports_skips() {
    let blob = format!(
        "{}// filename: index.html\n<p>second</p>\n// filename: ../../etc/hosts\nnope\n",
        SITE_BLOB
    );
    let parsed = parse_artifact_detailed(&blob);
    assert_eq!(parsed.duplicates, vec!["index.html".to_string()]);

    let project_dir = TestProject::redesign();
    let root = project_dir.output_dir();
    let report = Deployer::new(&root)
        .with_duplicate_policy(DuplicatePolicy::Reject)
        .deploy(&parsed.records);

    assert_eq!(report.written.len(), 4);
    assert_eq!(report.skipped_count(), 2);
    assert!(matches!(report.skipped[0].error, Error::DuplicatePath(_)));
    assert!(matches!(report.skipped[1].error, Error::UnsafePath { .. }));
    let index = fs::read_to_string(root.join("templates/index.html")).unwrap();
    assert!(index.contains("<h1>Acme</h1>"));
}

/// Test: The bundled demo project builds with command workers
#[test]
fn test_demo_project_builds() {
    let demo = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/website-redesign");
    let project = Project::load(&demo).unwrap();
    let workers = project.worker_registry(&Settings::default());

    let tasks = build_tasks(&project.site, &project.tasks, &workers).unwrap();
    assert_eq!(tasks.len(), project.tasks.len());
    assert!(tasks.iter().all(|t| !t.description().contains('{')));

    let graph = TaskGraph::from_task_set(&project.tasks).unwrap();
    assert_eq!(graph.execution_order().unwrap().len(), tasks.len());
}

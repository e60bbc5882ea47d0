//! Preview server lifecycle tests.
//!
//! A deployed site is served over HTTP, swapped for another deployment on
//! the same address, and shut down.

use std::fs;

use sitecrew::artifact::FileRecord;
use sitecrew::deploy::deploy;
use sitecrew::{Error, ServerManager, SiteServer};
use tempfile::TempDir;

use crate::fixtures::free_addr;

fn deployed_site(title: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    let records = vec![
        FileRecord::new("index.html", format!("<h1>{}</h1>", title)),
        FileRecord::new("css/site.css", "h1 { margin: 0; }"),
        FileRecord::new("app.py", "app = None"),
    ];
    deploy(&records, dir.path()).into_result().unwrap();
    dir
}

async fn body(url: &str) -> String {
    reqwest::get(url).await.unwrap().text().await.unwrap()
}

/// Test: Deployed layout is browsable
#[tokio::test]
async fn test_serves_deployed_layout() {
    let site = deployed_site("Acme");
    let mut manager = ServerManager::new(free_addr());
    let addr = manager.start(site.path()).await.unwrap();

    assert_eq!(body(&format!("http://{}/", addr)).await, "<h1>Acme</h1>");
    assert_eq!(
        body(&format!("http://{}/css/site.css", addr)).await,
        "h1 { margin: 0; }"
    );
    assert_eq!(
        body(&format!("http://{}/requirements.txt", addr)).await,
        "flask\n"
    );

    manager.stop().await;
}

/// Test: Restart swaps the served directory on the same address
#[tokio::test]
async fn test_restart_replaces_previous_server() {
    let first = deployed_site("First");
    let second = deployed_site("Second");
    let mut manager = ServerManager::new(free_addr());

    let addr = manager.start(first.path()).await.unwrap();
    assert_eq!(body(&format!("http://{}/", addr)).await, "<h1>First</h1>");

    assert_eq!(manager.start(second.path()).await.unwrap(), addr);
    assert_eq!(body(&format!("http://{}/", addr)).await, "<h1>Second</h1>");

    manager.stop().await;
    assert!(reqwest::get(format!("http://{}/", addr)).await.is_err());
    manager.stop().await;
    assert!(!manager.is_running());
}

/// Test: An occupied port is a start error, not a hang
#[tokio::test]
async fn test_occupied_port_fails_to_start() {
    let site = deployed_site("Busy");
    let first = SiteServer::start(site.path(), "127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();

    let mut manager = ServerManager::new(first.local_addr());
    let err = manager.start(site.path()).await.unwrap_err();
    assert!(matches!(err, Error::ServerBind { .. }));
    assert!(!manager.is_running());

    first.stop().await;
    assert!(fs::metadata(site.path().join("templates/index.html")).is_ok());
}

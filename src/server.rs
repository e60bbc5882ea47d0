//! Local preview server for a deployed site.
//!
//! [`SiteServer`] is an explicit handle to one background HTTP listener.
//! [`ServerManager`] owns at most one of them and swaps it on restart.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::services::ServeDir;

use crate::deploy::layout::{STATIC_DIR, TEMPLATES_DIR};
use crate::{slog, slog_debug, slog_error, slog_warn, Error, Result};

/// How long [`SiteServer::stop`] waits before aborting the server task.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Builds the router for a site directory.
///
/// Lookups try the directory itself, then `static/`, then `templates/`,
/// so `/` finds `templates/index.html` and `/css/site.css` finds
/// `static/css/site.css`.
pub fn site_router(directory: &Path) -> Router {
    let templates = ServeDir::new(directory.join(TEMPLATES_DIR));
    let assets = ServeDir::new(directory.join(STATIC_DIR)).fallback(templates);
    let serve = ServeDir::new(directory)
        .append_index_html_on_directories(true)
        .fallback(assets);
    Router::new().fallback_service(serve)
}

/// A running server. Dropping the handle also requests shutdown.
pub struct SiteServer {
    local_addr: SocketAddr,
    directory: PathBuf,
    grace: Duration,
    token: CancellationToken,
    handle: JoinHandle<()>,
    _guard: DropGuard,
}

impl SiteServer {
    /// Bind `addr` and serve `directory` on a background task.
    pub async fn start(directory: impl Into<PathBuf>, addr: SocketAddr) -> Result<Self> {
        let directory = directory.into();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::ServerBind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let app = site_router(&directory);
        let token = CancellationToken::new();
        let shutdown = token.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
            {
                slog_error!("Server error: {}", e);
            }
        });

        slog!(
            "Serving {} at http://{}",
            directory.display(),
            local_addr
        );
        Ok(Self {
            local_addr,
            directory,
            grace: DEFAULT_GRACE,
            _guard: token.clone().drop_guard(),
            token,
            handle,
        })
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn url(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// Request shutdown and wait for the listener to close.
    ///
    /// Waits at most the grace period, then aborts the task.
    pub async fn stop(self) {
        let SiteServer {
            local_addr,
            grace,
            token,
            mut handle,
            ..
        } = self;
        token.cancel();

        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => slog_debug!("Server at {} shut down", local_addr),
            Ok(Err(e)) => slog_warn!("Server task at {} ended abnormally: {}", local_addr, e),
            Err(_) => {
                slog_warn!(
                    "Server at {} did not stop within {:?}, aborting",
                    local_addr,
                    grace
                );
                handle.abort();
                let _ = handle.await;
            }
        }
        slog!("Stopped server at {}", local_addr);
    }
}

impl std::fmt::Debug for SiteServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteServer")
            .field("local_addr", &self.local_addr)
            .field("directory", &self.directory)
            .field("grace", &self.grace)
            .finish()
    }
}

/// Owns at most one [`SiteServer`] bound to a fixed address.
#[derive(Debug)]
pub struct ServerManager {
    addr: SocketAddr,
    grace: Duration,
    current: Option<SiteServer>,
}

impl ServerManager {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            grace: DEFAULT_GRACE,
            current: None,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Serve `directory`, stopping any server that is already running.
    pub async fn start(&mut self, directory: impl Into<PathBuf>) -> Result<SocketAddr> {
        self.stop().await;
        let server = SiteServer::start(directory, self.addr)
            .await?
            .with_grace(self.grace);
        let local_addr = server.local_addr();
        self.current = Some(server);
        Ok(local_addr)
    }

    /// Stop the running server. Does nothing when stopped.
    pub async fn stop(&mut self) {
        if let Some(server) = self.current.take() {
            server.stop().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.current.as_ref().map(|s| s.directory())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.current.as_ref().map(|s| s.local_addr())
    }
}

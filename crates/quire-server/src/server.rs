//! Static file server over the published output.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Default port for `serve` and `preview`.
pub const DEFAULT_PORT: u16 = 4003;

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),
}

/// Configuration for the static server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Kill leftover listeners on the port (and the live-reload port) first
    pub reap_ports: bool,

    /// Live-reload port left behind by older gitbook servers
    pub livereload_port: u16,

    /// Log every request
    pub log_requests: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            reap_ports: true,
            livereload_port: quire_build::LIVERELOAD_PORT,
            log_requests: false,
        }
    }
}

struct Running {
    addr: SocketAddr,
    dir: PathBuf,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// At most one running static server.
pub struct StaticServer {
    config: ServerConfig,
    running: Option<Running>,
}

impl StaticServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address of the running server.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    /// Serve `dir` on `port`. Starting an already running server is a no-op.
    pub async fn start(&mut self, dir: &Path, port: u16) -> Result<SocketAddr, ServerError> {
        if let Some(running) = &self.running {
            tracing::debug!(
                "Server already serving {} at http://{}",
                running.dir.display(),
                running.addr
            );
            return Ok(running.addr);
        }

        let addr: SocketAddr = format!("{}:{}", self.config.host, port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.config.host, port)))?;

        if self.config.reap_ports {
            quire_build::reap_server_ports(port, self.config.livereload_port).await;
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let app = router(dir, self.config.log_requests);
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        });

        tracing::info!("Serving {} at http://{}", dir.display(), addr);

        self.running = Some(Running {
            addr,
            dir: dir.to_path_buf(),
            shutdown,
            task,
        });

        Ok(addr)
    }

    /// Stop the server and wait for it to close. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(());
        if let Err(e) = running.task.await {
            tracing::warn!("Server task ended abnormally: {}", e);
        }
        tracing::debug!("Server on {} stopped", running.addr);
    }
}

/// Router serving the files under `dir`, `index.html` for directories.
pub fn router(dir: &Path, log_requests: bool) -> Router {
    let app = Router::new().fallback_service(ServeDir::new(dir));
    if log_requests {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

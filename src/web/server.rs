use std::net::SocketAddr;

use axum::{extract::State, response::Html, routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::core::monitor::snapshot::{SnapshotReceiver, StatusSnapshot};
use crate::error::{HostwatchError, Result};

const INDEX_HTML: &str = include_str!("index.html");

/// Read-only HTTP view of the latest status snapshot
pub struct StatusServer {
    host: String,
    port: u16,
    snapshots: SnapshotReceiver,
}

impl StatusServer {
    pub fn new(host: impl Into<String>, port: u16, snapshots: SnapshotReceiver) -> Self {
        Self {
            host: host.into(),
            port,
            snapshots,
        }
    }

    pub fn router(snapshots: SnapshotReceiver) -> Router {
        Router::new()
            .route("/", get(serve_index))
            .route("/status", get(serve_status))
            .with_state(snapshots)
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let host = if self.host == "localhost" {
            "127.0.0.1"
        } else {
            &self.host
        };
        let addr: SocketAddr = format!("{}:{}", host, self.port)
            .parse()
            .map_err(|e| HostwatchError::server(format!("invalid address {}: {}", host, e)))?;

        TcpListener::bind(addr)
            .await
            .map_err(|e| HostwatchError::server(format!("failed to bind {}: {}", addr, e)))
    }

    /// Serve on an already bound listener until shutdown
    pub async fn serve(
        listener: TcpListener,
        snapshots: SnapshotReceiver,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        let app = Self::router(snapshots);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await
            .map_err(|e| HostwatchError::server(e.to_string()))
    }

    /// Bind and serve; a failure is logged and the monitor keeps running
    pub async fn run(self, shutdown: broadcast::Receiver<()>) {
        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                log::error!("Remote status endpoint disabled: {}", e);
                return;
            }
        };

        if let Ok(addr) = listener.local_addr() {
            log::info!("Status endpoint listening on http://{}", addr);
        }

        if let Err(e) = Self::serve(listener, self.snapshots, shutdown).await {
            log::error!("Status endpoint stopped: {}", e);
        }
    }
}

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn serve_status(State(snapshots): State<SnapshotReceiver>) -> Json<StatusSnapshot> {
    let snapshot = snapshots.borrow().clone();
    Json(snapshot.as_ref().clone())
}

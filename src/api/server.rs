//! API Server
//!
//! Binds the REST router and serves it until shutdown is requested or the
//! process receives Ctrl-C.

use crate::error::{Error, Result};
use crate::registry::NodeRegistry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

use super::rest::RestRouter;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// REST API bind address
    pub rest_addr: SocketAddr,
    /// Run used when a request names none
    pub default_run_id: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            default_run_id: "default".to_string(),
            request_timeout_secs: 30,
        }
    }
}

// =============================================================================
// API Server
// =============================================================================

/// REST API server for the node registry
pub struct ApiServer {
    config: ApiServerConfig,
    registry: Arc<NodeRegistry>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, registry: Arc<NodeRegistry>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            registry,
            shutdown_tx,
        }
    }

    /// Build the router this server serves
    pub fn router(&self) -> axum::Router {
        RestRouter::new(self.registry.clone(), self.config.default_run_id.clone())
            .with_request_timeout(Duration::from_secs(self.config.request_timeout_secs))
            .build()
    }

    /// Run the API server until shutdown
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.rest_addr;
        let app = self.router();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            Error::Internal(format!("Failed to bind REST server: {}", e))
        })?;

        info!("REST API listening on {}", addr);
        info!("  Store: {}", self.registry.store_name());
        info!("  Default run: {}", self.config.default_run_id);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_rx.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                info!("REST server shutting down");
            })
            .await
            .map_err(|e| Error::Internal(format!("REST server error: {}", e)))?;

        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

//! Node Registry Service
//!
//! Serves the node registry over HTTP, backed by SQLite or by a sharded
//! in-memory store.

use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use node_registry::{
    ApiServer, ApiServerConfig, Error, NodeRegistry, NodeStore, Result, ShardedMemoryStore,
    SqliteNodeStore, SqliteStoreConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Durable SQLite database
    Sqlite,
    /// Non-persistent sharded map
    Memory,
}

/// Node Registry - registration service for distributed worker nodes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8000")]
    api_addr: String,

    /// Store backend
    #[arg(long, env = "STORE", value_enum, default_value = "sqlite")]
    store: StoreKind,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://node_registry.db")]
    database_url: String,

    /// Maximum pooled database connections
    #[arg(long, env = "MAX_CONNECTIONS", default_value = "8")]
    max_connections: u32,

    /// Run assigned to requests that name none
    #[arg(long, env = "DEFAULT_RUN_ID", default_value = "default")]
    default_run_id: String,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "30")]
    request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args)?;

    info!("Starting Node Registry");
    info!("  Version: {}", node_registry::VERSION);
    info!("  REST API: {}", args.api_addr);
    info!("  Store: {:?}", args.store);

    let store = open_store(&args).await?;
    let registry = NodeRegistry::new(store)?;

    // Log registry events
    let mut events = registry.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(kind = event.kind(), ?event, "Registry event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Registry event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let api_config = ApiServerConfig {
        rest_addr: args.api_addr.parse().map_err(|e| {
            Error::Configuration(format!("Invalid REST API address: {}", e))
        })?,
        default_run_id: args.default_run_id.clone(),
        request_timeout_secs: args.request_timeout_secs,
    };

    let api_server = ApiServer::new(api_config, registry);
    api_server.run().await?;

    info!("Node registry shutdown complete");
    Ok(())
}

// =============================================================================
// Store Setup
// =============================================================================

async fn open_store(args: &Args) -> Result<Arc<dyn NodeStore>> {
    match args.store {
        StoreKind::Sqlite => {
            let config = SqliteStoreConfig {
                database_url: args.database_url.clone(),
                max_connections: args.max_connections,
                acquire_timeout: Duration::from_secs(args.request_timeout_secs.max(1)),
            };
            Ok(Arc::new(SqliteNodeStore::open(&config).await?))
        }
        StoreKind::Memory => {
            warn!("Using in-memory store; registrations are lost on exit");
            Ok(Arc::new(ShardedMemoryStore::new()))
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "tower=warn", "sqlx=warn", "axum=info"] {
        let directive = directive
            .parse::<Directive>()
            .map_err(|e| Error::Configuration(format!("Invalid log directive {}: {}", directive, e)))?;
        filter = filter.add_directive(directive);
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

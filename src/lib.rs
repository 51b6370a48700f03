//! Node Registry
//!
//! A registry of record for distributed worker nodes. Nodes register under a
//! run with their capability metadata (image capacity, RAM, CPU); a
//! coordinator lists, inspects, updates and removes them over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     REST API (axum)                      │
//! │  /register  /nodes  /nodes/{client_id}  /metrics  /ready │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │
//!                  ┌───────────┴───────────┐
//!                  │     NodeRegistry      │──► RegistryEvent (broadcast)
//!                  │  (events + metrics)   │──► Prometheus counters
//!                  └───────────┬───────────┘
//!                              │ NodeStore
//!              ┌───────────────┴───────────────┐
//!   ┌──────────┴──────────┐         ┌──────────┴──────────┐
//!   │   SqliteNodeStore   │         │ ShardedMemoryStore  │
//!   │ (pooled, durable)   │         │  (64-way sharded)   │
//!   └─────────────────────┘         └─────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: REST router and server
//! - [`registry`]: Node records, stores and the registry service
//! - [`metrics`]: Prometheus metrics
//! - [`error`]: Error types and handling

pub mod api;
pub mod error;
pub mod metrics;
pub mod registry;

// Re-export commonly used types
pub use api::{ApiServer, ApiServerConfig, RestRouter};

pub use error::{Error, Result};

pub use registry::{
    NodeKey, NodePatch, NodeRecord, NodeRegistry, NodeStore, RegisterOutcome, RegistryEvent,
    ShardedMemoryStore, SqliteNodeStore, SqliteStoreConfig, UpdateOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

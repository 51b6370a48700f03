//! Node Registry Module
//!
//! Node records, the `NodeStore` seam with its SQLite and sharded in-memory
//! backends, and the `NodeRegistry` service the API talks to.

pub mod events;
pub mod memory;
pub mod node;
pub mod node_registry;
pub mod sqlite;
pub mod store;

pub use events::*;
pub use memory::{ShardedMemoryStore, STORE_SHARD_COUNT};
pub use node::*;
pub use node_registry::*;
pub use sqlite::{SqliteNodeStore, SqliteStoreConfig};
pub use store::{NodeStore, SharedNodeStore};

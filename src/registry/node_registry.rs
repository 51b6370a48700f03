//! Node Registry Service
//!
//! Front door to the registry store. Every API action goes through here so
//! that lifecycle events and operation metrics stay in one place.

use crate::error::Result;
use crate::metrics::RegistryMetrics;
use crate::registry::events::RegistryEvent;
use crate::registry::node::{NodeKey, NodePatch, NodeRecord, RegisterOutcome, UpdateOutcome};
use crate::registry::store::SharedNodeStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

// =============================================================================
// Statistics
// =============================================================================

/// Snapshot of registry operation counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStatsSnapshot {
    pub registrations: u64,
    pub duplicate_registrations: u64,
    pub updates: u64,
    pub deregistrations: u64,
}

// =============================================================================
// Node Registry
// =============================================================================

/// Node registry over a pluggable store
pub struct NodeRegistry {
    store: SharedNodeStore,
    metrics: RegistryMetrics,
    event_sender: broadcast::Sender<RegistryEvent>,
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("store", &self.store.name())
            .finish()
    }
}

impl NodeRegistry {
    /// Create a registry over the given store
    pub fn new(store: SharedNodeStore) -> Result<Arc<Self>> {
        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Arc::new(Self {
            store,
            metrics: RegistryMetrics::new()?,
            event_sender,
        }))
    }

    /// Get an event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.event_sender.subscribe()
    }

    /// Name of the backing store
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Register a node; an already registered key is left untouched
    pub async fn register(&self, key: &NodeKey, number_images: Option<u32>) -> Result<RegisterOutcome> {
        let outcome = self.store.register(key, number_images).await?;

        match outcome {
            RegisterOutcome::Created => {
                info!(client_id = %key.client_id, run_id = %key.run_id, "Node registered");
                self.metrics.registrations.inc();
                let _ = self.event_sender.send(RegistryEvent::NodeRegistered {
                    client_id: key.client_id.to_string(),
                    run_id: key.run_id.clone(),
                    number_images,
                });
            }
            RegisterOutcome::AlreadyExists => {
                debug!(client_id = %key.client_id, run_id = %key.run_id, "Node already registered");
                self.metrics.duplicate_registrations.inc();
            }
        }

        Ok(outcome)
    }

    /// Get a node by key
    pub async fn get(&self, key: &NodeKey) -> Result<Option<NodeRecord>> {
        self.store.get(key).await
    }

    /// Apply a patch to a node
    pub async fn update(&self, key: &NodeKey, patch: &NodePatch) -> Result<UpdateOutcome> {
        let outcome = self.store.update(key, patch).await?;

        if outcome == UpdateOutcome::Updated {
            let fields = patch.field_names();
            info!(client_id = %key.client_id, run_id = %key.run_id, ?fields, "Node updated");
            self.metrics.updates.inc();
            let _ = self.event_sender.send(RegistryEvent::NodeUpdated {
                client_id: key.client_id.to_string(),
                run_id: key.run_id.clone(),
                fields: fields.into_iter().map(String::from).collect(),
            });
        } else {
            debug!(client_id = %key.client_id, run_id = %key.run_id, ?outcome, "Node not updated");
        }

        Ok(outcome)
    }

    /// All registered nodes
    pub async fn list(&self) -> Result<Vec<NodeRecord>> {
        self.store.list().await
    }

    /// Delete a node; deleting an unknown node is not an error
    pub async fn deregister(&self, key: &NodeKey) -> Result<bool> {
        let removed = self.store.delete_one(key).await?;

        if removed {
            info!(client_id = %key.client_id, run_id = %key.run_id, "Node deregistered");
            self.metrics.deregistrations.inc();
            let _ = self.event_sender.send(RegistryEvent::NodeDeregistered {
                client_id: key.client_id.to_string(),
                run_id: key.run_id.clone(),
            });
        }

        Ok(removed)
    }

    /// Delete every node
    pub async fn clear(&self) -> Result<u64> {
        let removed = self.store.delete_all().await?;

        info!(removed, "All nodes deregistered");
        self.metrics.deregistrations.inc_by(removed);
        let _ = self.event_sender.send(RegistryEvent::RegistryCleared { removed });

        Ok(removed)
    }

    /// Check if the backing store is reachable
    pub async fn health_check(&self) -> Result<bool> {
        self.store.health_check().await
    }

    /// Get operation counters
    pub fn stats(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            registrations: self.metrics.registrations.get(),
            duplicate_registrations: self.metrics.duplicate_registrations.get(),
            updates: self.metrics.updates.get(),
            deregistrations: self.metrics.deregistrations.get(),
        }
    }

    /// Refresh the node gauge and render metrics for scraping
    pub async fn render_metrics(&self) -> Result<(String, Vec<u8>)> {
        let nodes = self.store.list().await?.len();
        self.metrics.nodes.set(nodes as i64);
        self.metrics.encode()
    }
}

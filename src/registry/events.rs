//! Registry Events
//!
//! Events emitted by the node registry for external consumers to react to
//! node lifecycle changes.

use serde::{Deserialize, Serialize};

/// Events emitted by the node registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryEvent {
    /// A new node was registered
    NodeRegistered {
        client_id: String,
        run_id: String,
        number_images: Option<u32>,
    },

    /// A node's capability metadata was updated
    NodeUpdated {
        client_id: String,
        run_id: String,
        fields: Vec<String>,
    },

    /// A node was deleted
    NodeDeregistered { client_id: String, run_id: String },

    /// Every node was deleted
    RegistryCleared { removed: u64 },
}

impl RegistryEvent {
    /// Get the client ID associated with this event
    pub fn client_id(&self) -> Option<&str> {
        match self {
            RegistryEvent::NodeRegistered { client_id, .. } => Some(client_id),
            RegistryEvent::NodeUpdated { client_id, .. } => Some(client_id),
            RegistryEvent::NodeDeregistered { client_id, .. } => Some(client_id),
            RegistryEvent::RegistryCleared { .. } => None,
        }
    }

    /// Short event name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::NodeRegistered { .. } => "node_registered",
            RegistryEvent::NodeUpdated { .. } => "node_updated",
            RegistryEvent::NodeDeregistered { .. } => "node_deregistered",
            RegistryEvent::RegistryCleared { .. } => "registry_cleared",
        }
    }
}

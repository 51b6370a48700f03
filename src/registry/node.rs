//! Node Records
//!
//! The registry's single entity, its composite identity, and the
//! structured patch applied by updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

// =============================================================================
// Node Key
// =============================================================================

/// Identity of a node record: a client registered under a run
///
/// The pair is unique across the registry. The same client may appear once
/// per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub client_id: Uuid,
    pub run_id: String,
}

impl NodeKey {
    pub fn new(client_id: Uuid, run_id: impl Into<String>) -> Self {
        Self {
            client_id,
            run_id: run_id.into(),
        }
    }

    /// Get the shard index for this key
    #[inline]
    pub fn shard_index(&self, shard_count: usize) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        (hasher.finish() as usize) % shard_count
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.client_id, self.run_id)
    }
}

// =============================================================================
// Node Record
// =============================================================================

/// A registered node and its reported capabilities
///
/// Optional attributes serialize as explicit `null`, never omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub client_id: Uuid,
    pub run_id: String,
    pub registered_at: DateTime<Utc>,
    pub number_images: Option<u32>,
    pub ram: Option<String>,
    pub cpu: Option<String>,
}

impl NodeRecord {
    /// Create a freshly registered record
    pub fn new(key: NodeKey, number_images: Option<u32>) -> Self {
        Self {
            client_id: key.client_id,
            run_id: key.run_id,
            registered_at: Utc::now(),
            number_images,
            ram: None,
            cpu: None,
        }
    }

    /// Identity of this record
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.client_id, self.run_id.clone())
    }

    /// Overwrite every field present in the patch
    pub fn apply(&mut self, patch: &NodePatch) {
        if let Some(number_images) = patch.number_images {
            self.number_images = Some(number_images);
        }
        if let Some(ram) = &patch.ram {
            self.ram = Some(ram.clone());
        }
        if let Some(cpu) = &patch.cpu {
            self.cpu = Some(cpu.clone());
        }
    }
}

// =============================================================================
// Node Patch
// =============================================================================

/// Fields an update may change
///
/// `None` means "leave untouched", never "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default)]
    pub number_images: Option<u32>,
    #[serde(default)]
    pub ram: Option<String>,
    #[serde(default)]
    pub cpu: Option<String>,
}

impl NodePatch {
    /// True when the patch carries no field to change
    pub fn is_empty(&self) -> bool {
        self.number_images.is_none() && self.ram.is_none() && self.cpu.is_none()
    }

    /// Names of the fields this patch sets, for logging
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.number_images.is_some() {
            names.push("number_images");
        }
        if self.ram.is_some() {
            names.push("ram");
        }
        if self.cpu.is_some() {
            names.push("cpu");
        }
        names
    }
}

// =============================================================================
// Operation Outcomes
// =============================================================================

/// Result of an insert-if-absent registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A new record was stored
    Created,
    /// The key was already registered; the stored record is untouched
    AlreadyExists,
}

/// Result of applying a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record was rewritten with every requested field
    Updated,
    /// The patch carried no fields; nothing was written
    NoOp,
    /// No record matches the key
    NotFound,
}

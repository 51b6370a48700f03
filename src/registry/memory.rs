//! Sharded In-Memory Store
//!
//! A 64-way sharded, non-persistent node store. Records live only as long
//! as the process; useful for tests, benchmarks and throwaway runs.

use crate::error::{Error, Result};
use crate::registry::node::{NodeKey, NodePatch, NodeRecord, RegisterOutcome, UpdateOutcome};
use crate::registry::store::NodeStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// =============================================================================
// Constants
// =============================================================================

/// Number of shards in the store
pub const STORE_SHARD_COUNT: usize = 64;

// =============================================================================
// Store Shard
// =============================================================================

/// A single shard of the store
///
/// A register or update on a key holds the shard's write lock for the whole
/// check-and-write, so operations on one identity are serialized.
#[repr(C, align(64))]
struct StoreShard {
    /// Records in this shard, ordered by key
    nodes: RwLock<BTreeMap<NodeKey, NodeRecord>>,
    /// Number of records in this shard
    node_count: AtomicU64,
}

impl std::fmt::Debug for StoreShard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreShard")
            .field("node_count", &self.node_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl StoreShard {
    fn new() -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            node_count: AtomicU64::new(0),
        }
    }

    fn insert_if_absent(&self, key: &NodeKey, number_images: Option<u32>) -> RegisterOutcome {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(key) {
            return RegisterOutcome::AlreadyExists;
        }
        nodes.insert(key.clone(), NodeRecord::new(key.clone(), number_images));
        self.node_count.fetch_add(1, Ordering::Relaxed);
        RegisterOutcome::Created
    }

    fn get(&self, key: &NodeKey) -> Option<NodeRecord> {
        self.nodes.read().get(key).cloned()
    }

    fn update(&self, key: &NodeKey, patch: &NodePatch) -> UpdateOutcome {
        let mut nodes = self.nodes.write();
        match nodes.get_mut(key) {
            None => UpdateOutcome::NotFound,
            Some(_) if patch.is_empty() => UpdateOutcome::NoOp,
            Some(record) => {
                record.apply(patch);
                UpdateOutcome::Updated
            }
        }
    }

    fn remove(&self, key: &NodeKey) -> bool {
        let removed = self.nodes.write().remove(key).is_some();
        if removed {
            self.node_count.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    fn clear(&self) -> u64 {
        let mut nodes = self.nodes.write();
        let removed = nodes.len() as u64;
        nodes.clear();
        self.node_count.store(0, Ordering::Relaxed);
        removed
    }

    fn records(&self) -> Vec<NodeRecord> {
        self.nodes.read().values().cloned().collect()
    }
}

// =============================================================================
// Sharded Memory Store
// =============================================================================

/// In-memory node store sharded by key hash
pub struct ShardedMemoryStore {
    shards: Box<[StoreShard]>,
    /// Is the store accepting operations
    available: AtomicBool,
}

impl std::fmt::Debug for ShardedMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedMemoryStore")
            .field("nodes", &self.node_count())
            .finish()
    }
}

impl ShardedMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        let shards: Vec<StoreShard> = (0..STORE_SHARD_COUNT).map(|_| StoreShard::new()).collect();
        Self {
            shards: shards.into_boxed_slice(),
            available: AtomicBool::new(true),
        }
    }

    fn shard(&self, key: &NodeKey) -> &StoreShard {
        &self.shards[key.shard_index(STORE_SHARD_COUNT)]
    }

    /// Total number of records across shards
    pub fn node_count(&self) -> u64 {
        self.shards
            .iter()
            .map(|s| s.node_count.load(Ordering::Relaxed))
            .sum()
    }

    /// Set availability (for testing)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable {
                store: self.name().to_string(),
            })
        }
    }
}

impl Default for ShardedMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStore for ShardedMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn register(&self, key: &NodeKey, number_images: Option<u32>) -> Result<RegisterOutcome> {
        self.ensure_available()?;
        Ok(self.shard(key).insert_if_absent(key, number_images))
    }

    async fn get(&self, key: &NodeKey) -> Result<Option<NodeRecord>> {
        self.ensure_available()?;
        Ok(self.shard(key).get(key))
    }

    async fn update(&self, key: &NodeKey, patch: &NodePatch) -> Result<UpdateOutcome> {
        self.ensure_available()?;
        Ok(self.shard(key).update(key, patch))
    }

    async fn list(&self) -> Result<Vec<NodeRecord>> {
        self.ensure_available()?;
        let mut records: Vec<NodeRecord> = self.shards.iter().flat_map(|s| s.records()).collect();
        records.sort_by(|a, b| (a.client_id, &a.run_id).cmp(&(b.client_id, &b.run_id)));
        Ok(records)
    }

    async fn delete_one(&self, key: &NodeKey) -> Result<bool> {
        self.ensure_available()?;
        Ok(self.shard(key).remove(key))
    }

    async fn delete_all(&self) -> Result<u64> {
        self.ensure_available()?;
        Ok(self.shards.iter().map(|s| s.clear()).sum())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.available.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::store::contract;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_duplicate_register_is_noop() {
        contract::duplicate_register_is_noop(&ShardedMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_same_client_in_two_runs() {
        contract::same_client_in_two_runs(&ShardedMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_partial_update() {
        contract::partial_update_keeps_other_fields(&ShardedMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_empty_update_is_noop() {
        contract::empty_update_is_noop(&ShardedMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_update_missing() {
        contract::update_missing_is_not_found(&ShardedMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_delete_missing() {
        contract::delete_missing_is_ok(&ShardedMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_delete_all() {
        contract::delete_all_empties_store(&ShardedMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_scenario() {
        contract::register_update_delete_scenario(&ShardedMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_node_count_tracks_shards() {
        let store = ShardedMemoryStore::new();
        for _ in 0..100 {
            store.register(&NodeKey::new(Uuid::new_v4(), "run1"), None).await.unwrap();
        }
        assert_eq!(store.node_count(), 100);

        store.delete_all().await.unwrap();
        assert_eq!(store.node_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_register_same_key() {
        let store = Arc::new(ShardedMemoryStore::new());
        let key = NodeKey::new(Uuid::new_v4(), "run1");

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { store.register(&key, Some(i)).await.unwrap() }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() == RegisterOutcome::Created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let store = ShardedMemoryStore::new();
        store.set_available(false);

        let key = NodeKey::new(Uuid::new_v4(), "run1");
        let err = store.register(&key, None).await.unwrap_err();
        assert!(err.is_transient());
        assert!(!store.health_check().await.unwrap());
    }
}

//! Registry Store Trait
//!
//! The storage seam of the registry. Backends enforce key uniqueness
//! themselves and never apply a patch partially.

use crate::error::Result;
use crate::registry::node::{NodeKey, NodePatch, NodeRecord, RegisterOutcome, UpdateOutcome};
use async_trait::async_trait;

// =============================================================================
// NodeStore Trait
// =============================================================================

/// Storage operations over node records
///
/// Every call acquires whatever handle it needs and releases it before
/// returning, on success and on error alike.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Short backend name for logs and errors
    fn name(&self) -> &'static str;

    /// Insert a record with `ram`/`cpu` unset unless the key already exists
    async fn register(&self, key: &NodeKey, number_images: Option<u32>) -> Result<RegisterOutcome>;

    /// Get a record by key
    async fn get(&self, key: &NodeKey) -> Result<Option<NodeRecord>>;

    /// Apply a patch to an existing record
    async fn update(&self, key: &NodeKey, patch: &NodePatch) -> Result<UpdateOutcome>;

    /// All records, in a backend-defined order
    async fn list(&self) -> Result<Vec<NodeRecord>>;

    /// Remove a record
    ///
    /// Returns whether a record was removed. A missing key is not an error.
    async fn delete_one(&self, key: &NodeKey) -> Result<bool>;

    /// Remove every record, returning how many were removed
    async fn delete_all(&self) -> Result<u64>;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// Type alias for a shared store handle
pub type SharedNodeStore = std::sync::Arc<dyn NodeStore>;

/// Contract checks shared by every backend's test module
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    fn key(run_id: &str) -> NodeKey {
        NodeKey::new(Uuid::new_v4(), run_id)
    }

    pub async fn duplicate_register_is_noop(store: &dyn NodeStore) {
        let key = key("run1");

        let first = store.register(&key, Some(10)).await.unwrap();
        assert_eq!(first, RegisterOutcome::Created);
        let before = store.get(&key).await.unwrap().unwrap();

        let second = store.register(&key, Some(99)).await.unwrap();
        assert_eq!(second, RegisterOutcome::AlreadyExists);

        let after = store.get(&key).await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    pub async fn same_client_in_two_runs(store: &dyn NodeStore) {
        let client = Uuid::new_v4();
        let run1 = NodeKey::new(client, "run1");
        let run2 = NodeKey::new(client, "run2");

        store.register(&run1, Some(1)).await.unwrap();
        store.register(&run2, Some(2)).await.unwrap();

        let nodes = store.list().await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(store.get(&run1).await.unwrap().unwrap().number_images, Some(1));
        assert_eq!(store.get(&run2).await.unwrap().unwrap().number_images, Some(2));
    }

    pub async fn partial_update_keeps_other_fields(store: &dyn NodeStore) {
        let key = key("run1");
        store.register(&key, Some(10)).await.unwrap();
        let patch = NodePatch {
            cpu: Some("8 cores".into()),
            ..Default::default()
        };
        assert_eq!(store.update(&key, &patch).await.unwrap(), UpdateOutcome::Updated);

        let patch = NodePatch {
            ram: Some("16GB".into()),
            ..Default::default()
        };
        assert_eq!(store.update(&key, &patch).await.unwrap(), UpdateOutcome::Updated);

        let node = store.get(&key).await.unwrap().unwrap();
        assert_eq!(node.number_images, Some(10));
        assert_eq!(node.ram.as_deref(), Some("16GB"));
        assert_eq!(node.cpu.as_deref(), Some("8 cores"));
    }

    pub async fn empty_update_is_noop(store: &dyn NodeStore) {
        let key = key("run1");
        store.register(&key, Some(3)).await.unwrap();
        let before = store.get(&key).await.unwrap();

        let outcome = store.update(&key, &NodePatch::default()).await.unwrap();
        assert_matches!(outcome, UpdateOutcome::NoOp);
        assert_eq!(store.get(&key).await.unwrap(), before);
    }

    pub async fn update_missing_is_not_found(store: &dyn NodeStore) {
        let key = key("run1");
        let patch = NodePatch {
            ram: Some("4GB".into()),
            ..Default::default()
        };

        assert_matches!(store.update(&key, &patch).await.unwrap(), UpdateOutcome::NotFound);
        assert_matches!(
            store.update(&key, &NodePatch::default()).await.unwrap(),
            UpdateOutcome::NotFound
        );
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    pub async fn delete_missing_is_ok(store: &dyn NodeStore) {
        let kept = key("run1");
        store.register(&kept, None).await.unwrap();

        assert!(!store.delete_one(&key("run1")).await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.delete_one(&kept).await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
    }

    pub async fn delete_all_empties_store(store: &dyn NodeStore) {
        for _ in 0..5 {
            store.register(&key("run1"), None).await.unwrap();
        }
        assert_eq!(store.delete_all().await.unwrap(), 5);
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }

    pub async fn register_update_delete_scenario(store: &dyn NodeStore) {
        let key = key("run1");
        store.register(&key, Some(10)).await.unwrap();

        let node = store.get(&key).await.unwrap().unwrap();
        assert_eq!(node.client_id, key.client_id);
        assert_eq!(node.run_id, "run1");
        assert_eq!(node.number_images, Some(10));
        assert_eq!(node.ram, None);
        assert_eq!(node.cpu, None);

        let patch = NodePatch {
            ram: Some("16GB".into()),
            ..Default::default()
        };
        store.update(&key, &patch).await.unwrap();
        let updated = store.get(&key).await.unwrap().unwrap();
        assert_eq!(updated.number_images, Some(10));
        assert_eq!(updated.ram.as_deref(), Some("16GB"));
        assert_eq!(updated.cpu, None);
        assert_eq!(updated.registered_at, node.registered_at);

        store.delete_one(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
    }
}

//! SQLite Node Store
//!
//! Durable node store backed by a pooled SQLite database. Uniqueness of
//! `(client_id, run_id)` is a table constraint; registration is an
//! insert-if-absent and updates go through one fixed parameterized statement.

use crate::error::{Error, Result};
use crate::registry::node::{NodeKey, NodePatch, NodeRecord, RegisterOutcome, UpdateOutcome};
use crate::registry::store::NodeStore;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

// =============================================================================
// Schema & Statements
// =============================================================================

const CREATE_NODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    registered_at TEXT NOT NULL,
    number_images INTEGER,
    ram TEXT,
    cpu TEXT,
    UNIQUE (client_id, run_id)
)
"#;

const INSERT_NODE: &str = "INSERT INTO nodes (client_id, run_id, registered_at, number_images) \
     VALUES (?1, ?2, ?3, ?4) ON CONFLICT (client_id, run_id) DO NOTHING";

const SELECT_NODE: &str = "SELECT client_id, run_id, registered_at, number_images, ram, cpu \
     FROM nodes WHERE client_id = ?1 AND run_id = ?2";

const SELECT_ALL_NODES: &str =
    "SELECT client_id, run_id, registered_at, number_images, ram, cpu FROM nodes ORDER BY id";

const NODE_EXISTS: &str = "SELECT 1 FROM nodes WHERE client_id = ?1 AND run_id = ?2";

// NULL parameters keep the stored column.
const UPDATE_NODE: &str = "UPDATE nodes SET \
     number_images = COALESCE(?1, number_images), \
     ram = COALESCE(?2, ram), \
     cpu = COALESCE(?3, cpu) \
     WHERE client_id = ?4 AND run_id = ?5";

const DELETE_NODE: &str = "DELETE FROM nodes WHERE client_id = ?1 AND run_id = ?2";

const DELETE_ALL_NODES: &str = "DELETE FROM nodes";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the SQLite store
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Database URL, e.g. `sqlite://node_registry.db`
    pub database_url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// How long an operation waits for a pooled connection
    pub acquire_timeout: Duration,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://node_registry.db".to_string(),
            max_connections: 8,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// SQLite Store
// =============================================================================

/// Node store persisted in SQLite
#[derive(Debug, Clone)]
pub struct SqliteNodeStore {
    pool: SqlitePool,
}

impl SqliteNodeStore {
    /// Open (creating if missing) the database and ensure the schema exists
    pub async fn open(config: &SqliteStoreConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.acquire_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url = %config.database_url, "SQLite node store opened");
        Ok(store)
    }

    /// Open a private in-memory database
    ///
    /// The pool holds exactly one connection that is never reaped, since an
    /// in-memory database lives only as long as its connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_NODES_TABLE).execute(&self.pool).await?;
        debug!("nodes table ready");
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn exists(&self, key: &NodeKey) -> Result<bool> {
        let row = sqlx::query(NODE_EXISTS)
            .bind(key.client_id.to_string())
            .bind(&key.run_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<NodeRecord> {
    let client_id: String = row.try_get("client_id")?;
    let client_id = Uuid::parse_str(&client_id)
        .map_err(|e| Error::CorruptRecord(format!("client_id {}: {}", client_id, e)))?;

    Ok(NodeRecord {
        client_id,
        run_id: row.try_get("run_id")?,
        registered_at: row.try_get("registered_at")?,
        number_images: row.try_get("number_images")?,
        ram: row.try_get("ram")?,
        cpu: row.try_get("cpu")?,
    })
}

#[async_trait]
impl NodeStore for SqliteNodeStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn register(&self, key: &NodeKey, number_images: Option<u32>) -> Result<RegisterOutcome> {
        let result = sqlx::query(INSERT_NODE)
            .bind(key.client_id.to_string())
            .bind(&key.run_id)
            .bind(Utc::now())
            .bind(number_images)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Ok(RegisterOutcome::AlreadyExists)
        } else {
            Ok(RegisterOutcome::Created)
        }
    }

    async fn get(&self, key: &NodeKey) -> Result<Option<NodeRecord>> {
        let row = sqlx::query(SELECT_NODE)
            .bind(key.client_id.to_string())
            .bind(&key.run_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn update(&self, key: &NodeKey, patch: &NodePatch) -> Result<UpdateOutcome> {
        if patch.is_empty() {
            return if self.exists(key).await? {
                Ok(UpdateOutcome::NoOp)
            } else {
                Ok(UpdateOutcome::NotFound)
            };
        }

        let result = sqlx::query(UPDATE_NODE)
            .bind(patch.number_images)
            .bind(patch.ram.as_deref())
            .bind(patch.cpu.as_deref())
            .bind(key.client_id.to_string())
            .bind(&key.run_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            Ok(UpdateOutcome::NotFound)
        } else {
            Ok(UpdateOutcome::Updated)
        }
    }

    async fn list(&self) -> Result<Vec<NodeRecord>> {
        let rows = sqlx::query(SELECT_ALL_NODES).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn delete_one(&self, key: &NodeKey) -> Result<bool> {
        let result = sqlx::query(DELETE_NODE)
            .bind(key.client_id.to_string())
            .bind(&key.run_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query(DELETE_ALL_NODES).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(sqlx::query("SELECT 1").execute(&self.pool).await.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::store::contract;
    use tempfile::TempDir;

    async fn store() -> SqliteNodeStore {
        SqliteNodeStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_register_is_noop() {
        contract::duplicate_register_is_noop(&store().await).await;
    }

    #[tokio::test]
    async fn test_same_client_in_two_runs() {
        contract::same_client_in_two_runs(&store().await).await;
    }

    #[tokio::test]
    async fn test_partial_update() {
        contract::partial_update_keeps_other_fields(&store().await).await;
    }

    #[tokio::test]
    async fn test_empty_update_is_noop() {
        contract::empty_update_is_noop(&store().await).await;
    }

    #[tokio::test]
    async fn test_update_missing() {
        contract::update_missing_is_not_found(&store().await).await;
    }

    #[tokio::test]
    async fn test_delete_missing() {
        contract::delete_missing_is_ok(&store().await).await;
    }

    #[tokio::test]
    async fn test_delete_all() {
        contract::delete_all_empties_store(&store().await).await;
    }

    #[tokio::test]
    async fn test_scenario() {
        contract::register_update_delete_scenario(&store().await).await;
    }

    #[tokio::test]
    async fn test_unique_constraint_enforced_by_table() {
        let store = store().await;
        let key = NodeKey::new(Uuid::new_v4(), "run1");
        store.register(&key, None).await.unwrap();

        let raw = sqlx::query(
            "INSERT INTO nodes (client_id, run_id, registered_at) VALUES (?1, ?2, ?3)",
        )
        .bind(key.client_id.to_string())
        .bind(&key.run_id)
        .bind(Utc::now())
        .execute(&store.pool)
        .await;

        match raw {
            Err(sqlx::Error::Database(e)) => assert!(e.is_unique_violation()),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let config = SqliteStoreConfig {
            database_url: format!("sqlite://{}", dir.path().join("nodes.db").display()),
            ..Default::default()
        };
        let key = NodeKey::new(Uuid::new_v4(), "run1");

        let store = SqliteNodeStore::open(&config).await.unwrap();
        store.register(&key, Some(7)).await.unwrap();
        store
            .update(
                &key,
                &NodePatch {
                    cpu: Some("4 cores".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteNodeStore::open(&config).await.unwrap();
        let node = reopened.get(&key).await.unwrap().unwrap();
        assert_eq!(node.number_images, Some(7));
        assert_eq!(node.cpu.as_deref(), Some("4 cores"));
        assert!(reopened.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_client_id() {
        let store = store().await;
        sqlx::query("INSERT INTO nodes (client_id, run_id, registered_at) VALUES ('not-a-uuid', 'run1', ?1)")
            .bind(Utc::now())
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.list().await.unwrap_err();
        assert!(matches!(err, Error::CorruptRecord(_)));
    }
}

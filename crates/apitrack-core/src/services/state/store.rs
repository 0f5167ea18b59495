//! Phase state store
//!
//! A durable key/value map scoped to one CI job. The `pre` and `checkpoint`
//! phases write to it; `post` reads from it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::Database;
use crate::error::{Error, Result};

// ============================================================================
// Keys
// ============================================================================

/// Keys written between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    /// JSON resources map captured by `pre`
    StartingRateLimits,
    /// Epoch milliseconds when `pre` captured its snapshot
    StartTime,
    /// JSON resources map captured by `checkpoint`
    CheckpointRateLimits,
    /// Epoch milliseconds when `checkpoint` captured its snapshot
    CheckpointTime,
    /// `"true"` when `pre` had no token and later phases should do nothing
    SkipPost,
}

impl StateKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::StartingRateLimits => "starting_rate_limits",
            StateKey::StartTime => "start_time",
            StateKey::CheckpointRateLimits => "checkpoint_rate_limits",
            StateKey::CheckpointTime => "checkpoint_time",
            StateKey::SkipPost => "skip_post",
        }
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Store Trait
// ============================================================================

/// Storage for values handed from one phase to the next
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Save a value, replacing any previous one
    async fn save(&self, key: StateKey, value: &str) -> Result<()>;

    /// Load a value if one was saved
    async fn load(&self, key: StateKey) -> Result<Option<String>>;

    /// Remove every value for this job
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// SqliteStateStore
// ============================================================================

/// SQLite-backed store; rows are scoped by job id
pub struct SqliteStateStore {
    pool: SqlitePool,
    job_id: String,
}

impl SqliteStateStore {
    /// Create a store for the given job over an open database
    pub fn new(db: &Database, job_id: impl Into<String>) -> Self {
        Self {
            pool: db.pool.clone(),
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn save(&self, key: StateKey, value: &str) -> Result<()> {
        log::debug!("[apitrack:state] Saving {} for job {}", key, self.job_id);

        sqlx::query(
            r#"
            INSERT INTO phase_state (job_id, key, value, updated_at)
            VALUES (?, ?, ?, datetime('now'))
            ON CONFLICT (job_id, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.job_id)
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, key: StateKey) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM phase_state WHERE job_id = ? AND key = ?")
                .bind(&self.job_id)
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;

        log::debug!(
            "[apitrack:state] Loaded {} for job {}: {}",
            key,
            self.job_id,
            if value.is_some() { "present" } else { "absent" }
        );
        Ok(value)
    }

    async fn clear(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM phase_state WHERE job_id = ?")
            .bind(&self.job_id)
            .execute(&self.pool)
            .await?;

        log::debug!(
            "[apitrack:state] Cleared {} values for job {}",
            result.rows_affected(),
            self.job_id
        );
        Ok(())
    }
}

// ============================================================================
// MemoryStateStore
// ============================================================================

/// In-process store, for tests and single-process runs
#[derive(Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<StateKey, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store
    pub fn with_values<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (StateKey, V)>,
        V: Into<String>,
    {
        let map = values.into_iter().map(|(k, v)| (k, v.into())).collect();
        Self {
            values: Mutex::new(map),
        }
    }

    /// Synchronous read, convenient in assertions
    pub fn get(&self, key: StateKey) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(&key).cloned())
    }

    /// Keys currently holding a value, sorted by name
    pub fn keys(&self) -> Vec<StateKey> {
        let mut keys: Vec<StateKey> = self
            .values
            .lock()
            .map(|values| values.keys().copied().collect())
            .unwrap_or_default();
        keys.sort_by_key(|key| key.as_str());
        keys
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<StateKey, String>>> {
        self.values
            .lock()
            .map_err(|_| Error::internal("state store lock poisoned"))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, key: StateKey, value: &str) -> Result<()> {
        self.lock()?.insert(key, value.to_string());
        Ok(())
    }

    async fn load(&self, key: StateKey) -> Result<Option<String>> {
        Ok(self.lock()?.get(&key).cloned())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::open(temp_dir.path().join("state.db"))
            .await
            .expect("Failed to create test database");
        (db, temp_dir)
    }

    #[test]
    fn test_state_key_names() {
        assert_eq!(StateKey::StartingRateLimits.as_str(), "starting_rate_limits");
        assert_eq!(StateKey::StartTime.to_string(), "start_time");
        assert_eq!(StateKey::CheckpointRateLimits.as_str(), "checkpoint_rate_limits");
        assert_eq!(StateKey::CheckpointTime.as_str(), "checkpoint_time");
        assert_eq!(StateKey::SkipPost.as_str(), "skip_post");
    }

    #[tokio::test]
    async fn test_sqlite_save_and_load() {
        let (db, _dir) = create_test_db().await;
        let store = SqliteStateStore::new(&db, "run-1");

        assert_eq!(store.load(StateKey::StartTime).await.unwrap(), None);

        store.save(StateKey::StartTime, "1700000000000").await.unwrap();
        assert_eq!(
            store.load(StateKey::StartTime).await.unwrap(),
            Some("1700000000000".to_string())
        );
    }

    #[tokio::test]
    async fn test_sqlite_save_overwrites() {
        let (db, _dir) = create_test_db().await;
        let store = SqliteStateStore::new(&db, "run-1");

        store.save(StateKey::SkipPost, "false").await.unwrap();
        store.save(StateKey::SkipPost, "true").await.unwrap();

        assert_eq!(
            store.load(StateKey::SkipPost).await.unwrap(),
            Some("true".to_string())
        );
    }

    #[tokio::test]
    async fn test_sqlite_jobs_are_isolated() {
        let (db, _dir) = create_test_db().await;
        let first = SqliteStateStore::new(&db, "run-1");
        let second = SqliteStateStore::new(&db, "run-2");

        first.save(StateKey::StartTime, "1").await.unwrap();
        second.save(StateKey::StartTime, "2").await.unwrap();
        first.clear().await.unwrap();

        assert_eq!(first.load(StateKey::StartTime).await.unwrap(), None);
        assert_eq!(
            second.load(StateKey::StartTime).await.unwrap(),
            Some("2".to_string())
        );
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_connections() {
        let (db, dir) = create_test_db().await;
        SqliteStateStore::new(&db, "run-1")
            .save(StateKey::StartingRateLimits, "{}")
            .await
            .unwrap();
        db.pool.close().await;

        let reopened = Database::open(dir.path().join("state.db")).await.unwrap();
        let store = SqliteStateStore::new(&reopened, "run-1");
        assert_eq!(
            store.load(StateKey::StartingRateLimits).await.unwrap(),
            Some("{}".to_string())
        );
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStateStore::with_values([(StateKey::SkipPost, "true")]);
        assert_eq!(store.get(StateKey::SkipPost), Some("true".to_string()));

        store.save(StateKey::StartTime, "5").await.unwrap();
        assert_eq!(
            store.load(StateKey::StartTime).await.unwrap(),
            Some("5".to_string())
        );

        assert_eq!(store.keys(), vec![StateKey::SkipPost, StateKey::StartTime]);

        store.clear().await.unwrap();
        assert_eq!(store.load(StateKey::SkipPost).await.unwrap(), None);
        assert!(store.keys().is_empty());
    }
}

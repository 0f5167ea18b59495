//! Database module - SQLx with SQLite
//!
//! Holds the phase state written by `pre` / `checkpoint` and read by `post`.

use crate::error::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::PathBuf;

/// Environment variable that overrides the state database location
pub const STATE_DB_ENV: &str = "APITRACK_STATE_DB";

/// Database state
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with default path
    pub async fn new() -> Result<Self> {
        let db_path = get_db_path();
        Self::open(db_path).await
    }

    /// Create a new database connection with a specific path
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        log::debug!("[apitrack:state] Connecting to database: {}", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS phase_state (
                job_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (job_id, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Get the state database path
///
/// Resolution order:
/// 1. `APITRACK_STATE_DB`
/// 2. `$RUNNER_TEMP/apitrack/state.db` (GitHub-hosted and self-hosted runners)
/// 3. the platform data directory
/// 4. the system temp directory
pub fn get_db_path() -> PathBuf {
    if let Some(path) = non_empty_env(STATE_DB_ENV) {
        return PathBuf::from(shellexpand::tilde(&path).into_owned());
    }

    if let Some(runner_temp) = non_empty_env("RUNNER_TEMP") {
        return PathBuf::from(runner_temp).join("apitrack").join("state.db");
    }

    match directories::ProjectDirs::from("com", "apitrack", "apitrack") {
        Some(dirs) => dirs.data_dir().join("state.db"),
        None => std::env::temp_dir().join("apitrack").join("state.db"),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

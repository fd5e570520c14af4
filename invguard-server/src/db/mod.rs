//! Database Module
//!
//! Owns the SQLite connection pool for the single-file inventory store.

pub mod repository;
pub mod seed;

pub use seed::SeedConfig;

use repository::{RepoError, RepoResult};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::path::{Path, PathBuf};

/// Inventory store handle
///
/// Constructed explicitly with [`Store::open`] and passed to the ledger, audit
/// and analytics layers; there is no global instance.
#[derive(Clone)]
pub struct Store {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Open (or create) the store at `path` and apply migrations
    ///
    /// Uses the rollback journal so the store stays a single file that can be
    /// snapshotted by copy.
    pub async fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                RepoError::Database(format!("Failed to create data directory: {e}"))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_millis(5000));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::Database(format!("Failed to open database: {e}")))?;

        tracing::info!(path = %path.display(), "Database connection established (SQLite, busy_timeout=5000ms)");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RepoError::Database(format!("Failed to apply migrations: {e}")))?;
        tracing::info!("Database migrations applied");

        restrict_permissions(&path);

        Ok(Self { pool, path })
    }

    /// Seed principals and, on an empty store, sample items
    pub async fn initialize(&self, seed: &SeedConfig) -> RepoResult<()> {
        seed::run(&self.pool, seed).await?;
        restrict_permissions(&self.path);
        Ok(())
    }

    /// Path of the live store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// chmod 600 - owner read/write only
#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
        tracing::warn!(path = %path.display(), error = %e, "Failed to restrict file permissions");
    }
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Fresh store in a temp dir (dir must outlive the store)
    pub async fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("inventory.db")).await.unwrap();
        store.initialize(&SeedConfig::for_tests()).await.unwrap();
        (dir, store)
    }
}

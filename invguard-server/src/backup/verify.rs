//! Backup integrity verification
//!
//! Answers with a plain `bool`; every failure is logged, never propagated.

use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};

use super::encryption::{EncryptionProvider, Passphrase};

/// Checks backup artifacts
#[derive(Clone)]
pub struct BackupVerifier {
    provider: Arc<dyn EncryptionProvider>,
}

impl BackupVerifier {
    pub fn new(provider: Arc<dyn EncryptionProvider>) -> Self {
        Self { provider }
    }

    /// `true` if `path` is a non-empty, readable backup
    ///
    /// Zero-byte files fail immediately without invoking any tool.
    pub async fn verify(&self, path: &Path, passphrase: Option<&Passphrase>) -> bool {
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => {
                tracing::error!(path = %path.display(), "Backup is not a regular file");
                return false;
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Backup file not found");
                return false;
            }
        };
        if size == 0 {
            tracing::error!(path = %path.display(), "Backup file is empty");
            return false;
        }

        let result = if self.provider.is_encrypted(path) {
            match passphrase {
                Some(passphrase) => self
                    .provider
                    .probe(path, passphrase)
                    .await
                    .map_err(|e| e.to_string()),
                None => Err("encrypted backup but no passphrase configured".to_string()),
            }
        } else {
            check_sqlite(path).await
        };

        match result {
            Ok(()) => {
                tracing::info!(path = %path.display(), size, "Backup integrity verified");
                true
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Backup integrity check failed");
                false
            }
        }
    }
}

/// Open read-only, require `quick_check = ok` and at least one table
pub(crate) async fn check_sqlite(path: &Path) -> Result<(), String> {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .create_if_missing(false)
        .connect()
        .await
        .map_err(|e| format!("not a readable database: {e}"))?;

    let outcome = async {
        let check: String = sqlx::query_scalar("PRAGMA quick_check")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| format!("quick_check failed: {e}"))?;
        if check != "ok" {
            return Err(format!("quick_check reported: {check}"));
        }
        let tables: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&mut conn)
                .await
                .map_err(|e| format!("catalog read failed: {e}"))?;
        if tables == 0 {
            return Err("database has no tables".to_string());
        }
        Ok(())
    }
    .await;

    let _ = conn.close().await;
    outcome
}

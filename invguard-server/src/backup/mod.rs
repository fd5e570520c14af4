//! 备份模块 - 快照、加密、校验、保留
//!
//! ```text
//! inventory.db ──copy──▶ <prefix>_<YYYYMMDD_HHMMSS>.db ──encrypt──▶ ….db.gpg
//!                                                    (chmod 600 either way)
//! verify:  size > 0 → provider.probe (encrypted) | quick_check + tables (plain)
//! retain:  delete files whose mtime is older than now - N days
//! ```

pub mod encryption;
pub mod engine;
pub mod envelope;
pub mod gpg;
pub mod retention;
pub mod verify;

pub use encryption::{EncryptionError, EncryptionProvider, Passphrase};
pub use engine::{BackupArtifact, BackupEngine};
pub use envelope::EnvelopeProvider;
pub use gpg::GpgProvider;
pub use retention::{PurgeReport, latest_backup, purge_older_than};
pub use verify::BackupVerifier;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::{Config, EncryptionBackend};

/// Backup failure
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("Source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    #[error("Encrypted backup requires a passphrase")]
    PassphraseRequired,

    #[error("{} is a .{extension} backup; the {provider} provider cannot decrypt it", .path.display())]
    UnsupportedFormat {
        path: PathBuf,
        extension: String,
        provider: &'static str,
    },

    #[error("{} is not a usable snapshot: {reason}", .path.display())]
    InvalidSnapshot { path: PathBuf, reason: String },
}

impl BackupError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        BackupError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Encryption provider selected by `BACKUP_ENCRYPTION`
pub fn provider_from_config(config: &Config) -> Arc<dyn EncryptionProvider> {
    match config.encryption {
        EncryptionBackend::Gpg => Arc::new(
            GpgProvider::new(config.gpg_binary.clone())
                .with_timeouts(config.encryption_timeout, config.verify_timeout),
        ),
        EncryptionBackend::Envelope => Arc::new(
            EnvelopeProvider::new().with_timeouts(config.encryption_timeout, config.verify_timeout),
        ),
    }
}

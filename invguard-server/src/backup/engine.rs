//! Backup engine: snapshot → (encrypt) → chmod 600, and the reverse for restore

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use super::BackupError;
use super::encryption::{ENCRYPTED_EXTENSIONS, EncryptionProvider, Passphrase};
use super::verify::check_sqlite;
use crate::db::restrict_permissions;

/// Extension of plain snapshots
pub const SNAPSHOT_EXTENSION: &str = "db";

/// Upper bound on same-second name collisions
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A backup file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub path: PathBuf,
    pub encrypted: bool,
    pub size_bytes: u64,
}

/// Snapshot / restore driver
#[derive(Clone)]
pub struct BackupEngine {
    prefix: String,
    provider: Arc<dyn EncryptionProvider>,
}

impl std::fmt::Debug for BackupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupEngine")
            .field("prefix", &self.prefix)
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl BackupEngine {
    pub fn new(prefix: impl Into<String>, provider: Arc<dyn EncryptionProvider>) -> Self {
        Self {
            prefix: prefix.into(),
            provider,
        }
    }

    pub fn provider(&self) -> &Arc<dyn EncryptionProvider> {
        &self.provider
    }

    fn encrypted_path(&self, snapshot: &Path) -> PathBuf {
        let mut name = snapshot.as_os_str().to_owned();
        name.push(".");
        name.push(self.provider.extension());
        PathBuf::from(name)
    }

    /// Exclusively create `<prefix>_<YYYYMMDD_HHMMSS>[_N].db` with mode 0600
    async fn create_snapshot_file(&self, dest_dir: &Path) -> Result<(PathBuf, tokio::fs::File), BackupError> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}_{stamp}.{SNAPSHOT_EXTENSION}", self.prefix)
            } else {
                format!("{}_{stamp}_{attempt}.{SNAPSHOT_EXTENSION}", self.prefix)
            };
            let path = dest_dir.join(name);
            // encrypted sibling also claims the name
            if self.encrypted_path(&path).exists() {
                continue;
            }

            let mut options = tokio::fs::OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            options.mode(0o600);

            match options.open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(BackupError::io(&path, e)),
            }
        }
        Err(BackupError::io(
            dest_dir,
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "no free backup file name for this second",
            ),
        ))
    }

    /// Byte copy of `source` into a fresh snapshot file
    async fn snapshot(&self, source: &Path, dest_dir: &Path) -> Result<PathBuf, BackupError> {
        let (path, mut file) = self.create_snapshot_file(dest_dir).await?;

        let copied = async {
            let mut input = tokio::fs::File::open(source).await?;
            tokio::io::copy(&mut input, &mut file).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        match copied {
            Ok(()) => Ok(path),
            Err(e) => {
                drop(file);
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %rm, "Failed to remove partial snapshot");
                }
                Err(BackupError::io(source, e))
            }
        }
    }

    /// Create a backup of `source` in `dest_dir`
    ///
    /// With `encrypt` and a passphrase the snapshot is sealed and the plain copy
    /// removed. If sealing fails the plain snapshot is returned instead
    /// (`encrypted: false`). The result is always mode 0600.
    pub async fn create_backup(
        &self,
        source: &Path,
        dest_dir: &Path,
        encrypt: bool,
        passphrase: Option<&Passphrase>,
    ) -> Result<BackupArtifact, BackupError> {
        if !tokio::fs::metadata(source).await.is_ok_and(|m| m.is_file()) {
            return Err(BackupError::SourceMissing(source.to_path_buf()));
        }
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| BackupError::io(dest_dir, e))?;

        let snapshot = self.snapshot(source, dest_dir).await?;
        tracing::info!(path = %snapshot.display(), "Snapshot written");

        let mut result = snapshot.clone();
        let mut encrypted = false;

        match (encrypt, passphrase) {
            (true, Some(passphrase)) => {
                let sealed = self.encrypted_path(&snapshot);
                match self.provider.encrypt(&snapshot, &sealed, passphrase).await {
                    Ok(()) => {
                        if let Err(e) = tokio::fs::remove_file(&snapshot).await {
                            tracing::warn!(path = %snapshot.display(), error = %e, "Failed to remove plain snapshot");
                        }
                        result = sealed;
                        encrypted = true;
                    }
                    Err(e) => {
                        tracing::error!(
                            provider = self.provider.name(),
                            path = %snapshot.display(),
                            error = %e,
                            "Encryption failed; keeping unencrypted snapshot"
                        );
                        match tokio::fs::remove_file(&sealed).await {
                            Ok(()) => {}
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                            Err(e) => {
                                tracing::warn!(path = %sealed.display(), error = %e, "Failed to remove partial ciphertext");
                            }
                        }
                    }
                }
            }
            (true, None) => {
                tracing::warn!("Encryption requested without a passphrase; backup left unencrypted");
            }
            (false, _) => {}
        }

        restrict_permissions(&result);
        let size_bytes = tokio::fs::metadata(&result)
            .await
            .map_err(|e| BackupError::io(&result, e))?
            .len();

        tracing::info!(path = %result.display(), encrypted, size_bytes, "Backup created");
        Ok(BackupArtifact {
            path: result,
            encrypted,
            size_bytes,
        })
    }

    /// Restore `backup` over `dest`
    ///
    /// Ciphertext of another provider is refused, and a plain file must pass the
    /// SQLite integrity check before `dest` is touched.
    pub async fn try_restore(
        &self,
        backup: &Path,
        dest: &Path,
        passphrase: Option<&Passphrase>,
    ) -> Result<(), BackupError> {
        if !tokio::fs::metadata(backup).await.is_ok_and(|m| m.is_file()) {
            return Err(BackupError::SourceMissing(backup.to_path_buf()));
        }
        let dest_dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|e| BackupError::io(&dest_dir, e))?;

        if self.provider.is_encrypted(backup) {
            let passphrase = passphrase.ok_or(BackupError::PassphraseRequired)?;
            // removed on drop, on every path
            let temp = tempfile::Builder::new()
                .prefix(".restore-")
                .tempfile_in(&dest_dir)
                .map_err(|e| BackupError::io(&dest_dir, e))?;
            self.provider.decrypt(backup, temp.path(), passphrase).await?;
            tokio::fs::copy(temp.path(), dest)
                .await
                .map_err(|e| BackupError::io(dest, e))?;
        } else if let Some(extension) = foreign_ciphertext(backup) {
            return Err(BackupError::UnsupportedFormat {
                path: backup.to_path_buf(),
                extension: extension.to_string(),
                provider: self.provider.name(),
            });
        } else {
            check_sqlite(backup)
                .await
                .map_err(|reason| BackupError::InvalidSnapshot {
                    path: backup.to_path_buf(),
                    reason,
                })?;
            tokio::fs::copy(backup, dest)
                .await
                .map_err(|e| BackupError::io(dest, e))?;
        }

        restrict_permissions(dest);
        Ok(())
    }

    /// Restore, reporting failure as `false`
    pub async fn restore_backup(&self, backup: &Path, dest: &Path, passphrase: Option<&Passphrase>) -> bool {
        match self.try_restore(backup, dest, passphrase).await {
            Ok(()) => {
                tracing::info!(backup = %backup.display(), dest = %dest.display(), "Backup restored");
                true
            }
            Err(e) => {
                tracing::error!(backup = %backup.display(), dest = %dest.display(), error = %e, "Restore failed");
                false
            }
        }
    }
}

/// Encrypted extension not handled by the configured provider
fn foreign_ciphertext(path: &Path) -> Option<&str> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| ENCRYPTED_EXTENSIONS.contains(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::encryption::EncryptionError;
    use crate::backup::envelope::EnvelopeProvider;
    use async_trait::async_trait;

    /// Provider whose encryption always fails
    struct BrokenProvider;

    #[async_trait]
    impl EncryptionProvider for BrokenProvider {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn extension(&self) -> &'static str {
            "gpg"
        }

        async fn encrypt(&self, _: &Path, output: &Path, _: &Passphrase) -> Result<(), EncryptionError> {
            // leave a partial output behind
            std::fs::write(output, b"partial")?;
            Err(EncryptionError::Exit {
                program: "gpg".into(),
                status: "exit status: 2".into(),
                stderr: "boom".into(),
            })
        }

        async fn decrypt(&self, _: &Path, _: &Path, _: &Passphrase) -> Result<(), EncryptionError> {
            Err(EncryptionError::Crypto("broken".into()))
        }

        async fn probe(&self, _: &Path, _: &Passphrase) -> Result<(), EncryptionError> {
            Err(EncryptionError::Crypto("broken".into()))
        }
    }

    /// Leaves a directory where the ciphertext should go, so cleanup cannot remove it
    struct StuckOutputProvider;

    #[async_trait]
    impl EncryptionProvider for StuckOutputProvider {
        fn name(&self) -> &'static str {
            "stuck"
        }

        fn extension(&self) -> &'static str {
            "gpg"
        }

        async fn encrypt(&self, _: &Path, output: &Path, _: &Passphrase) -> Result<(), EncryptionError> {
            std::fs::create_dir_all(output.join("partial"))?;
            Err(EncryptionError::Crypto("stuck".into()))
        }

        async fn decrypt(&self, _: &Path, _: &Path, _: &Passphrase) -> Result<(), EncryptionError> {
            Err(EncryptionError::Crypto("stuck".into()))
        }

        async fn probe(&self, _: &Path, _: &Passphrase) -> Result<(), EncryptionError> {
            Err(EncryptionError::Crypto("stuck".into()))
        }
    }

    fn source_file(dir: &Path) -> PathBuf {
        let source = dir.join("inventory.db");
        std::fs::write(&source, b"pretend sqlite bytes").unwrap();
        source
    }

    #[tokio::test]
    async fn test_plain_backup_naming_and_mode() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let engine = BackupEngine::new("inventory_backup", Arc::new(EnvelopeProvider::new()));

        let artifact = engine
            .create_backup(&source, &dir.path().join("backups"), false, None)
            .await
            .unwrap();
        assert!(!artifact.encrypted);
        assert_eq!(artifact.size_bytes, 20);

        let name = artifact.path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("inventory_backup_"), "{name}");
        assert!(name.ends_with(".db"), "{name}");
        // inventory_backup_YYYYMMDD_HHMMSS.db
        assert_eq!(name.len(), "inventory_backup_".len() + 15 + 3);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&artifact.path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test]
    async fn test_back_to_back_backups_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let engine = BackupEngine::new("inv", Arc::new(EnvelopeProvider::new()));
        let dest = dir.path().join("backups");

        let a = engine.create_backup(&source, &dest, false, None).await.unwrap();
        let b = engine.create_backup(&source, &dest, false, None).await.unwrap();
        assert_ne!(a.path, b.path);
        assert!(a.path.exists() && b.path.exists());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BackupEngine::new("inv", Arc::new(EnvelopeProvider::new()));
        let err = engine
            .create_backup(&dir.path().join("nope.db"), dir.path(), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::SourceMissing(_)));
    }

    #[tokio::test]
    async fn test_encryption_failure_falls_back_to_plain() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let dest = dir.path().join("backups");
        let engine = BackupEngine::new("inv", Arc::new(BrokenProvider));

        let artifact = engine
            .create_backup(&source, &dest, true, Some(&Passphrase::new("p")))
            .await
            .unwrap();
        assert!(!artifact.encrypted);
        assert!(artifact.path.exists());
        // partial ciphertext cleaned up
        let leftovers: Vec<_> = std::fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|e| e == "gpg"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_unremovable_partial_ciphertext_still_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let dest = dir.path().join("backups");
        let engine = BackupEngine::new("inv", Arc::new(StuckOutputProvider));

        let artifact = engine
            .create_backup(&source, &dest, true, Some(&Passphrase::new("p")))
            .await
            .unwrap();
        assert!(!artifact.encrypted);
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"pretend sqlite bytes");
        // remove_file 删不掉目录，只记 warn
        assert!(engine.encrypted_path(&artifact.path).is_dir());
    }

    #[tokio::test]
    async fn test_encrypted_round_trip_restores_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let engine = BackupEngine::new("inv", Arc::new(EnvelopeProvider::new()));
        let pass = Passphrase::new("round-trip");

        let artifact = engine
            .create_backup(&source, &dir.path().join("backups"), true, Some(&pass))
            .await
            .unwrap();
        assert!(artifact.encrypted);
        assert!(artifact.path.to_str().unwrap().ends_with(".db.enc"));
        assert!(!artifact.path.with_extension("").exists());

        let restored = dir.path().join("restore").join("inventory.db");
        assert!(engine.restore_backup(&artifact.path, &restored, Some(&pass)).await);
        assert_eq!(std::fs::read(&restored).unwrap(), std::fs::read(&source).unwrap());

        // no decrypted temp left next to the destination
        let entries: Vec<_> = std::fs::read_dir(restored.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_failures_report_false() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_file(dir.path());
        let engine = BackupEngine::new("inv", Arc::new(EnvelopeProvider::new()));
        let artifact = engine
            .create_backup(&source, dir.path(), true, Some(&Passphrase::new("right")))
            .await
            .unwrap();
        let dest = dir.path().join("out").join("restored.db");

        assert!(!engine.restore_backup(&artifact.path, &dest, None).await);
        assert!(
            !engine
                .restore_backup(&artifact.path, &dest, Some(&Passphrase::new("wrong")))
                .await
        );
        assert!(!dest.exists());
        assert!(!engine.restore_backup(&dir.path().join("missing.db"), &dest, None).await);

        // temp files from the failed decrypt are gone
        let entries = std::fs::read_dir(dest.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 0);
    }

    #[tokio::test]
    async fn test_restore_refuses_ciphertext_of_another_provider() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("live.db");
        std::fs::write(&dest, b"live database").unwrap();

        let gpg_artifact = dir.path().join("inv_20240101_000000.db.gpg");
        std::fs::write(&gpg_artifact, b"\x8c\r\x04\x09\x03\x02 openpgp ciphertext").unwrap();
        let envelope = BackupEngine::new("inv", Arc::new(EnvelopeProvider::new()));
        let err = envelope
            .try_restore(&gpg_artifact, &dest, Some(&Passphrase::new("p")))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, BackupError::UnsupportedFormat { extension, provider: "envelope", .. } if extension == "gpg"),
            "{err:?}"
        );
        assert!(!envelope.restore_backup(&gpg_artifact, &dest, None).await);

        let enc_artifact = dir.path().join("inv_20240101_000000.db.enc");
        std::fs::write(&enc_artifact, b"IGENVLP1 sealed bytes").unwrap();
        let gpg = BackupEngine::new("inv", Arc::new(crate::backup::GpgProvider::new("gpg")));
        let err = gpg.try_restore(&enc_artifact, &dest, None).await.unwrap_err();
        assert!(matches!(err, BackupError::UnsupportedFormat { .. }), "{err:?}");

        assert_eq!(std::fs::read(&dest).unwrap(), b"live database");
    }

    #[tokio::test]
    async fn test_restore_rejects_plain_file_that_is_not_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = source_file(dir.path());
        let dest = dir.path().join("out").join("live.db");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, b"live database").unwrap();
        let engine = BackupEngine::new("inv", Arc::new(EnvelopeProvider::new()));

        let err = engine.try_restore(&garbage, &dest, None).await.unwrap_err();
        assert!(matches!(err, BackupError::InvalidSnapshot { .. }), "{err:?}");
        assert!(!engine.restore_backup(&garbage, &dest, None).await);
        assert_eq!(std::fs::read(&dest).unwrap(), b"live database");
    }
}

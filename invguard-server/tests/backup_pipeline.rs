//! 备份链路 - 快照 → 加密 → 校验 → 恢复 → 保留

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use invguard_server::backup::{
    self, BackupEngine, BackupVerifier, EnvelopeProvider, GpgProvider, Passphrase,
};
use invguard_server::db::SeedConfig;
use invguard_server::db::repository::item;
use invguard_server::Store;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

async fn seeded_store(dir: &Path) -> PathBuf {
    let path = dir.join("inventory.db");
    let store = Store::open(&path).await.unwrap();
    store
        .initialize(&SeedConfig {
            admin_username: "admin".into(),
            admin_password: "admin123".into(),
            viewer_password: "viewer123".into(),
            sample_data: true,
        })
        .await
        .unwrap();
    store.close().await;
    path
}

fn envelope_engine() -> (BackupEngine, BackupVerifier) {
    let provider = Arc::new(EnvelopeProvider::new());
    (
        BackupEngine::new("inventory_backup", provider.clone()),
        BackupVerifier::new(provider),
    )
}

#[tokio::test]
async fn plain_backup_verifies_and_restores() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_store(dir.path()).await;
    let (engine, verifier) = envelope_engine();

    let artifact = engine
        .create_backup(&source, &dir.path().join("backups"), false, None)
        .await
        .unwrap();
    assert!(!artifact.encrypted);
    assert!(verifier.verify(&artifact.path, None).await);

    let dest = dir.path().join("restored").join("inventory.db");
    assert!(engine.restore_backup(&artifact.path, &dest, None).await);
    assert_eq!(std::fs::read(&dest).unwrap(), std::fs::read(&source).unwrap());

    let restored = Store::open(&dest).await.unwrap();
    let laptop = item::find_by_sku(&restored.pool, "LAP001").await.unwrap();
    assert_eq!(laptop.map(|i| i.quantity), Some(15));
    restored.close().await;
}

#[tokio::test]
async fn encrypted_round_trip_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let source = seeded_store(dir.path()).await;
    let original = std::fs::read(&source).unwrap();
    let (engine, verifier) = envelope_engine();
    let pass = Passphrase::new("integration passphrase");

    let artifact = engine
        .create_backup(&source, &dir.path().join("backups"), true, Some(&pass))
        .await
        .unwrap();
    assert!(artifact.encrypted);
    assert_ne!(std::fs::read(&artifact.path).unwrap(), original);
    assert!(verifier.verify(&artifact.path, Some(&pass)).await);
    assert!(!verifier.verify(&artifact.path, Some(&Passphrase::new("nope"))).await);

    let dest = dir.path().join("restore.db");
    assert!(engine.restore_backup(&artifact.path, &dest, Some(&pass)).await);
    assert_eq!(std::fs::read(&dest).unwrap(), original);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&artifact.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn gpg_round_trip_when_available() {
    let provider = Arc::new(GpgProvider::new("gpg"));
    if !provider.is_available().await {
        eprintln!("gpg not installed, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("gnupg");
    std::fs::create_dir(&home).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&home, std::fs::Permissions::from_mode(0o700)).unwrap();
    }
    let provider = Arc::new(GpgProvider::new("gpg").with_homedir(&home));
    let source = seeded_store(dir.path()).await;
    let engine = BackupEngine::new("inventory_backup", provider.clone());
    let pass = Passphrase::new("gpg integration passphrase");

    let artifact = engine
        .create_backup(&source, &dir.path().join("backups"), true, Some(&pass))
        .await
        .unwrap();
    assert!(artifact.encrypted);
    assert!(artifact.path.to_string_lossy().ends_with(".db.gpg"));

    let dest = dir.path().join("restore.db");
    assert!(engine.restore_backup(&artifact.path, &dest, Some(&pass)).await);
    assert_eq!(std::fs::read(&dest).unwrap(), std::fs::read(&source).unwrap());
}

#[tokio::test]
async fn zero_byte_backup_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let (_, verifier) = envelope_engine();
    let pass = Passphrase::new("p");
    for name in ["empty.db", "empty.db.enc"] {
        let path = dir.path().join(name);
        std::fs::write(&path, b"").unwrap();
        assert!(!verifier.verify(&path, Some(&pass)).await, "{name}");
    }
}

fn age(path: &Path, by: Duration) {
    std::fs::write(path, b"artifact").unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - by)
        .unwrap();
}

#[tokio::test]
async fn retention_keeps_only_recent_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    age(&dir.path().join("a.db"), DAY * 40);
    age(&dir.path().join("b.db.gpg"), DAY * 2);

    let report = backup::purge_older_than(dir.path(), 30).await.unwrap();
    assert_eq!(report.removed.len(), 1);
    assert!(!dir.path().join("a.db").exists());
    assert!(dir.path().join("b.db.gpg").exists());

    let (newest, _) = backup::latest_backup(dir.path()).await.unwrap().unwrap();
    assert_eq!(newest, dir.path().join("b.db.gpg"));
}

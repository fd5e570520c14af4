//! In-process AES-256-GCM envelope
//!
//! For hosts without gpg. Key derived from the passphrase with argon2id.
//!
//! Format: `b"IGENVLP1" || salt[16] || nonce[12] || ciphertext || tag[16]`

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use argon2::Argon2;
use async_trait::async_trait;
use zeroize::Zeroizing;

use super::encryption::{
    DEFAULT_ENCRYPTION_TIMEOUT, DEFAULT_PROBE_TIMEOUT, EncryptionError, EncryptionProvider,
    Passphrase, with_timeout,
};

const MAGIC: &[u8; 8] = b"IGENVLP1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = MAGIC.len() + SALT_LEN + NONCE_LEN;

/// AES-256-GCM envelope provider
#[derive(Debug, Clone)]
pub struct EnvelopeProvider {
    timeout: Duration,
    probe_timeout: Duration,
}

impl EnvelopeProvider {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_ENCRYPTION_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, timeout: Duration, probe_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.probe_timeout = probe_timeout;
        self
    }
}

impl Default for EnvelopeProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_key(passphrase: &Passphrase, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, EncryptionError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    Argon2::default()
        .hash_password_into(passphrase.expose().as_bytes(), salt, &mut key[..])
        .map_err(|e| EncryptionError::Crypto(format!("Key derivation failed: {e}")))?;
    Ok(key)
}

fn seal(plaintext: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, EncryptionError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut salt);
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce_bytes);

    let key = derive_key(passphrase, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|_| EncryptionError::Crypto("Invalid key".into()))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| EncryptionError::Crypto("Encryption failed".into()))?;

    let mut sealed = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    sealed.extend_from_slice(MAGIC);
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open(sealed: &[u8], passphrase: &Passphrase) -> Result<Zeroizing<Vec<u8>>, EncryptionError> {
    if sealed.len() < HEADER_LEN + TAG_LEN || &sealed[..MAGIC.len()] != MAGIC {
        return Err(EncryptionError::Crypto("Not an InvGuard envelope".into()));
    }
    let salt = &sealed[MAGIC.len()..MAGIC.len() + SALT_LEN];
    let nonce = &sealed[MAGIC.len() + SALT_LEN..HEADER_LEN];

    let key = derive_key(passphrase, salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|_| EncryptionError::Crypto("Invalid key".into()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), &sealed[HEADER_LEN..])
        .map(Zeroizing::new)
        .map_err(|_| EncryptionError::Crypto("Decryption failed (wrong passphrase or tampered data)".into()))
}

/// Write `bytes` to `path` with owner-only permissions
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Run blocking crypto work off the async runtime
async fn blocking<T, F>(work: F) -> Result<T, EncryptionError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, EncryptionError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| EncryptionError::Crypto(format!("Crypto task failed: {e}")))?
}

#[async_trait]
impl EncryptionProvider for EnvelopeProvider {
    fn name(&self) -> &'static str {
        "envelope"
    }

    fn extension(&self) -> &'static str {
        "enc"
    }

    async fn encrypt(
        &self,
        input: &Path,
        output: &Path,
        passphrase: &Passphrase,
    ) -> Result<(), EncryptionError> {
        let (input, output, passphrase): (PathBuf, PathBuf, Passphrase) =
            (input.to_path_buf(), output.to_path_buf(), passphrase.clone());
        with_timeout(
            "envelope encrypt",
            self.timeout,
            blocking(move || {
                let plaintext = Zeroizing::new(std::fs::read(&input)?);
                let sealed = seal(&plaintext, &passphrase)?;
                write_private(&output, &sealed)?;
                Ok(())
            }),
        )
        .await
    }

    async fn decrypt(
        &self,
        input: &Path,
        output: &Path,
        passphrase: &Passphrase,
    ) -> Result<(), EncryptionError> {
        let (input, output, passphrase): (PathBuf, PathBuf, Passphrase) =
            (input.to_path_buf(), output.to_path_buf(), passphrase.clone());
        with_timeout(
            "envelope decrypt",
            self.timeout,
            blocking(move || {
                let sealed = std::fs::read(&input)?;
                let plaintext = open(&sealed, &passphrase)?;
                write_private(&output, &plaintext)?;
                Ok(())
            }),
        )
        .await
    }

    async fn probe(&self, input: &Path, passphrase: &Passphrase) -> Result<(), EncryptionError> {
        let (input, passphrase) = (input.to_path_buf(), passphrase.clone());
        with_timeout(
            "envelope probe",
            self.probe_timeout,
            blocking(move || {
                let sealed = std::fs::read(&input)?;
                // tag check only, plaintext dropped (and zeroed) immediately
                open(&sealed, &passphrase).map(|_| ())
            }),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.db");
        let sealed = dir.path().join("a.db.enc");
        let opened = dir.path().join("b.db");
        std::fs::write(&plain, b"SQLite format 3\0 payload").unwrap();

        let provider = EnvelopeProvider::new();
        let pass = Passphrase::new("s3cret");
        provider.encrypt(&plain, &sealed, &pass).await.unwrap();

        let raw = std::fs::read(&sealed).unwrap();
        assert_eq!(&raw[..8], MAGIC);
        assert_ne!(&raw[HEADER_LEN..], b"SQLite format 3\0 payload");

        provider.probe(&sealed, &pass).await.unwrap();
        provider.decrypt(&sealed, &opened, &pass).await.unwrap();
        assert_eq!(std::fs::read(&opened).unwrap(), std::fs::read(&plain).unwrap());
        assert!(provider.is_encrypted(&sealed));
        assert!(!provider.is_encrypted(&plain));
    }

    #[tokio::test]
    async fn test_wrong_passphrase_and_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("a.db");
        let sealed = dir.path().join("a.db.enc");
        std::fs::write(&plain, b"ledger").unwrap();

        let provider = EnvelopeProvider::new();
        provider
            .encrypt(&plain, &sealed, &Passphrase::new("right"))
            .await
            .unwrap();

        let err = provider
            .probe(&sealed, &Passphrase::new("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, EncryptionError::Crypto(_)));

        let mut raw = std::fs::read(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        std::fs::write(&sealed, &raw).unwrap();
        assert!(provider.probe(&sealed, &Passphrase::new("right")).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("junk.enc");
        std::fs::write(&junk, b"not an envelope at all, definitely not").unwrap();
        let err = EnvelopeProvider::new()
            .probe(&junk, &Passphrase::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, EncryptionError::Crypto(_)));
    }
}

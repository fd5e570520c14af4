//! Encryption provider interface
//!
//! Every provider call is time-bounded and returns a typed error; a hung
//! subprocess or a slow KDF cannot stall the caller indefinitely.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use zeroize::Zeroizing;

/// Default bound for encrypt / decrypt
pub const DEFAULT_ENCRYPTION_TIMEOUT: Duration = Duration::from_secs(120);
/// Default bound for the non-destructive probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Extensions of every envelope format a provider can write
pub const ENCRYPTED_EXTENSIONS: &[&str] = &["gpg", "enc"];

/// Backup passphrase, wiped on drop
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(***)")
    }
}

/// Encryption failure
#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Cryptographic failure: {0}")]
    Crypto(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Symmetric, passphrase-based file encryption
#[async_trait]
pub trait EncryptionProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Extension appended to encrypted artifacts (without the dot)
    fn extension(&self) -> &'static str;

    /// Encrypt `input` into `output`
    async fn encrypt(
        &self,
        input: &Path,
        output: &Path,
        passphrase: &Passphrase,
    ) -> Result<(), EncryptionError>;

    /// Decrypt `input` into `output`
    async fn decrypt(
        &self,
        input: &Path,
        output: &Path,
        passphrase: &Passphrase,
    ) -> Result<(), EncryptionError>;

    /// Check that `input` is a readable envelope without writing plaintext
    async fn probe(&self, input: &Path, passphrase: &Passphrase) -> Result<(), EncryptionError>;

    /// Whether `path` carries this provider's extension
    fn is_encrypted(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension())
    }
}

/// Run `future` with a deadline, mapping expiry to [`EncryptionError::Timeout`]
pub async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    future: F,
) -> Result<T, EncryptionError>
where
    F: std::future::Future<Output = Result<T, EncryptionError>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(EncryptionError::Timeout { operation, timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_debug_is_redacted() {
        let pass = Passphrase::new("hunter2");
        assert_eq!(format!("{pass:?}"), "Passphrase(***)");
        assert_eq!(pass.expose(), "hunter2");
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<(), _> = with_timeout("encrypt", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(EncryptionError::Timeout {
                operation: "encrypt",
                ..
            })
        ));
    }
}

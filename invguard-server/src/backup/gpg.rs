//! GnuPG symmetric encryption (OpenPGP, AES256)
//!
//! The passphrase goes to gpg on stdin (`--passphrase-fd 0`), never on argv.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::encryption::{
    DEFAULT_ENCRYPTION_TIMEOUT, DEFAULT_PROBE_TIMEOUT, EncryptionError, EncryptionProvider,
    Passphrase, with_timeout,
};

/// `gpg` subprocess provider
#[derive(Debug, Clone)]
pub struct GpgProvider {
    binary: String,
    homedir: Option<PathBuf>,
    timeout: Duration,
    probe_timeout: Duration,
}

impl GpgProvider {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            homedir: None,
            timeout: DEFAULT_ENCRYPTION_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, timeout: Duration, probe_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.probe_timeout = probe_timeout;
        self
    }

    /// Use a dedicated keyring directory (`--homedir`)
    pub fn with_homedir(mut self, homedir: impl Into<PathBuf>) -> Self {
        self.homedir = Some(homedir.into());
        self
    }

    /// Whether the binary can be executed at all
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn base_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(home) = &self.homedir {
            args.push("--homedir".into());
            args.push(home.as_os_str().to_owned());
        }
        for arg in [
            "--batch",
            "--yes",
            "--no-symkey-cache",
            "--pinentry-mode",
            "loopback",
            "--passphrase-fd",
            "0",
        ] {
            args.push(arg.into());
        }
        args
    }

    async fn run(&self, args: Vec<OsString>, passphrase: &Passphrase) -> Result<(), EncryptionError> {
        let mut child = Command::new(&self.binary)
            .args(self.base_args())
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncryptionError::Spawn {
                program: self.binary.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(passphrase.expose().as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            // drop closes the pipe
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(EncryptionError::Exit {
                program: self.binary.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Default for GpgProvider {
    fn default() -> Self {
        Self::new("gpg")
    }
}

#[async_trait]
impl EncryptionProvider for GpgProvider {
    fn name(&self) -> &'static str {
        "gpg"
    }

    fn extension(&self) -> &'static str {
        "gpg"
    }

    async fn encrypt(
        &self,
        input: &Path,
        output: &Path,
        passphrase: &Passphrase,
    ) -> Result<(), EncryptionError> {
        let args = vec![
            "--symmetric".into(),
            "--cipher-algo".into(),
            "AES256".into(),
            "--output".into(),
            output.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ];
        with_timeout("gpg encrypt", self.timeout, self.run(args, passphrase)).await
    }

    async fn decrypt(
        &self,
        input: &Path,
        output: &Path,
        passphrase: &Passphrase,
    ) -> Result<(), EncryptionError> {
        let args = vec![
            "--decrypt".into(),
            "--output".into(),
            output.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ];
        with_timeout("gpg decrypt", self.timeout, self.run(args, passphrase)).await
    }

    async fn probe(&self, input: &Path, passphrase: &Passphrase) -> Result<(), EncryptionError> {
        let args = vec!["--list-only".into(), input.as_os_str().to_owned()];
        with_timeout("gpg list-only", self.probe_timeout, self.run(args, passphrase)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = GpgProvider::new("/nonexistent/gpg-binary");
        assert!(!provider.is_available().await);

        let input = dir.path().join("in.db");
        std::fs::write(&input, b"data").unwrap();
        let err = provider
            .encrypt(&input, &dir.path().join("in.db.gpg"), &Passphrase::new("p"))
            .await
            .unwrap_err();
        assert!(matches!(err, EncryptionError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_round_trip_when_gpg_available() {
        let home = tempfile::tempdir().unwrap();
        let provider = GpgProvider::default().with_homedir(home.path());
        if !provider.is_available().await {
            return;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(home.path(), std::fs::Permissions::from_mode(0o700)).unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("snapshot.db");
        let sealed = dir.path().join("snapshot.db.gpg");
        let opened = dir.path().join("opened.db");
        std::fs::write(&plain, b"ledger bytes").unwrap();
        let pass = Passphrase::new("correct horse");

        provider.encrypt(&plain, &sealed, &pass).await.unwrap();
        provider.decrypt(&sealed, &opened, &pass).await.unwrap();
        assert_eq!(std::fs::read(&opened).unwrap(), b"ledger bytes");

        let wrong = provider
            .decrypt(&sealed, &dir.path().join("nope.db"), &Passphrase::new("wrong"))
            .await;
        assert!(wrong.is_err());
    }
}

//! Daily / hourly / weekly backup cycles

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::health::{HealthProbe, HttpHealthProbe};
use super::notify::{LogNotifier, NotifyLevel, Notifier};
use crate::backup::{
    self, BackupArtifact, BackupEngine, BackupVerifier, EncryptionProvider, Passphrase, PurgeReport,
};
use crate::core::Config;
use crate::core::tasks::panic_message;
use crate::utils::time;

/// Newest backup older than this raises an alert
pub const STALE_BACKUP_AGE: Duration = Duration::from_secs(25 * 60 * 60);

const MIN_FREE_BYTES: u64 = 1024 * 1024 * 1024;
const MAX_USED_PERCENT: f64 = 90.0;

/// Scheduled job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    Daily,
    Hourly,
    Weekly,
}

impl Cycle {
    pub fn name(&self) -> &'static str {
        match self {
            Cycle::Daily => "daily_backup",
            Cycle::Hourly => "hourly_health",
            Cycle::Weekly => "weekly_maintenance",
        }
    }
}

/// Result of one daily backup cycle
#[derive(Debug)]
pub enum CycleOutcome {
    /// upstream unhealthy, nothing written
    Skipped,
    Verified(BackupArtifact),
    /// artifact written but failed verification
    Degraded(BackupArtifact),
    Failed,
}

/// 备份调度器
pub struct BackupScheduler {
    database_path: PathBuf,
    backup_dir: PathBuf,
    retention_days: u32,
    passphrase: Option<Passphrase>,
    timezone: Tz,
    daily_at: NaiveTime,
    weekly_day: Weekday,
    weekly_at: NaiveTime,
    engine: BackupEngine,
    verifier: BackupVerifier,
    probe: Arc<dyn HealthProbe>,
    notifier: Arc<dyn Notifier>,
}

impl BackupScheduler {
    /// Production wiring: configured provider, HTTP probe, log notifier
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let probe = HttpHealthProbe::new(&config.api_url)?;
        Ok(Self::new(
            config,
            backup::provider_from_config(config),
            Arc::new(probe),
            Arc::new(LogNotifier),
        ))
    }

    pub fn new(
        config: &Config,
        provider: Arc<dyn EncryptionProvider>,
        probe: Arc<dyn HealthProbe>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            database_path: config.database_path.clone(),
            backup_dir: config.backup_path.clone(),
            retention_days: config.retention_days,
            passphrase: config.gpg_passphrase.as_deref().map(Passphrase::new),
            timezone: config.timezone,
            daily_at: config.daily_backup_time,
            weekly_day: config.weekly_maintenance_day,
            weekly_at: config.weekly_maintenance_time,
            engine: BackupEngine::new(config.backup_prefix.clone(), provider.clone()),
            verifier: BackupVerifier::new(provider),
            probe,
            notifier,
        }
    }

    pub fn engine(&self) -> &BackupEngine {
        &self.engine
    }

    pub fn verifier(&self) -> &BackupVerifier {
        &self.verifier
    }

    pub fn passphrase(&self) -> Option<&Passphrase> {
        self.passphrase.as_ref()
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    // ========================================================================
    // Cycles
    // ========================================================================

    /// Health-gated backup + verify, then the retention sweep
    ///
    /// The sweep runs even when the backup step panics.
    pub async fn daily_cycle(&self) -> CycleOutcome {
        tracing::info!("Starting daily backup cycle");
        let outcome = self
            .run_guarded("daily_backup", self.backup_once())
            .await
            .unwrap_or(CycleOutcome::Failed);
        self.retention_sweep().await;
        outcome
    }

    async fn backup_once(&self) -> CycleOutcome {
        if !self.probe.is_healthy().await {
            self.notifier.notify(
                NotifyLevel::Warning,
                "Backup skipped: API health check failed",
            );
            return CycleOutcome::Skipped;
        }

        let encrypt = self.passphrase.is_some();
        let artifact = match self
            .engine
            .create_backup(
                &self.database_path,
                &self.backup_dir,
                encrypt,
                self.passphrase.as_ref(),
            )
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::error!(source = %self.database_path.display(), error = %e, "Backup creation failed");
                self.notifier
                    .notify(NotifyLevel::Error, &format!("Backup failed: {e}"));
                return CycleOutcome::Failed;
            }
        };

        if encrypt && !artifact.encrypted {
            self.notifier.notify(
                NotifyLevel::Warning,
                &format!(
                    "Encryption failed, backup stored unencrypted: {}",
                    artifact.path.display()
                ),
            );
        }

        if self
            .verifier
            .verify(&artifact.path, self.passphrase.as_ref())
            .await
        {
            self.notifier.notify(
                NotifyLevel::Info,
                &format!(
                    "Backup completed and verified: {} ({} bytes)",
                    artifact.path.display(),
                    artifact.size_bytes
                ),
            );
            CycleOutcome::Verified(artifact)
        } else {
            self.notifier.notify(
                NotifyLevel::Warning,
                &format!(
                    "Backup created but verification failed: {}",
                    artifact.path.display()
                ),
            );
            CycleOutcome::Degraded(artifact)
        }
    }

    /// Delete artifacts past the retention horizon
    pub async fn retention_sweep(&self) -> Option<PurgeReport> {
        match backup::purge_older_than(&self.backup_dir, self.retention_days).await {
            Ok(report) => {
                if !report.failed.is_empty() {
                    self.notifier.notify(
                        NotifyLevel::Warning,
                        &format!(
                            "Retention sweep could not remove {} file(s)",
                            report.failed.len()
                        ),
                    );
                }
                Some(report)
            }
            Err(e) => {
                tracing::error!(dir = %self.backup_dir.display(), error = %e, "Retention sweep failed");
                self.notifier.notify(
                    NotifyLevel::Error,
                    &format!("Retention sweep failed: {e}"),
                );
                None
            }
        }
    }

    /// Health probe plus backup freshness; returns upstream health
    pub async fn hourly_cycle(&self) -> bool {
        let healthy = self.probe.is_healthy().await;
        if !healthy {
            self.notifier
                .notify(NotifyLevel::Error, "API health check failed");
        }
        self.check_backup_freshness(SystemTime::now()).await;
        healthy
    }

    async fn check_backup_freshness(&self, now: SystemTime) {
        match backup::latest_backup(&self.backup_dir).await {
            Ok(Some((path, modified))) => {
                let age = now.duration_since(modified).unwrap_or_default();
                if age > STALE_BACKUP_AGE {
                    self.notifier.notify(
                        NotifyLevel::Warning,
                        &format!(
                            "Latest backup is {} hours old: {}",
                            age.as_secs() / 3600,
                            path.display()
                        ),
                    );
                }
            }
            Ok(None) => {
                self.notifier
                    .notify(NotifyLevel::Warning, "No backups found");
            }
            Err(e) => {
                self.notifier.notify(
                    NotifyLevel::Warning,
                    &format!("Backup directory unreadable: {e}"),
                );
            }
        }
    }

    /// Retention sweep + disk space check
    pub async fn weekly_cycle(&self) {
        tracing::info!("Starting weekly maintenance");
        self.retention_sweep().await;
        if let Some(alert) = self.disk_space_alert() {
            self.notifier.notify(NotifyLevel::Warning, &alert);
        }
        self.notifier
            .notify(NotifyLevel::Info, "Weekly maintenance completed");
    }

    fn disk_space_alert(&self) -> Option<String> {
        let target = std::fs::canonicalize(&self.backup_dir).unwrap_or_else(|_| self.backup_dir.clone());
        let disks = sysinfo::Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len());

        match disk {
            Some(disk) => disk_alert(disk.available_space(), disk.total_space()),
            None => {
                tracing::warn!(dir = %target.display(), "No disk found for backup directory");
                None
            }
        }
    }

    // ========================================================================
    // Loops
    // ========================================================================

    /// Run `future` inside a panic boundary
    pub async fn run_guarded<F, T>(&self, name: &'static str, future: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(value) => Some(value),
            Err(panic_info) => {
                let msg = panic_message(&*panic_info);
                tracing::error!(cycle = name, panic = %msg, "Scheduled cycle panicked");
                self.notifier.notify(
                    NotifyLevel::Error,
                    &format!("Scheduled job '{name}' crashed: {msg}"),
                );
                None
            }
        }
    }

    pub async fn run_cycle(&self, cycle: Cycle) {
        match cycle {
            Cycle::Daily => {
                self.run_guarded(cycle.name(), self.daily_cycle()).await;
            }
            Cycle::Hourly => {
                self.run_guarded(cycle.name(), self.hourly_cycle()).await;
            }
            Cycle::Weekly => {
                self.run_guarded(cycle.name(), self.weekly_cycle()).await;
            }
        }
    }

    /// Next trigger of `cycle` strictly after `now`
    pub fn next_run(&self, cycle: Cycle, now: DateTime<Tz>) -> DateTime<Tz> {
        match cycle {
            Cycle::Daily => time::next_daily(now, self.daily_at),
            Cycle::Hourly => time::next_hour(now),
            Cycle::Weekly => time::next_weekly(now, self.weekly_day, self.weekly_at),
        }
    }

    /// 定时循环：sleep 到下次触发 → 执行周期，直到 shutdown
    pub async fn run_loop(self: Arc<Self>, cycle: Cycle, shutdown: CancellationToken) {
        tracing::info!(cycle = cycle.name(), "Scheduler loop started");
        loop {
            let now = Utc::now().with_timezone(&self.timezone);
            let next = self.next_run(cycle, now);
            tracing::info!(
                cycle = cycle.name(),
                "Next run at {}",
                next.format("%Y-%m-%d %H:%M %Z")
            );

            tokio::select! {
                _ = tokio::time::sleep(time::sleep_until(now, next)) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!(cycle = cycle.name(), "Scheduler loop received shutdown signal");
                    return;
                }
            }

            self.run_cycle(cycle).await;
        }
    }
}

/// Alert text when free space is below 1 GiB or usage above 90 %
fn disk_alert(available: u64, total: u64) -> Option<String> {
    if total == 0 {
        return None;
    }
    let used_percent = (total.saturating_sub(available)) as f64 * 100.0 / total as f64;
    if available < MIN_FREE_BYTES {
        Some(format!(
            "Low disk space on backup volume: {} MiB free",
            available / (1024 * 1024)
        ))
    } else if used_percent > MAX_USED_PERCENT {
        Some(format!(
            "Backup volume is {used_percent:.1}% full"
        ))
    } else {
        None
    }
}

//! Backup retention sweep
//!
//! Artifacts are write-once, so a file's modification time stands in for its
//! creation time.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Outcome of one sweep
#[derive(Debug, Default)]
pub struct PurgeReport {
    pub removed: Vec<PathBuf>,
    pub kept: usize,
    /// (path, error) per file that could not be inspected or removed
    pub failed: Vec<(PathBuf, String)>,
}

impl PurgeReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete regular files in `dir` older than `days`
///
/// A missing directory is an error; per-file failures are recorded and the sweep continues.
pub async fn purge_older_than(dir: &Path, days: u32) -> io::Result<PurgeReport> {
    purge_older_than_at(dir, days, SystemTime::now()).await
}

/// [`purge_older_than`] against an explicit clock
pub async fn purge_older_than_at(dir: &Path, days: u32, now: SystemTime) -> io::Result<PurgeReport> {
    let horizon = Duration::from_secs(u64::from(days) * SECS_PER_DAY);
    let cutoff = now.checked_sub(horizon).unwrap_or(SystemTime::UNIX_EPOCH);

    let mut report = PurgeReport::default();
    let mut entries = tokio::fs::read_dir(dir).await?;

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                report.failed.push((dir.to_path_buf(), e.to_string()));
                break;
            }
        };
        let path = entry.path();

        // symlinks are not followed; only regular files are candidates
        let meta = match entry.metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to stat backup file");
                report.failed.push((path, e.to_string()));
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }

        let modified = match meta.modified() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "File has no modification time");
                report.failed.push((path, e.to_string()));
                continue;
            }
        };

        if modified >= cutoff {
            report.kept += 1;
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Deleted old backup");
                report.removed.push(path);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to delete old backup");
                report.failed.push((path, e.to_string()));
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        days,
        removed = report.removed.len(),
        kept = report.kept,
        failed = report.failed.len(),
        "Retention sweep finished"
    );
    Ok(report)
}

/// Newest regular file in `dir` by modification time
pub async fn latest_backup(dir: &Path) -> io::Result<Option<(PathBuf, SystemTime)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut newest: Option<(PathBuf, SystemTime)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if newest.as_ref().is_none_or(|(_, t)| modified > *t) {
            newest = Some((entry.path(), modified));
        }
    }
    Ok(newest)
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use invguard_server::core::TaskKind;
use invguard_server::scheduler::{Cycle, CycleOutcome};
use invguard_server::{
    BackgroundTasks, BackupScheduler, Config, Store, backup, init_logger_with_file, print_banner,
};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "invguard-server")]
#[command(about = "Inventory ledger backup scheduler and operator tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the backup scheduler (default)
    Run,

    /// Run one health-gated backup cycle now
    Backup,

    /// Delete backups past the retention horizon
    Cleanup,

    /// Probe the upstream API (exit code 0 = healthy)
    Health,

    /// Verify a backup file
    Verify {
        file: PathBuf,
    },

    /// Restore a backup over the database
    Restore {
        file: PathBuf,

        /// Destination (default: DATABASE_PATH)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Confirm overwriting the destination
        #[arg(long)]
        yes: bool,
    },

    /// Create the database and seed initial accounts
    Init,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Backup => backup_now(&config).await,
        Commands::Cleanup => cleanup(&config).await,
        Commands::Health => health(&config).await,
        Commands::Verify { file } => verify(&config, &file).await,
        Commands::Restore { file, dest, yes } => restore(&config, &file, dest, yes).await,
        Commands::Init => init(&config).await,
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<bool> {
    print_banner();
    tracing::info!(
        database = %config.database_path.display(),
        backups = %config.backup_path.display(),
        timezone = %config.timezone,
        encrypted = config.gpg_passphrase.is_some(),
        "InvGuard backup scheduler starting..."
    );
    if config.gpg_passphrase.is_none() {
        tracing::warn!("GPG_PASSPHRASE not set, backups will be stored unencrypted");
    }

    tokio::fs::create_dir_all(&config.backup_path)
        .await
        .with_context(|| format!("Failed to create {}", config.backup_path.display()))?;

    let scheduler = Arc::new(BackupScheduler::from_config(&config).context("Failed to build HTTP client")?);

    let mut tasks = BackgroundTasks::new();
    let shutdown = tasks.shutdown_token();

    let warmup = scheduler.clone();
    tasks.spawn("initial_health_check", TaskKind::Warmup, async move {
        warmup.run_cycle(Cycle::Hourly).await;
    });
    for cycle in [Cycle::Daily, Cycle::Hourly, Cycle::Weekly] {
        tasks.spawn(
            cycle.name(),
            TaskKind::Periodic,
            scheduler.clone().run_loop(cycle, shutdown.clone()),
        );
    }
    tasks.log_summary();

    let mut interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                let dead = tasks.check_health();
                if dead > 0 {
                    tracing::error!(dead, "Scheduler loops stopped unexpectedly");
                }
            }
        }
    }

    tasks.shutdown().await;
    tracing::info!("InvGuard backup scheduler stopped");
    Ok(true)
}

async fn backup_now(config: &Config) -> anyhow::Result<bool> {
    let scheduler = BackupScheduler::from_config(config).context("Failed to build HTTP client")?;
    let outcome = scheduler.daily_cycle().await;
    tracing::info!("Backup cycle finished: {:?}", outcome);
    Ok(matches!(outcome, CycleOutcome::Verified(_)))
}

async fn cleanup(config: &Config) -> anyhow::Result<bool> {
    let report = backup::purge_older_than(&config.backup_path, config.retention_days)
        .await
        .with_context(|| format!("Failed to read {}", config.backup_path.display()))?;
    println!(
        "Removed {} backup(s), kept {}, failed {}",
        report.removed.len(),
        report.kept,
        report.failed.len()
    );
    Ok(report.is_clean())
}

async fn health(config: &Config) -> anyhow::Result<bool> {
    let scheduler = BackupScheduler::from_config(config).context("Failed to build HTTP client")?;
    let healthy = scheduler.hourly_cycle().await;
    println!("{}", if healthy { "healthy" } else { "unhealthy" });
    Ok(healthy)
}

async fn verify(config: &Config, file: &std::path::Path) -> anyhow::Result<bool> {
    let scheduler = BackupScheduler::from_config(config).context("Failed to build HTTP client")?;
    let ok = scheduler
        .verifier()
        .verify(file, scheduler.passphrase())
        .await;
    println!("{}: {}", file.display(), if ok { "OK" } else { "FAILED" });
    Ok(ok)
}

async fn restore(
    config: &Config,
    file: &std::path::Path,
    dest: Option<PathBuf>,
    yes: bool,
) -> anyhow::Result<bool> {
    let dest = dest.unwrap_or_else(|| config.database_path.clone());
    if !yes {
        anyhow::bail!(
            "Restoring {} would overwrite {}; pass --yes to confirm",
            file.display(),
            dest.display()
        );
    }
    let scheduler = BackupScheduler::from_config(config).context("Failed to build HTTP client")?;
    let ok = scheduler
        .engine()
        .restore_backup(file, &dest, scheduler.passphrase())
        .await;
    if ok {
        println!("Restored {} to {}", file.display(), dest.display());
    }
    Ok(ok)
}

async fn init(config: &Config) -> anyhow::Result<bool> {
    let store = Store::open(&config.database_path)
        .await
        .with_context(|| format!("Failed to open {}", config.database_path.display()))?;
    store
        .initialize(&config.seed_config())
        .await
        .context("Failed to seed database")?;
    store.close().await;
    println!("Database ready at {}", config.database_path.display());
    Ok(true)
}

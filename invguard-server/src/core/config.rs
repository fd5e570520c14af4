use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;

use crate::utils::time;

/// Minimum admin password length accepted in production
const MIN_PRODUCTION_PASSWORD_LEN: usize = 12;

/// Passwords rejected in production regardless of length
const WEAK_PASSWORDS: &[&str] = &["admin", "admin123", "password", "changeme", "viewer123"];

/// Backup encryption backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionBackend {
    /// External `gpg` binary (OpenPGP symmetric, `.gpg`)
    Gpg,
    /// In-process AES-256-GCM envelope (`.enc`)
    Envelope,
}

impl EncryptionBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "gpg" => Some(Self::Gpg),
            "envelope" => Some(Self::Envelope),
            _ => None,
        }
    }
}

/// Configuration errors found by [`Config::validate`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("ADMIN_PASSWORD must be set in production")]
    MissingAdminPassword,

    #[error("ADMIN_PASSWORD is too weak for production")]
    WeakAdminPassword,

    #[error("BACKUP_RETENTION_DAYS must be at least 1")]
    ZeroRetention,
}

/// InvGuard 配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DATABASE_PATH | /app/data/inventory.db | 库存数据库文件 |
/// | BACKUP_PATH | /app/backups | 备份目录 |
/// | BACKUP_PREFIX | inventory_backup | 备份文件名前缀 |
/// | GPG_PASSPHRASE | (unset) | 备份加密口令，未设置则不加密 |
/// | BACKUP_ENCRYPTION | gpg | gpg 或 envelope |
/// | GPG_BINARY | gpg | gpg 可执行文件 |
/// | ENCRYPTION_TIMEOUT_SECS | 120 | 加密/解密超时 |
/// | VERIFY_TIMEOUT_SECS | 30 | 校验超时 |
/// | BACKUP_RETENTION_DAYS | 30 | 备份保留天数 |
/// | API_URL | http://backend:5000/api | 健康检查目标 |
/// | TIMEZONE | UTC | 调度时区 |
/// | DAILY_BACKUP_TIME | 02:00 | 每日备份时间 |
/// | WEEKLY_MAINTENANCE_DAY | sunday | 每周维护日 |
/// | WEEKLY_MAINTENANCE_TIME | 03:00 | 每周维护时间 |
/// | ADMIN_USERNAME | admin | 初始管理员 |
/// | ADMIN_PASSWORD | (unset) | 初始管理员口令 |
/// | VIEWER_PASSWORD | viewer123 | 只读账号口令 |
/// | SEED_SAMPLE_DATA | true | 空库时写入示例商品 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (unset) | 日志目录 |
/// | ENVIRONMENT | development | 运行环境 |
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub backup_path: PathBuf,
    pub backup_prefix: String,
    /// `None` → backups are written unencrypted
    pub gpg_passphrase: Option<String>,
    pub encryption: EncryptionBackend,
    pub gpg_binary: String,
    pub encryption_timeout: Duration,
    pub verify_timeout: Duration,
    pub retention_days: u32,
    pub api_url: String,
    pub timezone: Tz,
    pub daily_backup_time: NaiveTime,
    pub weekly_maintenance_day: Weekday,
    pub weekly_maintenance_time: NaiveTime,
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub viewer_password: String,
    pub seed_sample_data: bool,
    pub log_level: String,
    pub log_dir: Option<String>,
    /// development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "/app/data/inventory.db".into())
                .into(),
            backup_path: std::env::var("BACKUP_PATH")
                .unwrap_or_else(|_| "/app/backups".into())
                .into(),
            backup_prefix: std::env::var("BACKUP_PREFIX")
                .unwrap_or_else(|_| "inventory_backup".into()),
            gpg_passphrase: std::env::var("GPG_PASSPHRASE")
                .ok()
                .filter(|p| !p.is_empty()),
            encryption: std::env::var("BACKUP_ENCRYPTION")
                .ok()
                .and_then(|v| EncryptionBackend::parse(&v))
                .unwrap_or(EncryptionBackend::Gpg),
            gpg_binary: std::env::var("GPG_BINARY").unwrap_or_else(|_| "gpg".into()),
            encryption_timeout: Duration::from_secs(
                std::env::var("ENCRYPTION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(120),
            ),
            verify_timeout: Duration::from_secs(
                std::env::var("VERIFY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            retention_days: std::env::var("BACKUP_RETENTION_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            api_url: std::env::var("API_URL")
                .unwrap_or_else(|_| "http://backend:5000/api".into()),
            timezone: std::env::var("TIMEZONE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(chrono_tz::UTC),
            daily_backup_time: std::env::var("DAILY_BACKUP_TIME")
                .ok()
                .and_then(|v| time::parse_hhmm(&v))
                .unwrap_or_else(|| time::hhmm(2, 0)),
            weekly_maintenance_day: std::env::var("WEEKLY_MAINTENANCE_DAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Weekday::Sun),
            weekly_maintenance_time: std::env::var("WEEKLY_MAINTENANCE_TIME")
                .ok()
                .and_then(|v| time::parse_hhmm(&v))
                .unwrap_or_else(|| time::hhmm(3, 0)),
            admin_username: std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".into()),
            admin_password: std::env::var("ADMIN_PASSWORD")
                .ok()
                .filter(|p| !p.is_empty()),
            viewer_password: std::env::var("VIEWER_PASSWORD")
                .unwrap_or_else(|_| "viewer123".into()),
            seed_sample_data: std::env::var("SEED_SAMPLE_DATA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }

    /// Configuration rooted at `data_dir`, for tests and local runs
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let mut config = Self::from_env();
        config.database_path = data_dir.join("inventory.db");
        config.backup_path = data_dir.join("backups");
        config
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Reject settings that are unsafe to run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if self.is_production() {
            let password = self
                .admin_password
                .as_deref()
                .ok_or(ConfigError::MissingAdminPassword)?;
            if password.len() < MIN_PRODUCTION_PASSWORD_LEN
                || WEAK_PASSWORDS.contains(&password.to_ascii_lowercase().as_str())
            {
                return Err(ConfigError::WeakAdminPassword);
            }
        }
        Ok(())
    }

    /// Seed accounts for [`crate::db::Store::initialize`]
    pub fn seed_config(&self) -> crate::db::SeedConfig {
        crate::db::SeedConfig {
            admin_username: self.admin_username.clone(),
            admin_password: self
                .admin_password
                .clone()
                .unwrap_or_else(|| "admin123".into()),
            viewer_password: self.viewer_password.clone(),
            sample_data: self.seed_sample_data,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        let mut config = Config::with_data_dir("/tmp/invguard-test");
        config.retention_days = 30;
        config.environment = "development".into();
        config.admin_password = None;
        config
    }

    #[test]
    fn test_development_allows_default_password() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_production_requires_strong_admin_password() {
        let mut config = base();
        config.environment = "production".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingAdminPassword)
        ));

        config.admin_password = Some("admin123".into());
        assert!(matches!(config.validate(), Err(ConfigError::WeakAdminPassword)));

        config.admin_password = Some("correct-horse-battery".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_retention_rejected() {
        let mut config = base();
        config.retention_days = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroRetention)));
    }

    #[test]
    fn test_encryption_backend_parse() {
        assert_eq!(EncryptionBackend::parse("GPG"), Some(EncryptionBackend::Gpg));
        assert_eq!(
            EncryptionBackend::parse("envelope"),
            Some(EncryptionBackend::Envelope)
        );
        assert_eq!(EncryptionBackend::parse("rot13"), None);
    }
}

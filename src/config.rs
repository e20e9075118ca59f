//! Layered configuration.
//!
//! Lowest to highest precedence: built-in defaults, the TOML config file,
//! `DATABASE_URL` from the environment, command line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::Deserialize;

use crate::cli::{DumpArgs, StorageArgs};
use crate::dump::{DEFAULT_DUMP_TOOL, DEFAULT_TIMEOUT};
use crate::error::{BackupError, Result};
use crate::platform;
use crate::retention::RetentionPolicy;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub backup_dir: PathBuf,
    archive_dir: Option<PathBuf>,
    pub dump_tool: String,
    pub timeout: Duration,
    pub lock_wait: Duration,
    pub policy: RetentionPolicy,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    database_url: Option<String>,
    backup_dir: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
    dump_tool: Option<String>,
    timeout: Option<String>,
    lock_wait: Option<String>,
    retention: RetentionSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RetentionSection {
    keep_latest: Option<usize>,
    weekly_window: Option<String>,
    monthly_window: Option<String>,
    archive_max_age: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: None,
            backup_dir: platform::default_backup_dir(),
            archive_dir: None,
            dump_tool: DEFAULT_DUMP_TOOL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            lock_wait: DEFAULT_LOCK_WAIT,
            policy: RetentionPolicy::default(),
        }
    }
}

impl Config {
    /// Defaults, then the config file, then `DATABASE_URL`.
    ///
    /// An explicit `path` must exist; the platform default is only read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => match platform::default_config_file().filter(|p| p.is_file()) {
                Some(path) => Config::from_file(&path)?,
                None => Config::default(),
            },
        };

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.apply_env_database_url(url);
        }

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            BackupError::io(format!("failed to read config file {}", path.display()), e)
        })?;
        Config::from_toml(&text).map_err(|e| match e {
            BackupError::Configuration(msg) => {
                BackupError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let file: FileConfig =
            toml::from_str(text).map_err(|e| BackupError::Configuration(e.to_string()))?;

        let mut config = Config::default();
        if let Some(url) = file.database_url {
            config.database_url = Some(url);
        }
        if let Some(dir) = file.backup_dir {
            config.backup_dir = dir;
        }
        config.archive_dir = file.archive_dir;
        if let Some(tool) = file.dump_tool {
            config.dump_tool = tool;
        }
        if let Some(timeout) = file.timeout {
            config.timeout = parse_duration("timeout", &timeout)?;
        }
        if let Some(wait) = file.lock_wait {
            config.lock_wait = parse_duration("lock_wait", &wait)?;
        }

        let retention = file.retention;
        if let Some(keep) = retention.keep_latest {
            config.policy.keep_latest = keep;
        }
        if let Some(window) = retention.weekly_window {
            config.policy.weekly_window = parse_window("retention.weekly_window", &window)?;
        }
        if let Some(window) = retention.monthly_window {
            config.policy.monthly_window = parse_window("retention.monthly_window", &window)?;
        }
        if let Some(age) = retention.archive_max_age {
            config.policy.archive_max_age = parse_window("retention.archive_max_age", &age)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_database_url(&mut self, url: String) {
        if !url.trim().is_empty() {
            self.database_url = Some(url);
        }
    }

    pub fn apply_storage_args(&mut self, args: &StorageArgs) {
        if let Some(dir) = &args.backup_dir {
            self.backup_dir = dir.clone();
        }
        if let Some(dir) = &args.archive_dir {
            self.archive_dir = Some(dir.clone());
        }
    }

    pub fn apply_dump_args(&mut self, args: &DumpArgs) -> Result<()> {
        if let Some(url) = &args.database_url {
            self.database_url = Some(url.clone());
        }
        if let Some(secs) = args.timeout {
            self.timeout = Duration::from_secs(secs);
        }
        self.validate()
    }

    /// Archive location, `<backup_dir>/archive` unless set explicitly.
    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.backup_dir.join("archive"))
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            BackupError::Configuration(format!(
                "no database url configured (set {DATABASE_URL_ENV}, --database-url or database_url in the config file)"
            ))
        })
    }

    fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(BackupError::Configuration(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| BackupError::Configuration(format!("invalid {key} '{value}': {e}")))
}

fn parse_window(key: &str, value: &str) -> Result<TimeDelta> {
    let duration = parse_duration(key, value)?;
    TimeDelta::from_std(duration)
        .map_err(|_| BackupError::Configuration(format!("{key} '{value}' is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.database_url, None);
        assert_eq!(config.dump_tool, "pg_dump");
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.policy, RetentionPolicy::default());
        assert_eq!(config.archive_dir(), config.backup_dir.join("archive"));
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            r#"
database_url = "postgresql://app@db/app"
backup_dir = "/srv/backups"
archive_dir = "/mnt/cold/archive"
dump_tool = "/usr/lib/postgresql/16/bin/pg_dump"
timeout = "10m"
lock_wait = "0s"

[retention]
keep_latest = 7
weekly_window = "8w"
monthly_window = "180d"
archive_max_age = "2years"
"#,
        )
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgresql://app@db/app"));
        assert_eq!(config.backup_dir, PathBuf::from("/srv/backups"));
        assert_eq!(config.archive_dir(), PathBuf::from("/mnt/cold/archive"));
        assert_eq!(config.dump_tool, "/usr/lib/postgresql/16/bin/pg_dump");
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert_eq!(config.lock_wait, Duration::ZERO);
        assert_eq!(config.policy.keep_latest, 7);
        assert_eq!(config.policy.weekly_window, TimeDelta::weeks(8));
        assert_eq!(config.policy.monthly_window, TimeDelta::days(180));
        assert!(config.policy.archive_max_age > TimeDelta::days(730));
    }

    #[test]
    fn test_rejects_bad_values() {
        for text in [
            "timeout = \"soon\"",
            "timeout = \"0s\"",
            "unknown_key = 1",
            "[retention]\nweekly_window = \"four weeks\"",
        ] {
            let err = Config::from_toml(text).unwrap_err();
            assert!(matches!(err, BackupError::Configuration(_)), "{text}: {err}");
        }
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = Config::from_toml(
            "database_url = \"postgresql://file@db/app\"\nbackup_dir = \"/from/file\"\ntimeout = \"1m\"",
        )
        .unwrap();

        config.apply_env_database_url("postgresql://env@db/app".to_string());
        assert_eq!(config.database_url().unwrap(), "postgresql://env@db/app");

        config.apply_storage_args(&StorageArgs {
            backup_dir: Some(PathBuf::from("/from/flag")),
            archive_dir: None,
        });
        config
            .apply_dump_args(&DumpArgs {
                database_url: Some("postgresql://flag@db/app".to_string()),
                timeout: Some(5),
            })
            .unwrap();

        assert_eq!(config.database_url().unwrap(), "postgresql://flag@db/app");
        assert_eq!(config.archive_dir(), PathBuf::from("/from/flag/archive"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_database_url() {
        let mut config = Config::from_toml("").unwrap();
        config.apply_env_database_url("  ".to_string());
        assert!(matches!(config.database_url(), Err(BackupError::Configuration(_))));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = Config::load(Some(missing.as_path())).unwrap_err();
        assert!(matches!(err, BackupError::Io { .. }));
    }
}

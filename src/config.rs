//! Client configuration - where databases live and how connections are tuned

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const ENV_PREFIX: &str = "DB_SNIPPETS_";

/// SQLite journal modes accepted for client connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
}

impl JournalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
        }
    }

    /// Get mode from string name (case insensitive)
    pub fn parse_mode(s: &str) -> Option<JournalMode> {
        match s.to_uppercase().as_str() {
            "DELETE" => Some(JournalMode::Delete),
            "TRUNCATE" => Some(JournalMode::Truncate),
            "PERSIST" => Some(JournalMode::Persist),
            "MEMORY" => Some(JournalMode::Memory),
            "WAL" => Some(JournalMode::Wal),
            _ => None,
        }
    }
}

/// SQLite `synchronous` levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    Off,
    Normal,
    Full,
    Extra,
}

impl Synchronous {
    pub fn as_str(&self) -> &'static str {
        match self {
            Synchronous::Off => "OFF",
            Synchronous::Normal => "NORMAL",
            Synchronous::Full => "FULL",
            Synchronous::Extra => "EXTRA",
        }
    }

    pub fn parse_level(s: &str) -> Option<Synchronous> {
        match s.to_uppercase().as_str() {
            "OFF" => Some(Synchronous::Off),
            "NORMAL" => Some(Synchronous::Normal),
            "FULL" => Some(Synchronous::Full),
            "EXTRA" => Some(Synchronous::Extra),
            _ => None,
        }
    }
}

/// Settings shared by database handles and the admin client.
///
/// Every field has a default, so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Root under which `<project>/<instance>/<database>.db` files are kept
    pub data_dir: PathBuf,
    pub journal_mode: JournalMode,
    pub synchronous: Synchronous,
    /// How long a statement waits on a locked database before failing busy
    pub busy_timeout_ms: u64,
    /// Attempts a read-write transaction gets before it is reported aborted
    pub max_commit_attempts: u32,
    /// Base delay between transaction attempts, doubled on each retry
    pub retry_backoff_ms: u64,
    /// Cadence at which a blocking admin wait re-checks its operation
    pub admin_poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            journal_mode: JournalMode::Wal,
            synchronous: Synchronous::Normal,
            busy_timeout_ms: 5_000,
            max_commit_attempts: 5,
            retry_backoff_ms: 10,
            admin_poll_interval_ms: 25,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `DB_SNIPPETS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("{ENV_PREFIX}{key}")).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(mode) = lookup("JOURNAL_MODE") {
            config.journal_mode = JournalMode::parse_mode(&mode)
                .ok_or_else(|| Error::Config(format!("unknown journal mode: {mode}")))?;
        }
        if let Some(level) = lookup("SYNCHRONOUS") {
            config.synchronous = Synchronous::parse_level(&level)
                .ok_or_else(|| Error::Config(format!("unknown synchronous level: {level}")))?;
        }
        if let Some(value) = lookup("BUSY_TIMEOUT_MS") {
            config.busy_timeout_ms = parse_number("BUSY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("MAX_COMMIT_ATTEMPTS") {
            config.max_commit_attempts = parse_number("MAX_COMMIT_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("RETRY_BACKOFF_MS") {
            config.retry_backoff_ms = parse_number("RETRY_BACKOFF_MS", &value)?;
        }
        if let Some(value) = lookup("ADMIN_POLL_INTERVAL_MS") {
            config.admin_poll_interval_ms = parse_number("ADMIN_POLL_INTERVAL_MS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_commit_attempts == 0 {
            return Err(Error::Config(
                "max_commit_attempts must be at least 1".to_string(),
            ));
        }
        if self.admin_poll_interval_ms == 0 {
            return Err(Error::Config(
                "admin_poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn admin_poll_interval(&self) -> Duration {
        Duration::from_millis(self.admin_poll_interval_ms)
    }

    /// Backoff before the given retry (1-based), capped at one second
    pub fn retry_backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor).min(1_000))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{ENV_PREFIX}{key} is not a number: {value}")))
}

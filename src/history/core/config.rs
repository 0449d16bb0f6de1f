//! Configuration for the chat history service.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::history::core::errors::{HistoryError, HistoryResult};

/// Environment variable holding either a config path or inline JSON.
pub const CONFIG_ENV: &str = "CONFIG";
/// Environment variable that switches on development mode.
pub const DEV_ENV: &str = "DEV";

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Development settings.
    pub dev: DevConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl HistoryConfig {
    /// Load configuration from `path`, falling back to inline JSON in `CONFIG`.
    ///
    /// `DEV=true` forces demo seeding on.
    ///
    /// # Errors
    /// Returns an error if neither source exists, the JSON is malformed, or
    /// validation fails.
    pub fn load(path: impl AsRef<Path>) -> HistoryResult<Self> {
        let path = path.as_ref();
        let raw = if path.is_file() {
            std::fs::read_to_string(path)?
        } else {
            std::env::var(CONFIG_ENV).map_err(|_| {
                HistoryError::InvalidConfig(format!(
                    "config file {} not found and {CONFIG_ENV} holds no JSON",
                    path.display()
                ))
            })?
        };

        let mut config = Self::from_json(&raw)?;
        if dev_mode_from_env() {
            config.dev.seed_demo_data = true;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults.
    ///
    /// # Errors
    /// Returns a serialization error for malformed JSON.
    pub fn from_json(raw: &str) -> HistoryResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> HistoryResult<()> {
        self.storage.validate()?;
        if self.logging.filter.trim().is_empty() {
            return Err(HistoryError::InvalidConfig(
                "logging.filter must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn dev_mode_from_env() -> bool {
    std::env::var(DEV_ENV).is_ok_and(|value| value.eq_ignore_ascii_case("true"))
}

/// Storage configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `SQLite` database path. `:memory:` opens a private in-memory database.
    pub sqlite_path: PathBuf,
    /// Conversation table name.
    pub conversation_table: String,
    /// Message table name.
    pub message_table: String,
    /// How long a connection waits on a busy database file.
    pub busy_timeout_ms: u64,
    /// Reader connections kept open between reads.
    pub max_idle_readers: usize,
}

impl StorageConfig {
    /// Path value selecting an in-memory database.
    pub const IN_MEMORY: &'static str = ":memory:";

    /// Config for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            sqlite_path: PathBuf::from(Self::IN_MEMORY),
            ..Self::default()
        }
    }

    /// Config for a database file at `path`.
    #[must_use]
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            sqlite_path: path.into(),
            ..Self::default()
        }
    }

    /// Whether this config selects an in-memory database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.sqlite_path.as_os_str() == Self::IN_MEMORY
    }

    /// Validate table names and limits.
    ///
    /// # Errors
    /// Returns an error for unusable table names or a zero reader pool.
    pub fn validate(&self) -> HistoryResult<()> {
        for (field, table) in [
            ("conversation_table", &self.conversation_table),
            ("message_table", &self.message_table),
        ] {
            if !is_plain_identifier(table) {
                return Err(HistoryError::InvalidConfig(format!(
                    "storage.{field} must be a plain identifier, got {table:?}"
                )));
            }
        }
        if self.conversation_table.eq_ignore_ascii_case(&self.message_table) {
            return Err(HistoryError::InvalidConfig(
                "storage.conversation_table and storage.message_table must differ".to_string(),
            ));
        }
        if self.max_idle_readers == 0 {
            return Err(HistoryError::InvalidConfig(
                "storage.max_idle_readers must be > 0".to_string(),
            ));
        }
        if self.sqlite_path.as_os_str().is_empty() {
            return Err(HistoryError::InvalidConfig(
                "storage.sqlite_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("chat_history.sqlite"),
            conversation_table: "conversations".to_string(),
            message_table: "messages".to_string(),
            busy_timeout_ms: 5_000,
            max_idle_readers: 4,
        }
    }
}

fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Development settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevConfig {
    /// Insert the demo conversations on startup.
    pub seed_demo_data: bool,
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` env-filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

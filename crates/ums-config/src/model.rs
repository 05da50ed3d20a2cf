use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration for `ums-migrate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tournament_bot_core.db"),
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Name of the applied-migrations table.
    pub table: String,
    /// Older `schema_migrations(version, applied_at)` table to adopt records
    /// from. `None` disables adoption.
    pub legacy_table: Option<String>,
    /// Directory for the pre-migration backup. `None` skips the backup.
    pub backup_dir: Option<PathBuf>,
    /// Tables `verify` requires. `None` means the UMS Core set.
    pub expected_tables: Option<Vec<String>>,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            table: "applied_migrations".to_string(),
            legacy_table: Some("schema_migrations".to_string()),
            backup_dir: None,
            expected_tables: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use ums_common::identity::is_valid_name;
use ums_common::{Error, Result};

use crate::model::AppConfig;

/// Reads `AppConfig` from YAML or TOML, chosen by file extension.
pub struct ConfigLoader;

impl ConfigLoader {
    /// `~/.config/ums` on Linux, the platform equivalent elsewhere.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ums"))
    }

    /// Load from `path`, or from `config.yml` in [`Self::default_dir`] when it
    /// exists, or fall back to defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_dir()
                .map(|dir| dir.join("config.yml"))
                .filter(|candidate| candidate.is_file())
            {
                Some(found) => Self::from_file(&found)?,
                None => {
                    debug!("no config file found, using defaults");
                    AppConfig::default()
                }
            },
        };
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display())))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display())))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(config: &AppConfig) -> Result<()> {
        if !is_valid_name(&config.migrations.table) {
            return Err(Error::Config(format!(
                "invalid migrations.table: {:?}",
                config.migrations.table
            )));
        }
        if let Some(legacy) = &config.migrations.legacy_table {
            if !is_valid_name(legacy) {
                return Err(Error::Config(format!(
                    "invalid migrations.legacy_table: {legacy:?}"
                )));
            }
            if *legacy == config.migrations.table {
                return Err(Error::Config(
                    "migrations.legacy_table must differ from migrations.table".into(),
                ));
            }
        }
        if config.database.path.as_os_str().is_empty() {
            return Err(Error::Config("database.path is empty".into()));
        }
        Ok(())
    }
}

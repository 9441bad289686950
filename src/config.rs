//! Application configuration.

use crate::consts::dash_consts::{self, network};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Directory under the user's home holding the config file and the local
/// storage slot.
const CONFIG_DIR: &str = ".dashboard-state";
const CONFIG_FILE: &str = "config.json";
const STORAGE_FILE: &str = "dashboard.json";

/// Environment variable overriding the document store URL.
pub const ELASTICSEARCH_ENV: &str = "DASHBOARD_ELASTICSEARCH";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Elasticsearch-compatible store.
    pub elasticsearch: String,
    /// Index holding saved dashboards.
    pub kibana_index: String,
    /// Directory served as the static dashboards source.
    pub dashboards_dir: Option<PathBuf>,
    /// Base URL whose `dashboards/` path serves static dashboards.
    pub dashboards_url: Option<String>,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            elasticsearch: network::DEFAULT_ELASTICSEARCH.to_string(),
            kibana_index: dash_consts::DEFAULT_STORE_INDEX.to_string(),
            dashboards_dir: None,
            dashboards_url: None,
            request_timeout_secs: network::REQUEST_TIMEOUT_SECS,
            max_retries: network::MAX_RETRIES,
        }
    }
}

impl Config {
    /// Create Config pointing at the given store.
    pub fn new(elasticsearch: String) -> Self {
        Config {
            elasticsearch,
            ..Config::default()
        }
    }

    /// Loads configuration from a JSON file at the given path.
    ///
    /// # Errors
    /// Returns an `std::io::Error` if reading from file fails or JSON is invalid.
    pub fn load_from_file(path: &Path) -> Result<Self, std::io::Error> {
        let buf = fs::read(path)?;
        let config: Config = serde_json::from_slice(&buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(config)
    }

    /// Loads the file if it exists, falling back to defaults otherwise, then
    /// applies environment overrides.
    pub fn load_or_default(path: &Path) -> Result<Self, std::io::Error> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Config::default()
        };
        if let Ok(url) = std::env::var(ELASTICSEARCH_ENV) {
            if !url.trim().is_empty() {
                config.elasticsearch = url;
            }
        }
        Ok(config)
    }

    /// Saves the configuration to a JSON file at the given path.
    ///
    /// Directories will be created if they don't exist. This method overwrites existing files.
    ///
    /// # Errors
    /// Returns an `std::io::Error` if writing to file fails or serialization fails.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn config_dir() -> Result<PathBuf, std::io::Error> {
    let home = home::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        )
    })?;
    Ok(home.join(CONFIG_DIR))
}

/// `~/.dashboard-state/config.json`
pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// `~/.dashboard-state/dashboard.json`, the persistent local storage slot.
pub fn get_storage_path() -> Result<PathBuf, std::io::Error> {
    Ok(config_dir()?.join(STORAGE_FILE))
}

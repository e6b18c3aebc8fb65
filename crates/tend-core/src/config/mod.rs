//! Client configuration shared by every Tend interface.
//!
//! Values come from `<config dir>/tend/config.json` and are then overridden
//! by `TEND_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::CollectionItem;
use crate::remote::HttpGateway;
use crate::sync::SyncOptions;
use crate::util::{is_http_url, normalize_text_option, parse_flag};

const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "tend.db";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_URL: &str = "TEND_API_URL";
pub const ENV_DATA_DIR: &str = "TEND_DATA_DIR";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TEND_REQUEST_TIMEOUT_SECS";
pub const ENV_RETAIN_FAILED_DELETES: &str = "TEND_RETAIN_FAILED_DELETES";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root of the REST API; `None` keeps every collection offline.
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retain_failed_deletes: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            data_dir: default_data_dir(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retain_failed_deletes: false,
        }
    }
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tend")
}

/// Location of the config file when none is given explicitly.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tend")
        .join(CONFIG_FILE_NAME)
}

impl ClientConfig {
    /// Load the config file (default location when `path` is `None`) and
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map_or_else(default_config_path, Path::to_path_buf);
        Self::from_lookup(&path, |name| std::env::var(name).ok())
    }

    /// Like [`ClientConfig::load`] with an injectable environment.
    pub fn from_lookup<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_from_path(path);

        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            config.api_base_url = Some(url);
        }
        if let Some(dir) = normalize_text_option(lookup(ENV_DATA_DIR)) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_REQUEST_TIMEOUT_SECS)) {
            config.request_timeout_secs = raw.parse().map_err(|_| {
                Error::Config(format!(
                    "{ENV_REQUEST_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_RETAIN_FAILED_DELETES)) {
            config.retain_failed_deletes = parse_flag(&raw).ok_or_else(|| {
                Error::Config(format!("{ENV_RETAIN_FAILED_DELETES} must be true or false, got '{raw}'"))
            })?;
        }

        config.normalize()?;
        Ok(config)
    }

    /// Read the config file; a missing or unparsable file yields defaults.
    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!("Failed to read config at {}: {error}", path.display());
                return Self::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|error| {
            tracing::warn!("Ignoring invalid config at {}: {error}", path.display());
            Self::default()
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Override the API base URL (e.g. from a CLI flag).
    pub fn with_api_base_url(mut self, url: Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(url) {
            self.api_base_url = Some(url);
            self.normalize()?;
        }
        Ok(self)
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data_dir = dir;
        }
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            retain_failed_deletes: self.retain_failed_deletes,
        }
    }

    pub const fn is_remote_configured(&self) -> bool {
        self.api_base_url.is_some()
    }

    /// Gateway for collection `T`; unconfigured when no API URL is set.
    pub fn gateway<T: CollectionItem>(&self) -> Result<HttpGateway<T>> {
        match &self.api_base_url {
            Some(url) => Ok(HttpGateway::new(url.clone(), self.request_timeout())?),
            None => Ok(HttpGateway::unconfigured()),
        }
    }

    fn normalize(&mut self) -> Result<()> {
        if let Some(url) = normalize_text_option(self.api_base_url.take()) {
            if !is_http_url(&url) {
                return Err(Error::Config(format!(
                    "API URL must include http:// or https://, got '{url}'"
                )));
            }
            self.api_base_url = Some(url.trim_end_matches('/').to_string());
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

//! Tracker configuration.
//!
//! Layered lowest to highest: built-in defaults, a TOML file, then the
//! `PLTX_COLLECTOR_HOST` / `PLTX_SOCKET` environment variables. The CLI
//! may override the socket path on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use pltx_protocol::DEFAULT_COLLECTOR_HOST;

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/pltx.sock";

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "PLTX_SOCKET";

/// Environment variable overriding the collector host.
pub const COLLECTOR_HOST_ENV: &str = "PLTX_COLLECTOR_HOST";

/// Runtime settings for trackers and the host bridge server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Host receiving `/v1/<bucket>/ping.gif` requests
    pub collector_host: String,

    /// Unix socket the host bridge connects to
    pub socket_path: PathBuf,

    /// Delay between `seeked` and the end of the seek
    pub seek_debounce_ms: u64,

    /// Per-beacon HTTP timeout
    pub request_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            collector_host: DEFAULT_COLLECTOR_HOST.to_string(),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            seek_debounce_ms: 1000,
            request_timeout_ms: 5000,
        }
    }
}

impl TrackerConfig {
    pub fn seek_debounce(&self) -> Duration {
        Duration::from_millis(self.seek_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// `$XDG_CONFIG_HOME/pltx/config.toml` (or platform equivalent).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pltx").join("config.toml"))
    }

    /// Loads configuration from `explicit` if given, else from the default
    /// path when it exists, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or any file read
    /// cannot be parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::read(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parses a TOML document; unset keys keep their defaults.
    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Applies environment overrides using the given lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(COLLECTOR_HOST_ENV).filter(|v| !v.is_empty()) {
            self.collector_host = host;
        }
        if let Some(socket) = lookup(SOCKET_ENV).filter(|v| !v.is_empty()) {
            self.socket_path = PathBuf::from(socket);
        }
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

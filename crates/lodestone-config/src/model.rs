//! Typed configuration model and the layered loader.

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Aggregated application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// HTTP listener configuration.
    pub server: ServerSettings,
    /// SQLite database configuration.
    pub database: DatabaseSettings,
    /// Download scheduler configuration.
    pub download: DownloadSettings,
    /// Object storage configuration.
    pub storage: StorageSettings,
    /// Optional API authentication overlay.
    #[serde(default)]
    pub auth: AuthSettings,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Socket address the API listener binds to.
    pub addr: String,
}

/// Database settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Path of the SQLite database file.
    pub path: String,
}

/// Download scheduler settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSettings {
    /// Root directory the torrent engine writes pieces under.
    pub data_dir: String,
    /// Maximum number of concurrently running task pipelines.
    pub max_concurrent: usize,
    /// Seconds between progress snapshots while downloading.
    pub status_interval_secs: u64,
    /// Extra trackers announced for every torrent; empty selects the
    /// built-in public tracker list.
    #[serde(default)]
    pub trackers: Vec<String>,
}

/// Object storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Destination bucket; required.
    pub bucket: String,
    /// Key prefix all task uploads are nested under.
    pub key_prefix: String,
    /// Region handed to the S3 client.
    pub region: String,
    /// Custom endpoint for S3-compatible services; enables path-style
    /// addressing when set.
    pub endpoint: String,
}

/// Optional bearer-token overlay for the control API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSettings {
    /// Static token required in `Authorization: Bearer` headers when set.
    pub api_token: Option<String>,
}

impl Settings {
    /// Load settings from defaults, an optional `config.*` file, and
    /// `LODESTONE_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or the merged tree does
    /// not deserialize into [`Settings`].
    pub fn load() -> Result<Self> {
        Self::load_from(Some("config"))
    }

    /// Load settings with an explicit optional file stem (tests pass `None`).
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or the merged tree does
    /// not deserialize into [`Settings`].
    pub fn load_from(file_stem: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("server.addr", "0.0.0.0:8080")?
            .set_default("database.path", "data/magnet.db")?
            .set_default("download.data_dir", "data/downloads")?
            .set_default("download.max_concurrent", 3)?
            .set_default("download.status_interval_secs", 2)?
            .set_default("storage.bucket", "")?
            .set_default("storage.key_prefix", "magnet-tasks")?
            .set_default("storage.region", "us-east-1")?
            .set_default("storage.endpoint", "")?;

        if let Some(stem) = file_stem {
            builder = builder.add_source(File::with_name(stem).required(false));
        }

        let settings: Self = builder
            .add_source(Environment::with_prefix("LODESTONE").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Validate settings that cannot be defaulted.
    ///
    /// # Errors
    ///
    /// Returns an error when the storage bucket is empty or numeric knobs are
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "storage.bucket",
            });
        }
        if self.download.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "download.max_concurrent",
                value: self.download.max_concurrent.to_string(),
            });
        }
        if self.download.status_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "download.status_interval_secs",
                value: self.download.status_interval_secs.to_string(),
            });
        }
        Ok(())
    }

    /// Parsed listener address.
    ///
    /// # Errors
    ///
    /// Returns an error when `server.addr` is not a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.server
            .addr
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                field: "server.addr",
                value: self.server.addr.clone(),
            })
    }

    /// Interval between download progress snapshots.
    #[must_use]
    pub const fn status_interval(&self) -> Duration {
        Duration::from_secs(self.download.status_interval_secs)
    }
}

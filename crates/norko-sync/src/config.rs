//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     NORKO_SERVER_URL=http://192.168.1.10:5000                          │
//! │     NORKO_CSRF_TOKEN=...                                               │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/norko-pos/sync.toml (Linux)                              │
//! │     ~/Library/Application Support/com.norko.pos/sync.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     5 minute interval, 1s settle delay, 3 retries                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Register 1"
//!
//! [server]
//! base_url = "http://192.168.1.10:5000"
//! csrf_token = "..."
//! request_timeout_secs = 30
//!
//! [sync]
//! interval_secs = 300
//! settle_delay_ms = 1000
//! max_retries = 3
//! collections = ["products", "categories", "customers"]
//!
//! [connectivity]
//! probe_interval_secs = 15
//! probe_path = "/"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use norko_core::{
    ReferenceCollection, DEFAULT_MAX_RETRIES, DEFAULT_SETTLE_DELAY_MS, DEFAULT_SYNC_INTERVAL_SECS,
};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for this register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Register 1").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "POS Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// Where the store server lives and how to authenticate against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL of the store server, e.g. `http://192.168.1.10:5000`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sent as `X-CSRFToken` on every mutation.
    #[serde(default)]
    pub csrf_token: Option<String>,

    /// Raw session cookie (`session=...`) for servers behind a login.
    #[serde(default)]
    pub session_cookie: Option<String>,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            base_url: default_base_url(),
            csrf_token: None,
            session_cookie: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Sync pass behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Periodic sync interval (seconds).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Pause after connectivity returns before syncing (milliseconds).
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Failed submissions before an operation is dropped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Reference collections refreshed on every pass.
    #[serde(default = "default_collections")]
    pub collections: Vec<ReferenceCollection>,
}

fn default_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}
fn default_settle_delay() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_collections() -> Vec<ReferenceCollection> {
    ReferenceCollection::ALL.to_vec()
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            interval_secs: default_interval(),
            settle_delay_ms: default_settle_delay(),
            max_retries: default_max_retries(),
            collections: default_collections(),
        }
    }
}

// =============================================================================
// Connectivity Settings
// =============================================================================

/// How reachability of the server is probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    /// Probe interval while online (seconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Path requested by the probe.
    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    /// First re-probe delay after going offline (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Cap on the re-probe delay while offline (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_probe_interval() -> u64 {
    15
}
fn default_probe_path() -> String {
    "/".to_string()
}
fn default_initial_backoff() -> u64 {
    1_000
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            probe_interval_secs: default_probe_interval(),
            probe_path: default_probe_path(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Where the local store lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite file. Defaults to `norko.db` under the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub connectivity: ConnectivitySettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated device ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (sync.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());

        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::MissingDeviceId);
        }

        let url = url::Url::parse(&self.server.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "Server URL must start with http:// or https://, got: {}",
                self.server.base_url
            )));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.sync.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_secs must be greater than 0".into(),
            ));
        }

        if self.sync.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "max_retries must be at least 1".into(),
            ));
        }

        if self.sync.collections.is_empty() {
            return Err(SyncError::InvalidConfig(
                "at least one reference collection must be configured".into(),
            ));
        }

        if self.connectivity.probe_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "probe_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `NORKO_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup("NORKO_DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }

        if let Some(name) = lookup("NORKO_DEVICE_NAME") {
            self.device.name = name;
        }

        if let Some(url) = lookup("NORKO_SERVER_URL") {
            debug!(url = %url, "Overriding server URL from environment");
            self.server.base_url = url;
        }

        if let Some(token) = lookup("NORKO_CSRF_TOKEN") {
            self.server.csrf_token = Some(token);
        }

        if let Some(cookie) = lookup("NORKO_SESSION_COOKIE") {
            self.server.session_cookie = Some(cookie);
        }

        if let Some(secs) = lookup("NORKO_SYNC_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.sync.interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid NORKO_SYNC_INTERVAL_SECS"),
            }
        }

        if let Some(retries) = lookup("NORKO_MAX_RETRIES") {
            match retries.parse::<u32>() {
                Ok(r) => self.sync.max_retries = r,
                Err(_) => warn!(value = %retries, "Ignoring invalid NORKO_MAX_RETRIES"),
            }
        }

        if let Some(path) = lookup("NORKO_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "norko", "pos")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Resolved local store path.
    pub fn database_path(&self) -> SyncResult<PathBuf> {
        if let Some(ref path) = self.storage.database_path {
            return Ok(path.clone());
        }

        Self::project_dirs()
            .map(|dirs| dirs.data_dir().join("norko.db"))
            .ok_or_else(|| SyncError::InvalidConfig("No data directory available".into()))
    }

    pub fn device_id(&self) -> &str {
        &self.device.id
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.sync.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity.probe_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.device.id.is_empty());
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.settle_delay(), Duration::from_millis(1000));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.collections.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.device.id = String::new();
        assert!(matches!(config.validate(), Err(SyncError::MissingDeviceId)));
        config.device.id = "till-1".to_string();

        config.server.base_url = "ws://localhost:8080".to_string();
        assert!(config.validate().unwrap_err().is_config_error());

        config.server.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.server.base_url = "https://pos.example.com".to_string();
        assert!(config.validate().is_ok());

        config.sync.max_retries = 0;
        assert!(config.validate().is_err());
        config.sync.max_retries = 3;

        config.sync.collections.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [server]
            base_url = "http://10.0.0.2:5000"

            [sync]
            collections = ["products"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.base_url, "http://10.0.0.2:5000");
        assert_eq!(config.sync.collections, vec![ReferenceCollection::Products]);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.connectivity.probe_path, "/");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("NORKO_SERVER_URL", "http://server:5000"),
            ("NORKO_CSRF_TOKEN", "abc"),
            ("NORKO_MAX_RETRIES", "5"),
            ("NORKO_SYNC_INTERVAL_SECS", "soon"),
            ("NORKO_DB_PATH", "/var/lib/norko/pos.db"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.base_url, "http://server:5000");
        assert_eq!(config.server.csrf_token.as_deref(), Some("abc"));
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/var/lib/norko/pos.db")
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");

        let mut config = SyncConfig::default();
        config.device.name = "Register 2".to_string();
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.device.id, config.device.id);
        assert_eq!(loaded.device.name, "Register 2");
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::services::polling::PollingConfig;

/// Environment variable that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CAMPUS_REALTIME_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub events: EventsConfig,

    pub relay: RelayConfig,

    pub broadcaster: BroadcasterConfig,

    pub polling: PollingConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// "pretty" or "json"
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,

    pub port: u16,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Records kept per `channel:event` log before the oldest are evicted.
    pub log_capacity: usize,

    /// How often each SSE connection checks its log for new records.
    pub poll_interval_ms: u64,

    /// SSE comment heartbeat interval. 0 disables heartbeats.
    pub keep_alive_seconds: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            log_capacity: crate::constants::events::LOG_CAPACITY,
            poll_interval_ms: 100,
            keep_alive_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,

    pub ws_port: u16,

    pub ws_path: String,

    /// Port of the internal `POST /broadcast` ingress.
    pub ingress_port: u16,

    pub welcome_delay_ms: u64,

    pub max_payload_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            ws_port: 3001,
            ws_path: "/api/ws".to_string(),
            ingress_port: 3003,
            welcome_delay_ms: 100,
            max_payload_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcasterConfig {
    pub enabled: bool,

    pub relay_url: String,

    pub timeout_seconds: u64,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            relay_url: "http://localhost:3003/broadcast".to_string(),
            timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(explicit));
        }

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("campus-realtime").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".campus-realtime").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.events.log_capacity == 0 {
            anyhow::bail!("events.log_capacity must be > 0");
        }

        if self.events.poll_interval_ms == 0 {
            anyhow::bail!("events.poll_interval_ms must be > 0");
        }

        if !self.relay.ws_path.starts_with('/') {
            anyhow::bail!("relay.ws_path must start with '/'");
        }

        if self.broadcaster.enabled {
            url::Url::parse(&self.broadcaster.relay_url).with_context(|| {
                format!(
                    "Invalid broadcaster.relay_url: {}",
                    self.broadcaster.relay_url
                )
            })?;
        }

        Ok(())
    }

    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.events.log_capacity, 100);
        assert_eq!(config.events.poll_interval_ms, 100);
        assert_eq!(config.relay.ws_port, 3001);
        assert_eq!(config.relay.ingress_port, 3003);
        assert_eq!(config.relay.ws_path, "/api/ws");
        assert_eq!(
            config.broadcaster.relay_url,
            "http://localhost:3003/broadcast"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[events]"));
        assert!(toml_str.contains("[relay]"));
        assert!(toml_str.contains("[broadcaster]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [events]
            poll_interval_ms = 250
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.events.poll_interval_ms, 250);

        assert_eq!(config.events.log_capacity, 100);
        assert_eq!(config.relay.ws_port, 3001);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.events.log_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.relay.ws_path = "api/ws".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.broadcaster.relay_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.broadcaster.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load_roundtrip_through_file() {
        let path = std::env::temp_dir().join(format!(
            "campus-realtime-config-{}.toml",
            uuid::Uuid::new_v4()
        ));

        let mut config = Config::default();
        config.server.port = 4555;
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.server.port, 4555);

        std::fs::remove_file(&path).ok();
    }
}

//! Workflow configuration.
//!
//! Stored as JSON (`attendance.json` in the app config directory for the
//! desktop build). Every field has a default so partial files are fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Well-known biometric terminal service port.
pub const DEFAULT_DEVICE_PORT: u16 = 4370;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub client: ClientConfig,
    /// Port preferred by the fetch port policy, and the fallback when a
    /// device reports no open ports.
    #[serde(default = "default_port")]
    pub default_port: u16,
    #[serde(default = "default_sync_delay")]
    pub sync_delay_ms: u64,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// LAN discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanConfig {
    /// CIDR to scan, e.g. `192.168.1.0/24`. Derived from the local address when unset.
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default = "default_probe_ports")]
    pub probe_ports: Vec<u16>,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Smallest accepted prefix length; wider networks are refused.
    #[serde(default = "default_min_prefix")]
    pub min_prefix: u8,
}

/// Timeouts applied by the device capability client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    #[serde(default)]
    pub discovery_timeout_ms: Option<u64>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,
}

/// Which capability backend serves discovery and retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BackendConfig {
    #[default]
    Lan,
    Fixture { path: PathBuf },
}

fn default_port() -> u16 {
    DEFAULT_DEVICE_PORT
}

fn default_sync_delay() -> u64 {
    1000
}

fn default_probe_ports() -> Vec<u16> {
    vec![80, 89, 8080, 23, 4370, 4360]
}

fn default_probe_timeout() -> u64 {
    500
}

fn default_concurrency() -> usize {
    64
}

fn default_min_prefix() -> u8 {
    16
}

fn default_fetch_timeout() -> u64 {
    30000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            client: ClientConfig::default(),
            default_port: default_port(),
            sync_delay_ms: default_sync_delay(),
            backend: BackendConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            subnet: None,
            probe_ports: default_probe_ports(),
            probe_timeout_ms: default_probe_timeout(),
            concurrency: default_concurrency(),
            min_prefix: default_min_prefix(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_ms: None,
            fetch_timeout_ms: default_fetch_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.discovery_timeout_ms.map(Duration::from_millis)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Config {
    pub fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync_delay_ms)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from disk; a missing file yields the defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                log::info!("[config] Loaded {}", path.display());
                Self::from_json(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("[config] {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.default_port == 0 {
            return Err(Error::Config("defaultPort cannot be 0".to_string()));
        }
        if self.scan.probe_ports.iter().any(|&p| p == 0) {
            return Err(Error::Config("probePorts cannot contain 0".to_string()));
        }
        if self.scan.concurrency == 0 {
            return Err(Error::Config("scan concurrency must be at least 1".to_string()));
        }
        if self.scan.min_prefix > 32 {
            return Err(Error::Config(format!(
                "minPrefix {} is not a valid IPv4 prefix",
                self.scan.min_prefix
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.default_port, 4370);
        assert_eq!(config.sync_delay_ms, 1000);
        assert_eq!(config.scan.probe_ports, vec![80, 89, 8080, 23, 4370, 4360]);
        assert_eq!(config.client.fetch_timeout(), Duration::from_secs(30));
        assert!(config.client.discovery_timeout().is_none());
        assert_eq!(config.backend, BackendConfig::Lan);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = Config::from_json(
            r#"{
                "scan": { "subnet": "10.0.0.0/24", "probeTimeoutMs": 250 },
                "backend": { "kind": "fixture", "path": "/tmp/devices.json" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.scan.subnet.as_deref(), Some("10.0.0.0/24"));
        assert_eq!(config.scan.probe_timeout_ms, 250);
        assert_eq!(config.scan.concurrency, 64);
        assert_eq!(
            config.backend,
            BackendConfig::Fixture {
                path: PathBuf::from("/tmp/devices.json")
            }
        );
    }

    #[test]
    fn rejects_zero_port() {
        let err = Config::from_json(r#"{ "defaultPort": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("attendance.json"))
            .await
            .unwrap();
        assert_eq!(config.default_port, DEFAULT_DEVICE_PORT);
    }

    #[tokio::test]
    async fn loads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendance.json");
        std::fs::write(&path, r#"{ "syncDelayMs": 10 }"#).unwrap();

        let config = Config::load_or_default(&path).await.unwrap();
        assert_eq!(config.sync_delay(), Duration::from_millis(10));
    }
}

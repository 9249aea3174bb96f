//! Capability backend selected by configuration.

use super::capability::DeviceCapability;
use super::fixture::FixtureCapability;
use super::scanner::LanCapability;
use super::types::{AttendanceRecord, Device};
use crate::config::{BackendConfig, Config};

/// Backend negotiated from the config file
pub enum Backend {
    Lan(LanCapability),
    Fixture(FixtureCapability),
}

impl Backend {
    pub fn from_config(config: &Config) -> Self {
        match &config.backend {
            BackendConfig::Lan => {
                log::info!("[attendance] Using LAN discovery backend");
                Backend::Lan(LanCapability::new(config.scan.clone()))
            }
            BackendConfig::Fixture { path } => {
                log::info!("[attendance] Using fixture backend {}", path.display());
                Backend::Fixture(FixtureCapability::new(path.clone()))
            }
        }
    }
}

impl DeviceCapability for Backend {
    async fn discover_devices(&self) -> Result<Vec<Device>, String> {
        match self {
            Backend::Lan(lan) => lan.discover_devices().await,
            Backend::Fixture(fixture) => fixture.discover_devices().await,
        }
    }

    async fn fetch_attendance(&self, ip: &str, port: u16) -> Result<Vec<AttendanceRecord>, String> {
        match self {
            Backend::Lan(lan) => lan.fetch_attendance(ip, port).await,
            Backend::Fixture(fixture) => fixture.fetch_attendance(ip, port).await,
        }
    }
}

//! JSON fixture backend
//!
//! Serves discovery and retrieval from a file so the workflow can be driven
//! without terminals on the network. The file is re-read on every call.
//!
//! ```json
//! {
//!   "devices": [{ "ip": "192.168.1.20", "mac": "00:17:61:12:34:56", "openPorts": [80, 4370] }],
//!   "attendance": {
//!     "192.168.1.20": [
//!       { "userId": 1, "userName": "Alice", "timestamp": "2024-01-01T09:00:00+03:00", "status": 0, "punch": 1 }
//!     ]
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::DateTime;
use serde::Deserialize;

use super::capability::DeviceCapability;
use super::types::{AttendanceRecord, Device};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureFile {
    #[serde(default)]
    devices: Vec<Device>,
    #[serde(default)]
    attendance: HashMap<String, Vec<FixturePunch>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixturePunch {
    user_id: u32,
    #[serde(default)]
    user_name: Option<String>,
    timestamp: String,
    #[serde(default)]
    status: u8,
    #[serde(default)]
    punch: u8,
}

/// Capability backed by a JSON fixture file.
pub struct FixtureCapability {
    path: PathBuf,
}

impl FixtureCapability {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<FixtureFile, String> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| format!("Failed to read fixture {}: {}", self.path.display(), e))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("Invalid fixture {}: {}", self.path.display(), e))
    }
}

impl DeviceCapability for FixtureCapability {
    async fn discover_devices(&self) -> Result<Vec<Device>, String> {
        let fixture = self.load().await?;
        log::debug!(
            "[attendance::fixture] {} devices from {}",
            fixture.devices.len(),
            self.path.display()
        );
        Ok(fixture.devices)
    }

    async fn fetch_attendance(&self, ip: &str, port: u16) -> Result<Vec<AttendanceRecord>, String> {
        let mut fixture = self.load().await?;

        let known = fixture
            .devices
            .iter()
            .any(|d| d.ip == ip && (d.open_ports.is_empty() || d.open_ports.contains(&port)));
        if !known {
            return Err(format!("Connection refused by {}:{}", ip, port));
        }

        fixture
            .attendance
            .remove(ip)
            .unwrap_or_default()
            .into_iter()
            .map(|p| {
                let at = DateTime::parse_from_rfc3339(&p.timestamp)
                    .map_err(|e| format!("Invalid punch timestamp {}: {}", p.timestamp, e))?;
                let user_name = p
                    .user_name
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("User {}", p.user_id));
                Ok(AttendanceRecord::from_punch(p.user_id, user_name, at, p.status, p.punch))
            })
            .collect()
    }
}

//! Attendance workflow data types (serialized to the frontend)

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A terminal found on the local network.
///
/// `mac` is informational only: it is not unique across re-scans and is never
/// used as identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub ip: String,
    pub mac: String,
    #[serde(default)]
    pub open_ports: Vec<u16>,
}

/// A single punch-clock record pulled from a terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub user_id: u32,
    pub user_name: String,
    pub timestamp: String,
    pub status: u8,
    pub punch: u8,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM:SS
    pub time: String,
    pub event: String,
}

impl AttendanceRecord {
    /// Build a record from a raw punch, deriving date, time and event label.
    pub fn from_punch(
        user_id: u32,
        user_name: impl Into<String>,
        at: DateTime<FixedOffset>,
        status: u8,
        punch: u8,
    ) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            timestamp: at.to_rfc3339(),
            status,
            punch,
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            event: event_label(status).to_string(),
        }
    }
}

/// Map a device status code to its event name.
pub fn event_label(status: u8) -> &'static str {
    match status {
        0 => "Check In",
        1 => "Check Out",
        2 => "Break Out",
        3 => "Break In",
        4 => "OT In",
        5 => "OT Out",
        _ => "Unknown",
    }
}

/// Per-scan device identifier: `<ip>-<index in the last scan result>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn derive(device: &Device, index: usize) -> Self {
        Self(format!("{}-{}", device.ip, index))
    }

    /// Split an identifier into its address and list index.
    pub fn parse(raw: &str) -> Result<(&str, usize)> {
        let (ip, index) = raw
            .rsplit_once('-')
            .ok_or_else(|| Error::Validation(format!("Malformed device id: {}", raw)))?;
        if ip.is_empty() {
            return Err(Error::Validation(format!("Malformed device id: {}", raw)));
        }
        let index = index
            .parse::<usize>()
            .map_err(|_| Error::Validation(format!("Malformed device id: {}", raw)))?;
        Ok((ip, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Device paired with its identifier in the current scan result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEntry {
    pub id: DeviceId,
    #[serde(flatten)]
    pub device: Device,
}

//! Device capability boundary
//!
//! `DeviceCapability` is the contract required from whatever actually talks to
//! the network and the terminals. `DeviceClient` wraps one, applies timeouts and
//! normalizes raw transport failures into the workflow error taxonomy.

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use tokio::time::timeout;

use super::types::{AttendanceRecord, Device};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// External discovery and retrieval capability.
///
/// Both calls must be safe to repeat and free of side effects on the
/// terminals. Failures are raw transport messages; the client classifies them.
pub trait DeviceCapability: Send + Sync + 'static {
    /// List the terminals currently reachable, in a stable order.
    fn discover_devices(&self) -> impl Future<Output = std::result::Result<Vec<Device>, String>> + Send;

    /// Read every attendance record held by the terminal at `ip:port`.
    fn fetch_attendance(
        &self,
        ip: &str,
        port: u16,
    ) -> impl Future<Output = std::result::Result<Vec<AttendanceRecord>, String>> + Send;
}

/// Boundary adapter between the workflow and a `DeviceCapability`.
pub struct DeviceClient<C> {
    capability: C,
    discovery_timeout: Option<Duration>,
    fetch_timeout: Duration,
}

impl<C: DeviceCapability> DeviceClient<C> {
    pub fn new(capability: C, config: &ClientConfig) -> Self {
        Self {
            capability,
            discovery_timeout: config.discovery_timeout(),
            fetch_timeout: config.fetch_timeout(),
        }
    }

    #[cfg(test)]
    pub(crate) fn capability(&self) -> &C {
        &self.capability
    }

    /// Discover devices on the network.
    pub async fn discover(&self) -> Result<Vec<Device>> {
        let call = self.capability.discover_devices();
        let result = match self.discovery_timeout {
            Some(limit) => timeout(limit, call)
                .await
                .map_err(|_| {
                    log::warn!("[attendance::client] discovery timed out after {:?}", limit);
                    Error::Discovery(format!(
                        "Network scan timed out after {}ms",
                        limit.as_millis()
                    ))
                })?,
            None => call.await,
        };

        result.map_err(|e| {
            log::warn!("[attendance::client] discovery failed: {}", e);
            Error::Discovery(format_error(&e))
        })
    }

    /// Fetch attendance records from `ip:port`.
    pub async fn fetch(&self, ip: &str, port: u16) -> Result<Vec<AttendanceRecord>> {
        validate_address(ip, port)?;

        let records = timeout(self.fetch_timeout, self.capability.fetch_attendance(ip, port))
            .await
            .map_err(|_| {
                log::warn!("[attendance::client] fetch from {}:{} timed out", ip, port);
                Error::Fetch(format_error("timeout"))
            })?
            .map_err(|e| {
                log::warn!("[attendance::client] fetch from {}:{} failed: {}", ip, port, e);
                Error::Fetch(format_error(&e))
            })?;

        log::info!(
            "[attendance::client] Retrieved {} attendance records from {}:{}",
            records.len(),
            ip,
            port
        );
        Ok(records)
    }
}

/// Validate an IPv4/IPv6 literal and a non-zero port.
pub fn validate_address(ip: &str, port: u16) -> Result<()> {
    ip.parse::<IpAddr>()
        .map_err(|_| Error::Validation(format!("Invalid IP address: {}", ip)))?;
    if port == 0 {
        return Err(Error::Validation("Port cannot be 0".to_string()));
    }
    Ok(())
}

/// Format transport errors for operator display
fn format_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("etimedout") {
        return "Connection timeout - device may be unreachable or IP/port incorrect".to_string();
    }
    if lower.contains("econnrefused") || lower.contains("connection refused") {
        return "Connection refused - check if device is powered on and network accessible"
            .to_string();
    }
    if lower.contains("ehostunreach") || lower.contains("host unreachable") {
        return "Host unreachable - check network configuration".to_string();
    }
    if lower.contains("permission denied") || lower.contains("eacces") {
        return "Permission denied - network access was blocked by the system".to_string();
    }
    if error.trim().is_empty() {
        return "Unknown error occurred".to_string();
    }

    error.to_string()
}

//! LAN discovery backend
//!
//! Probes every host of the local (or configured) IPv4 subnet on the common
//! time-attendance ports and keeps the hosts that look like biometric
//! terminals. Uses plain TCP connects, so no raw-socket privileges are needed.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use ipnetwork::Ipv4Network;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

use super::capability::DeviceCapability;
use super::types::{AttendanceRecord, Device};
use crate::config::ScanConfig;

/// Known MAC prefixes for biometric vendors
const BIOMETRIC_MAC_PREFIXES: &[&str] = &[
    "00:17:61", // ZKTeco / ESSL / Realtime
    "AC:83:F3", // ZKTeco newer models
    "F8:1D:78", // Anviz / eSSL series
    "3C:8C:F8", // Matrix
    "64:09:80", // Realand / BioTime OEMs
];

/// Ports only terminals listen on
const BIOMETRIC_PORTS: &[u16] = &[4370, 4360];

const UNKNOWN_MAC: &str = "Unknown";

/// Subnet scanner for biometric terminals.
pub struct LanScanner {
    config: ScanConfig,
}

impl LanScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Scan the subnet; results are in ascending host order.
    pub async fn scan(&self) -> Result<Vec<Device>, String> {
        let network = self.target_network().await?;
        let hosts = host_addresses(network, self.config.min_prefix)?;
        log::info!(
            "[attendance::scanner] Scanning {} ({} hosts, ports {:?})",
            network,
            hosts.len(),
            self.config.probe_ports
        );

        let alive = self.probe_hosts(hosts).await;
        log::info!("[attendance::scanner] {} hosts answered", alive.len());

        // The probes populate the kernel's ARP cache, so read it afterwards
        let arp = read_arp_table().await;
        let devices = classify_hosts(alive, &arp);

        log::info!("[attendance::scanner] Found {} terminal(s)", devices.len());
        Ok(devices)
    }

    async fn target_network(&self) -> Result<Ipv4Network, String> {
        match &self.config.subnet {
            Some(cidr) => cidr
                .parse::<Ipv4Network>()
                .map_err(|e| format!("Invalid subnet {}: {}", cidr, e)),
            None => {
                let local = local_ipv4().await?;
                Ipv4Network::new(local, 24).map_err(|e| format!("Invalid local network: {}", e))
            }
        }
    }

    /// Probe hosts concurrently, keeping those with at least one open port.
    async fn probe_hosts(&self, hosts: Vec<Ipv4Addr>) -> Vec<(Ipv4Addr, Vec<u16>)> {
        let limit = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let ports: Arc<[u16]> = self.config.probe_ports.clone().into();
        let connect_timeout = Duration::from_millis(self.config.probe_timeout_ms);

        let mut tasks = JoinSet::new();
        for (index, host) in hosts.into_iter().enumerate() {
            let limit = limit.clone();
            let ports = ports.clone();
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await.ok()?;
                let open = open_ports(IpAddr::V4(host), &ports, connect_timeout).await;
                Some((index, host, open))
            });
        }

        let mut alive = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((index, host, open))) if !open.is_empty() => alive.push((index, host, open)),
                Ok(_) => {}
                Err(e) => log::warn!("[attendance::scanner] probe task failed: {}", e),
            }
        }

        alive.sort_by_key(|(index, _, _)| *index);
        alive
            .into_iter()
            .map(|(_, host, open)| (host, open))
            .collect()
    }
}

/// LAN-backed capability.
///
/// Discovery is served by `LanScanner`. Attendance retrieval needs a terminal
/// protocol backend, which this build does not bundle.
pub struct LanCapability {
    scanner: LanScanner,
}

impl LanCapability {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            scanner: LanScanner::new(config),
        }
    }
}

impl DeviceCapability for LanCapability {
    async fn discover_devices(&self) -> Result<Vec<Device>, String> {
        self.scanner.scan().await
    }

    async fn fetch_attendance(&self, ip: &str, port: u16) -> Result<Vec<AttendanceRecord>, String> {
        Err(format!(
            "No terminal protocol backend is available to read {}:{}",
            ip, port
        ))
    }
}

/// Determine the local IPv4 address used for outbound traffic.
async fn local_ipv4() -> Result<Ipv4Addr, String> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| format!("Failed to bind socket: {}", e))?;

    // No packet is sent; connect only selects the route
    socket
        .connect("8.8.8.8:80")
        .await
        .map_err(|e| format!("Failed to determine local address: {}", e))?;

    let local_addr = socket
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    match local_addr.ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(_) => Err("IPv6 not supported".to_string()),
    }
}

/// Hosts of `network` worth probing (network and broadcast addresses excluded).
fn host_addresses(network: Ipv4Network, min_prefix: u8) -> Result<Vec<Ipv4Addr>, String> {
    if network.prefix() < min_prefix {
        return Err(format!(
            "Subnet {} is too large to scan (minimum prefix /{})",
            network, min_prefix
        ));
    }

    let base = network.network();
    let broadcast = network.broadcast();
    let point_to_point = network.prefix() >= 31;

    Ok(network
        .iter()
        .filter(|ip| point_to_point || (*ip != base && *ip != broadcast))
        .collect())
}

/// Ports of `ip` accepting a TCP connection within `limit`, in probe order.
pub async fn open_ports(ip: IpAddr, ports: &[u16], limit: Duration) -> Vec<u16> {
    let mut open = Vec::new();
    for &port in ports {
        if check_port(ip, port, limit).await {
            open.push(port);
        }
    }
    open
}

async fn check_port(ip: IpAddr, port: u16, limit: Duration) -> bool {
    matches!(timeout(limit, TcpStream::connect((ip, port))).await, Ok(Ok(_)))
}

/// Keep the answering hosts that look like terminals, attaching their MACs.
fn classify_hosts(
    alive: Vec<(Ipv4Addr, Vec<u16>)>,
    arp: &HashMap<Ipv4Addr, String>,
) -> Vec<Device> {
    alive
        .into_iter()
        .filter_map(|(host, open_ports)| {
            let mac = arp
                .get(&host)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_MAC.to_string());
            if is_biometric_device(&mac, &open_ports) {
                log::info!(
                    "[attendance::scanner] Terminal at {} ({}) ports {:?}",
                    host,
                    mac,
                    open_ports
                );
                Some(Device {
                    ip: host.to_string(),
                    mac,
                    open_ports,
                })
            } else {
                log::debug!(
                    "[attendance::scanner] {} is not a terminal (ports {:?})",
                    host,
                    open_ports
                );
                None
            }
        })
        .collect()
}

fn is_biometric_device(mac: &str, ports: &[u16]) -> bool {
    let mac_upper = mac.to_uppercase();
    if mac_upper.len() >= 8
        && BIOMETRIC_MAC_PREFIXES
            .iter()
            .any(|prefix| mac_upper.starts_with(prefix))
    {
        return true;
    }

    ports.iter().any(|port| BIOMETRIC_PORTS.contains(port))
}

#[cfg(target_os = "linux")]
async fn read_arp_table() -> HashMap<Ipv4Addr, String> {
    match tokio::fs::read_to_string("/proc/net/arp").await {
        Ok(text) => parse_arp_table(&text),
        Err(e) => {
            log::debug!("[attendance::scanner] ARP table unavailable: {}", e);
            HashMap::new()
        }
    }
}

#[cfg(not(target_os = "linux"))]
async fn read_arp_table() -> HashMap<Ipv4Addr, String> {
    HashMap::new()
}

/// Parse `/proc/net/arp` into an address -> MAC map.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_arp_table(text: &str) -> HashMap<Ipv4Addr, String> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let ip = fields[0].parse::<Ipv4Addr>().ok()?;
            let mac = fields[3];
            if mac == "00:00:00:00:00:00" {
                return None;
            }
            Some((ip, mac.to_uppercase()))
        })
        .collect()
}

//! Discovered devices and the current selection. Pure state, no I/O.

use super::types::{Device, DeviceEntry, DeviceId};
use crate::error::Result;

/// The selected device, captured at selection time.
///
/// A later scan replaces the device list but not this snapshot, so the
/// selection keeps naming the device attendance was fetched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub id: DeviceId,
    pub device: Device,
}

#[derive(Debug, Default)]
pub struct DeviceInventory {
    devices: Vec<Device>,
    selection: Option<Selection>,
}

impl DeviceInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Devices with their identifiers, in scan order.
    pub fn entries(&self) -> Vec<DeviceEntry> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, device)| DeviceEntry {
                id: DeviceId::derive(device, index),
                device: device.clone(),
            })
            .collect()
    }

    /// Replace the list wholesale with a scan result, keeping its order.
    pub fn replace(&mut self, devices: Vec<Device>) {
        self.devices = devices;
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn selected_device(&self) -> Option<&Device> {
        self.selection.as_ref().map(|s| &s.device)
    }

    /// Select by identifier.
    ///
    /// An identifier that no longer resolves (e.g. from a previous scan)
    /// leaves nothing selected and is not an error. A malformed identifier
    /// also clears the selection and returns `Validation`.
    pub fn select(&mut self, raw: &str) -> Result<Option<&Device>> {
        self.selection = None;

        // the index is the digits after the last separator, so ids never collide
        let (ip, index) = DeviceId::parse(raw)?;
        let Some(device) = self.devices.get(index).filter(|d| d.ip == ip) else {
            log::debug!("[attendance::inventory] {} not in current scan", raw);
            return Ok(None);
        };

        self.selection = Some(Selection {
            id: DeviceId::derive(device, index),
            device: device.clone(),
        });
        Ok(self.selected_device())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }
}

//! Device synchronization placeholder.
//!
//! Holds a busy flag for the configured delay and then reports that sync is
//! not available. It touches neither the inventory nor the fetched records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::types::Device;
use crate::error::{Error, Result};

pub struct SyncStub {
    delay: Duration,
    busy: AtomicBool,
}

/// Clears the busy flag when the sync future finishes or is dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncStub {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run the placeholder sync for `device`.
    ///
    /// Always ends in `NotImplemented`; a call made while another is running
    /// is ignored and returns `Ok`.
    pub async fn sync(&self, device: Option<&Device>) -> Result<()> {
        let device = device.ok_or(Error::NoDeviceSelected)?;

        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("[attendance::sync] already running, ignoring request");
            return Ok(());
        }
        let _busy = BusyGuard(&self.busy);

        log::info!("[attendance::sync] Syncing device {}", device.ip);
        tokio::time::sleep(self.delay).await;

        Err(Error::NotImplemented)
    }
}

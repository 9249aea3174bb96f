//! Scan lifecycle with soft cancellation.
//!
//! Cancelling never aborts the discovery call. It marks the scan's token so
//! that whatever the call eventually returns is dropped. Each `start` issues a
//! fresh token, so a cancelled scan still in flight never blocks a new one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

/// Visible scan state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanPhase {
    Idle,
    Scanning,
    /// Idle; the last scan was cancelled by the operator.
    Cancelled,
}

impl ScanPhase {
    pub fn is_scanning(self) -> bool {
        self == ScanPhase::Scanning
    }
}

/// Token carried by one discovery call.
#[derive(Debug, Clone)]
pub struct ScanToken {
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl ScanToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct ScanState {
    phase: ScanPhase,
    generation: u64,
    active: Option<ScanToken>,
}

/// Owns the `Idle -> Scanning -> Idle` state machine.
pub struct ScanController {
    state: Mutex<ScanState>,
}

impl Default for ScanController {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScanState {
                phase: ScanPhase::Idle,
                generation: 0,
                active: None,
            }),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.state.lock().phase
    }

    pub fn is_scanning(&self) -> bool {
        self.phase().is_scanning()
    }

    /// Begin a scan. Returns `None` (no-op) while one is already visible as running.
    pub fn start(&self) -> Option<ScanToken> {
        let mut state = self.state.lock();
        if state.phase.is_scanning() {
            return None;
        }

        state.generation += 1;
        let token = ScanToken {
            generation: state.generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        state.active = Some(token.clone());
        state.phase = ScanPhase::Scanning;
        Some(token)
    }

    /// Cancel the running scan. Returns its generation, or `None` when idle.
    pub fn cancel(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if !state.phase.is_scanning() {
            return None;
        }

        let token = state.active.take()?;
        token.cancelled.store(true, Ordering::SeqCst);
        state.phase = ScanPhase::Cancelled;
        Some(token.generation)
    }

    /// Finish the scan that issued `token`.
    ///
    /// `apply` runs under the controller lock, and only when `token` is still
    /// the current, uncancelled one. Returns whether it ran.
    pub fn complete<F: FnOnce()>(&self, token: &ScanToken, apply: F) -> bool {
        let mut state = self.state.lock();
        if token.generation != state.generation || token.is_cancelled() {
            return false;
        }

        state.phase = ScanPhase::Idle;
        state.active = None;
        apply();
        true
    }
}

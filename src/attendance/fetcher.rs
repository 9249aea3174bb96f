//! Attendance fetch lifecycle for the selected device.
//!
//! Every fetch carries a ticket stamped with a generation. Superseding the
//! fetcher (the selection changed) bumps the generation, so a call that
//! resolves afterwards is dropped instead of overwriting the newer view.

use parking_lot::Mutex;
use serde::Serialize;

use super::types::{AttendanceRecord, Device};

/// Choose the port to read attendance from.
///
/// Prefers `preferred` when the device reports it open, otherwise the first
/// open port. With no open ports at all, `preferred` is assumed anyway.
pub fn select_port(open_ports: &[u16], preferred: u16) -> u16 {
    if open_ports.contains(&preferred) {
        return preferred;
    }
    open_ports.first().copied().unwrap_or(preferred)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchPhase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Handle for one in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    pub ip: String,
    pub port: u16,
}

/// What happened to a completed fetch. A failure hands its error back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCompletion<E> {
    Loaded { count: usize },
    Failed(E),
    Superseded,
}

struct FetchState {
    phase: FetchPhase,
    generation: u64,
    records: Vec<AttendanceRecord>,
}

/// Owns the `Idle -> Loading -> Idle` state machine and the displayed records.
pub struct AttendanceFetcher {
    preferred_port: u16,
    state: Mutex<FetchState>,
}

impl AttendanceFetcher {
    pub fn new(preferred_port: u16) -> Self {
        Self {
            preferred_port,
            state: Mutex::new(FetchState {
                phase: FetchPhase::Idle,
                generation: 0,
                records: Vec::new(),
            }),
        }
    }

    pub fn phase(&self) -> FetchPhase {
        self.state.lock().phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase() == FetchPhase::Loading
    }

    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.state.lock().records.clone()
    }

    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Start a fetch for `device`, superseding any fetch still in flight.
    pub fn begin(&self, device: &Device) -> FetchTicket {
        let port = select_port(&device.open_ports, self.preferred_port);
        let mut state = self.state.lock();
        state.generation += 1;
        state.phase = FetchPhase::Loading;
        FetchTicket {
            generation: state.generation,
            ip: device.ip.clone(),
            port,
        }
    }

    /// Apply the outcome of the fetch behind `ticket`.
    ///
    /// Success replaces the record set in full; failure empties it.
    pub fn complete<E>(
        &self,
        ticket: &FetchTicket,
        result: Result<Vec<AttendanceRecord>, E>,
    ) -> FetchCompletion<E> {
        let mut state = self.state.lock();
        if ticket.generation != state.generation {
            return FetchCompletion::Superseded;
        }

        match result {
            Ok(records) => {
                let count = records.len();
                state.records = records;
                state.phase = FetchPhase::Loaded;
                FetchCompletion::Loaded { count }
            }
            Err(e) => {
                state.records.clear();
                state.phase = FetchPhase::Failed;
                FetchCompletion::Failed(e)
            }
        }
    }

    /// Drop the displayed records and orphan any in-flight fetch.
    pub fn supersede(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.records.clear();
        state.phase = FetchPhase::Idle;
    }
}

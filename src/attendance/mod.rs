//! Biometric terminal discovery and attendance retrieval.
//!
//! The workflow (`workflow`) owns scan, selection, fetch and sync state and
//! talks to the network only through a `DeviceCapability`. Two backends are
//! provided: a LAN scanner and a JSON fixture.

pub mod backend;
pub mod capability;
pub mod csv;
pub mod events;
pub mod fetcher;
pub mod fixture;
pub mod inventory;
pub mod scan;
pub mod scanner;
pub mod sync;
pub mod types;
pub mod workflow;

#[cfg(feature = "desktop")]
pub mod commands;

pub use backend::Backend;
pub use capability::{DeviceCapability, DeviceClient};
pub use events::{ErrorReport, Operation, WorkflowEvent};
pub use types::{AttendanceRecord, Device, DeviceEntry, DeviceId};
pub use workflow::{AttendanceWorkflow, FetchOutcome, ScanOutcome, WorkflowSnapshot};

//! Error types for the attendance workflow.

use thiserror::Error;

/// Result type alias for workflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the discovery and attendance workflow.
///
/// Every variant is terminal for the operation that raised it and never for
/// the process: the state machine that failed returns to idle and stays usable.
#[derive(Error, Debug)]
pub enum Error {
    /// Network discovery failed (transport, timeout, permission).
    #[error("Device scan failed: {0}")]
    Discovery(String),

    /// Attendance retrieval from a terminal failed.
    #[error("Failed to fetch attendance: {0}")]
    Fetch(String),

    /// A device operation was requested with nothing selected.
    #[error("Please select a device first")]
    NoDeviceSelected,

    /// Malformed or ambiguous identifier or address.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Placeholder for device synchronization.
    #[error("Sync functionality will be implemented soon")]
    NotImplemented,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Flatten to the single message shown to the operator.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

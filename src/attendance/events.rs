//! Workflow events and the shared error slot
//!
//! Scan and fetch are independent state machines that report failures to one
//! place: the most recent failure wins, whichever component raised it.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

/// Operation that produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Scan,
    Select,
    Fetch,
    Sync,
}

/// Workflow event published to subscribers (the desktop shell forwards them to the webview).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkflowEvent {
    ScanStarted { generation: u64 },
    ScanCancelled { generation: u64 },
    ScanCompleted { generation: u64, device_count: usize },
    ScanFailed { generation: u64, message: String },
    /// A cancelled or superseded scan finished; its result was dropped.
    ScanDiscarded { generation: u64 },
    DeviceSelected { id: Option<String> },
    FetchStarted { ip: String, port: u16 },
    FetchCompleted { ip: String, record_count: usize },
    FetchFailed { ip: String, message: String },
    /// A fetch finished after the selection changed; its result was dropped.
    FetchDiscarded { ip: String },
    SyncStarted { ip: String },
    SyncFinished { ip: String, message: String },
}

/// Broadcast bus for workflow events.
pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; having no subscribers is normal.
    pub fn publish(&self, event: WorkflowEvent) {
        if self.sender.send(event).is_err() {
            log::trace!("[attendance::events] event published without subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }
}

/// The message currently shown to the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub operation: Operation,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Last-writer-wins register for the single operator-visible message.
#[derive(Default)]
pub struct ErrorSlot {
    current: Mutex<Option<ErrorReport>>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite whatever is displayed with a new report.
    pub fn report(&self, operation: Operation, message: impl Into<String>) {
        let report = ErrorReport {
            operation,
            message: message.into(),
            at: Utc::now(),
        };
        log::debug!(
            "[attendance::events] {:?} reported: {}",
            report.operation,
            report.message
        );
        *self.current.lock() = Some(report);
    }

    pub fn clear(&self) {
        self.current.lock().take();
    }

    pub fn current(&self) -> Option<ErrorReport> {
        self.current.lock().clone()
    }

    pub fn message(&self) -> Option<String> {
        self.current.lock().as_ref().map(|r| r.message.clone())
    }
}

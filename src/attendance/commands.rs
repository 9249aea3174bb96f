//! Tauri command handlers for the attendance workflow.
//!
//! Invoked directly from the webview. Errors are flattened to their display
//! text; the same message is also held in the workflow's error slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tauri::{AppHandle, Manager, State};

use super::backend::Backend;
use super::csv::confine_export_path;
use super::types::Device;
use super::workflow::{AttendanceWorkflow, FetchOutcome, ScanOutcome, WorkflowSnapshot};

pub type Workflow = Arc<AttendanceWorkflow<Backend>>;

/// Result of a CSV export
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub file_path: String,
    pub file_size: u64,
    pub record_count: usize,
}

/// Current workflow state for rendering
#[tauri::command]
pub fn get_workflow_state(workflow: State<'_, Workflow>) -> WorkflowSnapshot {
    workflow.snapshot()
}

/// Scan the local network for terminals
#[tauri::command]
pub async fn scan_for_devices(workflow: State<'_, Workflow>) -> Result<ScanOutcome, String> {
    log::info!("[attendance::cmd] scan_for_devices");
    workflow.scan().await.map_err(|e| e.message())
}

#[tauri::command]
pub fn cancel_scan(workflow: State<'_, Workflow>) -> bool {
    log::info!("[attendance::cmd] cancel_scan");
    workflow.cancel_scan()
}

/// Select a device by `ip-index` identifier, or deselect with `null`
#[tauri::command]
pub fn select_device(
    workflow: State<'_, Workflow>,
    id: Option<String>,
) -> Result<Option<Device>, String> {
    log::info!("[attendance::cmd] select_device {:?}", id);
    workflow
        .select_device(id.as_deref())
        .map_err(|e| e.message())
}

/// Fetch attendance records from the selected device
#[tauri::command]
pub async fn fetch_attendance(workflow: State<'_, Workflow>) -> Result<FetchOutcome, String> {
    log::info!("[attendance::cmd] fetch_attendance");
    workflow.fetch_attendance().await.map_err(|e| e.message())
}

#[tauri::command]
pub async fn sync_device(workflow: State<'_, Workflow>) -> Result<(), String> {
    log::info!("[attendance::cmd] sync_device");
    workflow.sync_device().await.map_err(|e| e.message())
}

/// Write the displayed records as CSV.
///
/// `destination` is the full path chosen in the save dialog; without one the
/// file goes to the downloads directory. Returns `None` when there are no
/// records to export.
#[tauri::command]
pub async fn export_attendance_csv(
    app: AppHandle,
    workflow: State<'_, Workflow>,
    destination: Option<String>,
) -> Result<Option<ExportResult>, String> {
    let Some(export) = workflow.export_csv() else {
        log::info!("[attendance::cmd] export_attendance_csv: nothing to export");
        return Ok(None);
    };

    let target = match destination {
        Some(dest) => PathBuf::from(dest),
        None => app
            .path()
            .download_dir()
            .map_err(|e| format!("Cannot resolve download dir: {}", e))?
            .join(&export.file_name),
    };
    let target = ensure_writable(&app, &target)?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create parent directories: {}", e))?;
    }
    tokio::fs::write(&target, &export.bytes)
        .await
        .map_err(|e| format!("Failed to write file: {}", e))?;

    log::info!(
        "[attendance::cmd] exported {} record(s) to {}",
        export.record_count,
        target.display()
    );
    Ok(Some(ExportResult {
        file_path: target.to_string_lossy().to_string(),
        file_size: export.bytes.len() as u64,
        record_count: export.record_count,
    }))
}

#[tauri::command]
pub fn get_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Writes are only allowed inside app data, documents or downloads.
fn ensure_writable(app: &AppHandle, path: &Path) -> Result<PathBuf, String> {
    let app_data = app
        .path()
        .app_data_dir()
        .map_err(|e| format!("Cannot resolve app data dir: {}", e))?;
    let documents = app
        .path()
        .document_dir()
        .map_err(|e| format!("Cannot resolve document dir: {}", e))?;

    let mut roots = vec![app_data, documents];
    roots.extend(app.path().download_dir().ok());

    confine_export_path(path, &roots).map_err(|e| e.message())
}

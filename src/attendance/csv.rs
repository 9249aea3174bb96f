//! CSV export of fetched attendance records.
//!
//! Data fields are wrapped in double quotes verbatim. Quotes, commas or
//! newlines inside a name or event are not escaped.

use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use super::types::AttendanceRecord;
use crate::error::{Error, Result};

pub const CSV_HEADERS: [&str; 7] = [
    "User ID",
    "User Name",
    "Date",
    "Time",
    "Event",
    "Status",
    "Punch",
];

/// A ready-to-save CSV document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvExport {
    pub file_name: String,
    pub record_count: usize,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Render records as CSV. `None` for an empty set: there is nothing to export.
pub fn to_csv(records: &[AttendanceRecord]) -> Option<Vec<u8>> {
    if records.is_empty() {
        return None;
    }

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(CSV_HEADERS.join(","));
    for record in records {
        let row = [
            record.user_id.to_string(),
            record.user_name.clone(),
            record.date.clone(),
            record.time.clone(),
            record.event.clone(),
            record.status.to_string(),
            record.punch.to_string(),
        ];
        lines.push(
            row.iter()
                .map(|cell| format!("\"{}\"", cell))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    Some(lines.join("\n").into_bytes())
}

/// `attendance_<YYYY-MM-DD>.csv` for the day of export.
pub fn export_file_name(export_date: NaiveDate) -> String {
    format!("attendance_{}.csv", export_date.format("%Y-%m-%d"))
}

/// Build the export for `records` as of `export_date`.
pub fn export(records: &[AttendanceRecord], export_date: NaiveDate) -> Option<CsvExport> {
    let bytes = to_csv(records)?;
    Some(CsvExport {
        file_name: export_file_name(export_date),
        record_count: records.len(),
        bytes,
    })
}

/// Resolve an export destination, refusing anything that lands outside `roots`.
///
/// The target may not exist yet. Its deepest existing ancestor is
/// canonicalized so symlinks are followed before the containment check.
pub fn confine_export_path(target: &Path, roots: &[PathBuf]) -> Result<PathBuf> {
    let denied = || {
        Error::Validation(format!(
            "Write denied: {} is outside the app data, documents, or downloads directory",
            target.display()
        ))
    };

    if !target.is_absolute()
        || target.file_name().is_none()
        || target.components().any(|c| matches!(c, Component::ParentDir))
    {
        return Err(denied());
    }

    let resolved = resolve_existing_prefix(target);
    let allowed = roots.iter().any(|root| {
        let root = root.canonicalize().unwrap_or_else(|_| root.clone());
        resolved.starts_with(&root)
    });

    if allowed {
        Ok(resolved)
    } else {
        Err(denied())
    }
}

fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(base) = existing.canonicalize() {
            return missing.iter().rev().fold(base, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

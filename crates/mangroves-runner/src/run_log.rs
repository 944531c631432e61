//! CSV log of task runs, one file per dataset version.

use crate::Result;
use chrono::{DateTime, Utc};
use mangroves_store::{get_optional, ObjectStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    AlreadyExists,
    NoItems,
    Failed,
}

/// One row of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub time: DateTime<Utc>,
    pub tile_id: String,
    pub datetime: String,
    pub version: String,
    pub status: RunStatus,
    pub message: String,
    /// Written keys, space separated.
    pub paths: String,
}

/// Append `entry` to the CSV at `key`, writing a header for a new file.
///
/// Read-modify-write: concurrent writers to the same key can lose rows.
pub fn append_run_log(store: &dyn ObjectStore, key: &str, entry: &RunLogEntry) -> Result<()> {
    let existing = get_optional(store, key)?;
    let has_header = existing.as_ref().is_some_and(|b| !b.is_empty());

    let mut bytes = existing.unwrap_or_default();
    if has_header && !bytes.ends_with(b"\n") {
        bytes.push(b'\n');
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(!has_header)
        .from_writer(bytes);
    writer.serialize(entry)?;
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;

    store.put(key, &bytes, "text/csv")?;
    debug!(key, status = ?entry.status, "Appended run log entry");
    Ok(())
}

/// Parse every row of a run log.
pub fn read_run_log(store: &dyn ObjectStore, key: &str) -> Result<Vec<RunLogEntry>> {
    let Some(bytes) = get_optional(store, key)? else {
        return Ok(Vec::new());
    };
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let entries = reader.deserialize().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

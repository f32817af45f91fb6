//! CSV export of the rescheduling change log.

use crate::{ChangeLogEntry, Error, Result};
use std::path::Path;
use tempfile::NamedTempFile;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    timestamp: String,
    medication_id: &'a str,
    old_time: &'a str,
    new_time: &'a str,
}

impl<'a> From<&'a ChangeLogEntry> for CsvRow<'a> {
    fn from(entry: &'a ChangeLogEntry) -> Self {
        CsvRow {
            timestamp: entry.timestamp.to_rfc3339(),
            medication_id: &entry.medication_id,
            old_time: &entry.old_time,
            new_time: &entry.new_time,
        }
    }
}

/// Write the change log to `csv_path`, replacing any previous export
///
/// The file is written to a temp file in the same directory, synced, and
/// renamed into place. Returns the number of rows written.
pub fn export_change_log_csv(entries: &[ChangeLogEntry], csv_path: &Path) -> Result<usize> {
    let dir = match csv_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            parent.to_path_buf()
        }
        _ => std::path::PathBuf::from("."),
    };
    let temp = NamedTempFile::new_in(dir)?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(temp.as_file());
        writer.write_record(["timestamp", "medication_id", "old_time", "new_time"])?;
        for entry in entries {
            writer.serialize(CsvRow::from(entry))?;
        }
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.persist(csv_path).map_err(|e| Error::Io(e.error))?;

    tracing::info!("Exported {} change log entries to {:?}", entries.len(), csv_path);
    Ok(entries.len())
}

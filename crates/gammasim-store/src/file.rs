//! Event files on disk.
//!
//! Files are written to a temporary sibling, synced, then renamed into
//! place, so a reader never observes a half-written table.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use gammasim_core::EventTable;

use crate::codec::{decode_table, encode_table};
use crate::error::StoreError;

/// Conventional file name for an observation's events.
pub fn event_file_name(obs_id: gammasim_types::ObservationId) -> String {
    format!("events_{:06}.gsev", obs_id.into_inner())
}

/// Write `table` to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file cannot be written, or an
/// encoding error from [`encode_table`].
pub fn write_event_file(path: &Path, table: &EventTable) -> Result<(), StoreError> {
    let bytes = encode_table(table)?;
    let temp_path = temp_path_for(path);
    if let Err(err) = write_then_rename(&temp_path, path, &bytes) {
        // The temp file may not exist if creating it was what failed.
        if fs::remove_file(&temp_path).is_ok() {
            warn!(path = %temp_path.display(), error = %err, "Removed partial event file");
        }
        return Err(err.into());
    }

    info!(
        path = %path.display(),
        obs_id = %table.meta().obs_id,
        events = table.len(),
        bytes = bytes.len(),
        "Event file written"
    );
    Ok(())
}

/// Read an event table from `path`.
///
/// # Errors
///
/// Returns [`StoreError::Io`] if the file cannot be read, or a decoding
/// error from [`decode_table`].
pub fn read_event_file(path: &Path) -> Result<EventTable, StoreError> {
    let bytes = fs::read(path)?;
    let table = decode_table(&bytes)?;
    debug!(path = %path.display(), events = table.len(), "Event file read");
    Ok(table)
}

fn write_then_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp_path, path)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

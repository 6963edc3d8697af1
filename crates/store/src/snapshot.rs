//! JSON snapshot persistence.
//!
//! Snapshots are written to a temporary file inside the destination directory
//! and renamed over the previous snapshot, so readers only ever observe
//! a complete file.

use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use derive_more::{Display, Error, From};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

/// Snapshot read or write failure.
#[derive(Debug, Display, From, Error)]
pub enum SnapshotError {
    /// Filesystem error.
    Io(io::Error),

    /// Snapshot contents are not valid JSON for the expected type.
    Json(serde_json::Error),
}

/// Load a snapshot from the provided path.
///
/// A missing file yields the default value, any other failure is returned.
pub fn load<T: DeserializeOwned + Default>(path: &Path) -> Result<T, SnapshotError> {
    match fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err.into()),
    }
}

/// Atomically replace the snapshot at the provided path.
pub fn persist<T: Serialize>(path: &Path, value: &T) -> Result<(), SnapshotError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;

    Ok(())
}

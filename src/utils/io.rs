//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read file contents with standardized error handling.
///
/// Wraps `fs::read_to_string` with consistent `Error::internal_io` formatting.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write bytes to a file, creating it with the given unix mode.
///
/// An existing file is truncated and its mode reset, so a regenerated key never
/// inherits looser permissions from a previous run.
pub fn write_file_with_mode(path: &Path, content: &[u8], mode: u32, operation: &str) -> Result<()> {
    let io_err = |e: std::io::Error| Error::internal_io(e.to_string(), Some(operation.to_string()));

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(content).map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(io_err)?;
    }

    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}

/// Create a directory and all of its parents.
pub fn create_dir_all(path: &Path, operation: &str) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Remove a directory tree if it exists. Missing directories are not an error.
pub fn remove_dir_if_exists(path: &Path, operation: &str) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

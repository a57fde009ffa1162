use crate::utils::error::SweepError;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Fixed name of the file a download is written to before it is renamed into place.
pub const STAGING_FILE_NAME: &str = "temp.transfer";

pub fn staging_path<P: AsRef<Path>>(local_root: P) -> PathBuf {
    local_root.as_ref().join(STAGING_FILE_NAME)
}

pub fn ensure_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| SweepError::local_io(dir, e))?;
    Ok(())
}

// Creates the single parent segment of an entry such as `r20240101/data.txt`.
pub fn ensure_parent_dir<P: AsRef<Path>>(file_path: P) -> Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    Ok(())
}

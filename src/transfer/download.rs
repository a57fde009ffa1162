// Single-file download: staging file, atomic rename, remote removal
use crate::config::HostConfig;
use crate::ssh::shell::{RemoteShell, RemovalOutcome};
use crate::transfer::listing::RemoteEntry;
use crate::transfer::progress::ProgressTracker;
use crate::utils::error::SweepError;
use crate::utils::file::{ensure_parent_dir, staging_path};
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub bytes: u64,
    pub removal: RemovalOutcome,
}

/// Moves one remote entry into the host's local directory and removes the remote copy.
///
/// The file is written to the staging file first and only renamed to its
/// final name once complete, so the final name never holds a partial file.
/// On failure the staging file is left behind and reused by the next download.
pub fn fetch_entry<S: RemoteShell + ?Sized>(
    shell: &mut S,
    host: &HostConfig,
    entry: &RemoteEntry,
) -> Result<FetchOutcome> {
    let local_root = host.local_directory.as_path();
    let final_path = entry.local_path(local_root);
    if entry.parent().is_some() {
        ensure_parent_dir(&final_path)?;
    }

    let remote_path = entry.remote_path(&host.remote_directory);
    info!("[{}] Transferring file {}", host.name, entry);

    let staging = staging_path(local_root);
    let bytes = download_to_staging(shell, &remote_path, &staging, entry)?;

    info!(
        "[{}] Renaming {} to {}",
        host.name,
        staging.display(),
        entry
    );
    std::fs::rename(&staging, &final_path).map_err(|e| SweepError::local_io(&final_path, e))?;

    info!("[{}] Removing {} from remote server", host.name, remote_path);
    let removal = shell
        .remove(&remote_path)
        .with_context(|| format!("Failed to request removal of {}", remote_path))?;
    if let RemovalOutcome::Failed {
        exit_status,
        stderr,
    } = &removal
    {
        warn!(
            "[{}] Could not remove {} (status {}): {}; it will be downloaded again next run",
            host.name, remote_path, exit_status, stderr
        );
    }

    Ok(FetchOutcome { bytes, removal })
}

fn download_to_staging<S: RemoteShell + ?Sized>(
    shell: &mut S,
    remote_path: &str,
    staging: &Path,
    entry: &RemoteEntry,
) -> Result<u64> {
    let file = File::create(staging).map_err(|e| SweepError::local_io(staging, e))?;
    let mut writer = BufWriter::new(file);
    let mut progress = ProgressTracker::new(entry.as_str());

    let result = {
        let mut report = |received: u64, total: u64| progress.update(received, total);
        shell.download(remote_path, &mut writer, &mut report)
    };
    let bytes = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            progress.finish_with_error(&e.to_string());
            return Err(e.context(format!("Failed to download {}", remote_path)));
        }
    };

    writer.flush().map_err(|e| SweepError::local_io(staging, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| SweepError::local_io(staging, e.into_error()))?;
    file.sync_all().map_err(|e| SweepError::local_io(staging, e))?;

    progress.finish();
    Ok(bytes)
}

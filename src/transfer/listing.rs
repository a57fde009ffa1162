// Remote directory listings
use crate::config::HostConfig;
use crate::ssh::shell::{CommandOutput, RemoteShell};
use crate::utils::error::SweepError;
use crate::utils::shell::quote;
use anyhow::Result;
use log::{debug, warn};
use std::fmt;
use std::path::{Path, PathBuf};

/// Exit status the listing command uses when the remote directory cannot be entered.
pub const MISSING_DIRECTORY_STATUS: i32 = 97;

/// A path relative to the host's remote directory: `name` or `rollover/name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RemoteEntry(String);

impl RemoteEntry {
    /// Accepts a listing line only if it stays inside the remote directory.
    pub fn parse(line: &str) -> Option<Self> {
        if line.is_empty() || line.starts_with('/') || line.contains('\0') {
            return None;
        }
        let segments: Vec<&str> = line.split('/').collect();
        if segments.len() > 2 {
            return None;
        }
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return None;
        }
        Some(RemoteEntry(line.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The rollover directory segment, if the entry came from a historical listing.
    pub fn parent(&self) -> Option<&str> {
        self.0.split_once('/').map(|(dir, _)| dir)
    }

    pub fn remote_path(&self, remote_directory: &str) -> String {
        format!("{}/{}", remote_directory.trim_end_matches('/'), self.0)
    }

    pub fn local_path<P: AsRef<Path>>(&self, local_root: P) -> PathBuf {
        let mut path = local_root.as_ref().to_path_buf();
        for segment in self.0.split('/') {
            path.push(segment);
        }
        path
    }
}

impl AsRef<str> for RemoteEntry {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// The pattern is left unquoted so the remote shell expands it. `-d` stops `ls`
// from descending into matched directories and `-p` marks them with a trailing `/`.
pub fn current_command(remote_directory: &str, pattern: &str) -> String {
    format!(
        "cd {} || exit {}; ls -dp {}",
        quote(remote_directory),
        MISSING_DIRECTORY_STATUS,
        pattern
    )
}

pub fn historical_command(remote_directory: &str, pattern: &str) -> String {
    format!(
        "cd {} || exit {}; ls -dp r*/{}",
        quote(remote_directory),
        MISSING_DIRECTORY_STATUS,
        pattern
    )
}

/// Files matching the pattern directly in the remote directory, in the order `ls` printed them.
pub fn list_current<S: RemoteShell + ?Sized>(shell: &mut S, host: &HostConfig) -> Result<Vec<RemoteEntry>> {
    let command = current_command(&host.remote_directory, &host.file_pattern);
    run_listing(shell, host, &command)
}

/// Files matching the pattern one level down, under `r*` rollover directories.
pub fn list_historical<S: RemoteShell + ?Sized>(
    shell: &mut S,
    host: &HostConfig,
) -> Result<Vec<RemoteEntry>> {
    let command = historical_command(&host.remote_directory, &host.file_pattern);
    run_listing(shell, host, &command)
}

fn run_listing<S: RemoteShell + ?Sized>(
    shell: &mut S,
    host: &HostConfig,
    command: &str,
) -> Result<Vec<RemoteEntry>> {
    let output = shell.run_command(command)?;

    if output.exit_status == MISSING_DIRECTORY_STATUS {
        return Err(SweepError::RemoteCommand {
            command: command.to_string(),
            status: output.exit_status,
            stderr: output.stderr.trim().to_string(),
        }
        .into());
    }

    let entries = parse_listing(&host.name, &output);
    if !output.success() {
        if entries.is_empty() {
            debug!(
                "[{}] `{}` matched nothing (status {})",
                host.name, command, output.exit_status
            );
        } else {
            warn!(
                "[{}] `{}` exited with status {}, using partial listing: {}",
                host.name,
                command,
                output.exit_status,
                output.stderr.trim()
            );
        }
    }
    Ok(entries)
}

pub fn parse_listing(host_name: &str, output: &CommandOutput) -> Vec<RemoteEntry> {
    output
        .lines()
        .filter_map(|line| {
            if line.ends_with('/') {
                debug!("[{}] Skipping directory {}", host_name, line);
                return None;
            }
            let entry = RemoteEntry::parse(line);
            if entry.is_none() {
                warn!("[{}] Ignoring unexpected listing line {:?}", host_name, line);
            }
            entry
        })
        .collect()
}

// The remote operations a host run depends on
use crate::config::HostConfig;
use crate::utils::shell::quote;
use anyhow::Result;
use std::io::Write;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }

    /// Non-blank stdout lines with surrounding whitespace removed.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|line| !line.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    Removed,
    Failed { exit_status: i32, stderr: String },
}

pub fn remove_command(remote_path: &str) -> String {
    format!("rm -- {}", quote(remote_path))
}

pub trait RemoteShell {
    /// Runs `command` through the remote shell and waits for its exit status.
    fn run_command(&mut self, command: &str) -> Result<CommandOutput>;

    /// Streams one remote file into `sink`, calling `progress(received, total)` as bytes arrive.
    fn download(
        &mut self,
        remote_path: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<u64>;

    fn remove(&mut self, remote_path: &str) -> Result<RemovalOutcome> {
        let output = self.run_command(&remove_command(remote_path))?;
        if output.success() {
            Ok(RemovalOutcome::Removed)
        } else {
            Ok(RemovalOutcome::Failed {
                exit_status: output.exit_status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Opens an authenticated shell for one host. Dropping the shell closes the connection.
pub trait Connector {
    type Shell: RemoteShell;

    fn connect(&self, host: &HostConfig) -> Result<Self::Shell>;
}

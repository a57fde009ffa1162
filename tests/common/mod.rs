#![allow(dead_code)]

use anyhow::{anyhow, Result};
use ssh_sweep::config::HostConfig;
use ssh_sweep::ssh::shell::remove_command;
use ssh_sweep::ssh::{CommandOutput, Connector, RemoteShell};
use ssh_sweep::transfer::listing::{current_command, historical_command, MISSING_DIRECTORY_STATUS};
use ssh_sweep::utils::error::SweepError;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// In-memory stand-in for one remote host's directory tree.
#[derive(Default)]
pub struct RemoteState {
    pub directory: String,
    /// Paths relative to `directory`, in the order `ls` reports them.
    pub files: Vec<(String, Vec<u8>)>,
    /// Fail the download of this entry after writing this many bytes.
    pub fail_download: Option<(String, usize)>,
    pub refuse_removal: bool,
    pub commands: Vec<String>,
    pub removed: Vec<String>,
    pub connects: usize,
    pub disconnects: usize,
}

#[derive(Clone, Default)]
pub struct FakeRemote(pub Arc<Mutex<RemoteState>>);

impl FakeRemote {
    pub fn new(directory: &str, files: &[(&str, &str)]) -> Self {
        let state = RemoteState {
            directory: directory.to_string(),
            files: files
                .iter()
                .map(|(name, body)| (name.to_string(), body.as_bytes().to_vec()))
                .collect(),
            ..Default::default()
        };
        FakeRemote(Arc::new(Mutex::new(state)))
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.0.lock().unwrap()
    }

    pub fn remaining(&self) -> Vec<String> {
        self.state().files.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Hands out shells for the hosts it knows; any other host is unreachable.
#[derive(Default)]
pub struct FakeConnector {
    pub remotes: HashMap<String, FakeRemote>,
}

impl FakeConnector {
    pub fn with(host: &str, remote: &FakeRemote) -> Self {
        let mut connector = FakeConnector::default();
        connector.remotes.insert(host.to_string(), remote.clone());
        connector
    }
}

impl Connector for FakeConnector {
    type Shell = FakeShell;

    fn connect(&self, host: &HostConfig) -> Result<FakeShell> {
        let remote = self.remotes.get(&host.host).ok_or_else(|| SweepError::Connectivity {
            address: host.address(),
            message: "Connection refused".to_string(),
        })?;
        remote.state().connects += 1;
        Ok(FakeShell {
            remote: remote.clone(),
            directory: host.remote_directory.clone(),
            pattern: host.file_pattern.clone(),
        })
    }
}

pub struct FakeShell {
    remote: FakeRemote,
    directory: String,
    pattern: String,
}

impl FakeShell {
    fn listing(&self, state: &RemoteState, historical: bool) -> CommandOutput {
        if state.directory != self.directory {
            return CommandOutput {
                stdout: String::new(),
                stderr: "cd: no such directory".to_string(),
                exit_status: MISSING_DIRECTORY_STATUS,
            };
        }

        let mut lines: Vec<String> = Vec::new();
        for (name, _) in &state.files {
            let line = match (historical, name.split_once('/')) {
                (false, None) if wildcard_match(&self.pattern, name) => name.clone(),
                (false, Some((dir, _))) if wildcard_match(&self.pattern, dir) => format!("{}/", dir),
                (true, Some((dir, file)))
                    if dir.starts_with('r') && wildcard_match(&self.pattern, file) =>
                {
                    name.clone()
                }
                _ => continue,
            };
            if !lines.contains(&line) {
                lines.push(line);
            }
        }

        if lines.is_empty() {
            CommandOutput {
                stdout: String::new(),
                stderr: "ls: cannot access: No such file or directory".to_string(),
                exit_status: 2,
            }
        } else {
            CommandOutput {
                stdout: lines.join("\n") + "\n",
                stderr: String::new(),
                exit_status: 0,
            }
        }
    }

    fn relative<'a>(&self, remote_path: &'a str) -> Option<&'a str> {
        remote_path
            .strip_prefix(self.directory.trim_end_matches('/'))
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

impl RemoteShell for FakeShell {
    fn run_command(&mut self, command: &str) -> Result<CommandOutput> {
        let remote = self.remote.clone();
        let mut state = remote.state();
        state.commands.push(command.to_string());

        if command == current_command(&self.directory, &self.pattern) {
            return Ok(self.listing(&state, false));
        }
        if command == historical_command(&self.directory, &self.pattern) {
            return Ok(self.listing(&state, true));
        }

        let target = command
            .strip_prefix("rm -- '")
            .and_then(|rest| rest.strip_suffix('\''))
            .ok_or_else(|| anyhow!("unexpected command {}", command))?;
        assert_eq!(command, remove_command(target));

        let relative = self.relative(target).map(str::to_string);
        let position = relative
            .as_ref()
            .and_then(|rel| state.files.iter().position(|(name, _)| name == rel));
        match position {
            Some(index) if !state.refuse_removal => {
                state.files.remove(index);
                state.removed.push(target.to_string());
                Ok(CommandOutput::default())
            }
            _ => Ok(CommandOutput {
                stdout: String::new(),
                stderr: format!("rm: cannot remove '{}': Permission denied", target),
                exit_status: 1,
            }),
        }
    }

    fn download(
        &mut self,
        remote_path: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<u64> {
        let relative = self
            .relative(remote_path)
            .ok_or_else(|| anyhow!("outside remote directory: {}", remote_path))?
            .to_string();
        let state = self.remote.state();
        let body = state
            .files
            .iter()
            .find(|(name, _)| *name == relative)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| anyhow!("scp: {}: No such file or directory", remote_path))?;
        let total = body.len() as u64;

        if let Some((failing, cut)) = &state.fail_download {
            if *failing == relative {
                sink.write_all(&body[..*cut])?;
                sink.flush()?;
                progress(*cut as u64, total);
                return Err(anyhow!("connection reset by peer"));
            }
        }

        progress(0, total);
        let (head, tail) = body.split_at(body.len() / 2);
        sink.write_all(head)?;
        progress(head.len() as u64, total);
        sink.write_all(tail)?;
        progress(total, total);
        Ok(total)
    }
}

impl Drop for FakeShell {
    fn drop(&mut self) {
        self.remote.state().disconnects += 1;
    }
}

// '*' and '?' only, which is all the listings in these tests need.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p = pattern.as_bytes();
    let s = name.as_bytes();
    let (mut pi, mut si) = (0usize, 0usize);
    let (mut star, mut mark): (Option<usize>, usize) = (None, 0);
    while si < s.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == s[si]) {
            pi += 1;
            si += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star = Some(pi);
            pi += 1;
            mark = si;
        } else if let Some(star_at) = star {
            pi = star_at + 1;
            mark += 1;
            si = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

pub fn host_toml(host: &str, remote_directory: &str, pattern: &str, exclude: &str, local: &Path) -> String {
    format!(
        r#"
host = "{host}"
port = 2222
username = "ingest"
password = "secret"
remote_directory = "{remote_directory}"
file_pattern = "{pattern}"
exclude = "{exclude}"
local_directory = "{local}"
"#,
        local = local.display()
    )
}

pub fn host_config(name: &str, host: &str, pattern: &str, exclude: &str, local: &Path) -> HostConfig {
    HostConfig::from_toml(name, &host_toml(host, "/data/out", pattern, exclude, local)).unwrap()
}

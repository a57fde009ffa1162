// Host configuration files and session options
use crate::cli::Cli;
use crate::utils::error::SweepError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HISTORY_LIMIT: usize = 3;

/// One remote endpoint, loaded from `<config-dir>/<name>.toml`.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    pub remote_directory: String,
    pub file_pattern: String,
    pub exclude: String,
    pub local_directory: PathBuf,
    pub history_limit: usize,
    pub exclude_history: bool,
    pub insecure_accept_any_host_key: bool,
}

#[derive(Clone)]
pub enum AuthMethod {
    Password(String),
    PublicKey(PathBuf),
    Agent,
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => f.write_str("Password(<redacted>)"),
            AuthMethod::PublicKey(path) => f.debug_tuple("PublicKey").field(path).finish(),
            AuthMethod::Agent => f.write_str("Agent"),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct HostFile {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    password: Option<String>,
    key_file: Option<PathBuf>,
    #[serde(default)]
    use_agent: bool,
    remote_directory: String,
    file_pattern: String,
    exclude: String,
    local_directory: PathBuf,
    #[serde(default = "default_history_limit")]
    history_limit: usize,
    #[serde(default = "default_true")]
    exclude_history: bool,
    #[serde(default)]
    insecure_accept_any_host_key: bool,
}

fn default_port() -> u16 {
    22
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_true() -> bool {
    true
}

/// A discovered config file that has not been parsed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSource {
    pub name: String,
    pub path: PathBuf,
}

impl HostSource {
    pub fn load(&self) -> Result<HostConfig> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| SweepError::Configuration {
            name: self.name.clone(),
            reason: format!("cannot read {}: {}", self.path.display(), e),
        })?;
        HostConfig::from_toml(&self.name, &content)
    }
}

/// Lists every `*.toml` file in `dir`, ordered by file name.
pub fn discover_host_configs<P: AsRef<Path>>(dir: P) -> Result<Vec<HostSource>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read config directory {}", dir.display()))?;

    let mut sources = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read config directory {}", dir.display()))?
            .path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        sources.push(HostSource {
            name: name.to_string(),
            path,
        });
    }
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sources)
}

impl HostConfig {
    pub fn from_toml(name: &str, content: &str) -> Result<Self> {
        let file: HostFile = toml::from_str(content).map_err(|e| SweepError::Configuration {
            name: name.to_string(),
            reason: e.message().to_string(),
        })?;
        Self::from_file(name, file)
    }

    fn from_file(name: &str, file: HostFile) -> Result<Self> {
        let invalid = |reason: String| SweepError::Configuration {
            name: name.to_string(),
            reason,
        };

        let required = [
            ("host", file.host.as_str()),
            ("username", file.username.as_str()),
            ("remote_directory", file.remote_directory.as_str()),
            ("file_pattern", file.file_pattern.as_str()),
            ("exclude", file.exclude.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(invalid(format!("`{}` must not be empty", field)).into());
            }
        }
        if file.local_directory.as_os_str().is_empty() {
            return Err(invalid("`local_directory` must not be empty".to_string()).into());
        }
        if file.port == 0 {
            return Err(invalid("`port` must not be 0".to_string()).into());
        }

        let auth = match (file.password, file.key_file, file.use_agent) {
            (Some(password), None, false) if !password.is_empty() => AuthMethod::Password(password),
            (None, Some(key_file), false) => AuthMethod::PublicKey(key_file),
            (None, None, true) => AuthMethod::Agent,
            (None, None, false) => {
                return Err(invalid(
                    "one of `password`, `key_file` or `use_agent` is required".to_string(),
                )
                .into())
            }
            (Some(_), None, false) => {
                return Err(invalid("`password` must not be empty".to_string()).into())
            }
            _ => {
                return Err(invalid(
                    "only one of `password`, `key_file` or `use_agent` may be set".to_string(),
                )
                .into())
            }
        };

        Ok(HostConfig {
            name: name.to_string(),
            host: file.host,
            port: file.port,
            username: file.username,
            auth,
            remote_directory: file.remote_directory,
            file_pattern: file.file_pattern,
            exclude: file.exclude,
            local_directory: file.local_directory,
            history_limit: file.history_limit,
            exclude_history: file.exclude_history,
            insecure_accept_any_host_key: file.insecure_accept_any_host_key,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub enum HostKeyPolicy {
    KnownHosts(PathBuf),
    AcceptAny,
}

/// Settings shared by every SSH session in a batch.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub host_key_policy: HostKeyPolicy,
    pub connect_timeout: Duration,
    pub inactivity_timeout: Duration,
}

impl SessionOptions {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let host_key_policy = if cli.insecure_accept_any_host_key {
            HostKeyPolicy::AcceptAny
        } else {
            let known_hosts = match &cli.known_hosts {
                Some(path) => path.clone(),
                None => home::home_dir()
                    .context("Cannot determine home directory for known_hosts")?
                    .join(".ssh")
                    .join("known_hosts"),
            };
            HostKeyPolicy::KnownHosts(known_hosts)
        };

        Ok(SessionOptions {
            host_key_policy,
            connect_timeout: Duration::from_secs(cli.connect_timeout),
            inactivity_timeout: Duration::from_secs(cli.timeout),
        })
    }

    /// The policy a specific host runs under; a host file can only weaken verification.
    pub fn host_key_policy_for(&self, host: &HostConfig) -> HostKeyPolicy {
        if host.insecure_accept_any_host_key {
            HostKeyPolicy::AcceptAny
        } else {
            self.host_key_policy.clone()
        }
    }
}

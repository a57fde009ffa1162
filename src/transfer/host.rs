// One pass over one host
use crate::config::HostConfig;
use crate::ssh::shell::{Connector, RemoteShell, RemovalOutcome};
use crate::transfer::download::fetch_entry;
use crate::transfer::filter::{exclude_matching, newest_history};
use crate::transfer::listing::{list_current, list_historical, RemoteEntry};
use crate::utils::file::ensure_dir;
use anyhow::Result;
use log::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostReport {
    pub fetched: Vec<String>,
    pub bytes: u64,
    pub removal_failures: usize,
}

/// Connects to `host`, fetches its current files and then its newest rollover files.
///
/// The first failing transfer ends the run for this host. The connection is
/// closed on every return path when the shell is dropped.
pub fn run_host<C: Connector>(connector: &C, host: &HostConfig) -> Result<HostReport> {
    info!("[{}] Beginning transfer", host.name);
    ensure_dir(&host.local_directory)?;

    let mut shell = connector.connect(host)?;
    sweep(&mut shell, host)
}

pub fn sweep<S: RemoteShell + ?Sized>(shell: &mut S, host: &HostConfig) -> Result<HostReport> {
    let current = list_current(shell, host)?;
    debug!("[{}] Directory list is: {:?}", host.name, names(&current));
    let current = exclude_matching(current, &host.exclude);

    let historical = list_historical(shell, host)?;
    debug!("[{}] Old file list is: {:?}", host.name, names(&historical));
    let historical = if host.exclude_history {
        exclude_matching(historical, &host.exclude)
    } else {
        historical
    };
    let historical = newest_history(historical, host.history_limit);

    info!(
        "[{}] Got file list of: {:?}, rollover files: {:?}",
        host.name,
        names(&current),
        names(&historical)
    );

    let mut report = HostReport::default();
    for entry in current.iter().chain(historical.iter()) {
        let outcome = fetch_entry(shell, host, entry)?;
        report.fetched.push(entry.to_string());
        report.bytes += outcome.bytes;
        if outcome.removal != RemovalOutcome::Removed {
            report.removal_failures += 1;
        }
    }
    Ok(report)
}

fn names(entries: &[RemoteEntry]) -> Vec<&str> {
    entries.iter().map(RemoteEntry::as_str).collect()
}

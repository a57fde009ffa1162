// Runs every configured host, isolating failures per host
use crate::config::HostSource;
use crate::ssh::shell::Connector;
use crate::transfer::host::run_host;
use log::{error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

/// Processes each host in order; a failing host is logged and skipped.
pub fn run_batch<C: Connector>(connector: &C, sources: &[HostSource]) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for source in sources {
        let result = source.load().and_then(|host| run_host(connector, &host));
        match result {
            Ok(report) => {
                info!(
                    "[{}] Finished: {} file(s), {} bytes",
                    source.name,
                    report.fetched.len(),
                    report.bytes
                );
                if report.removal_failures > 0 {
                    warn!(
                        "[{}] {} file(s) could not be removed from the remote server",
                        source.name, report.removal_failures
                    );
                }
                summary.succeeded.push(source.name.clone());
            }
            Err(e) => {
                error!(
                    "Unable to transfer files for {} ({}): {:#}",
                    source.name,
                    source.path.display(),
                    e
                );
                summary.failed.push(source.name.clone());
            }
        }
    }

    summary
}

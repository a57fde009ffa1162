pub mod batch;
pub mod cli;
pub mod config;
pub mod ssh;
pub mod transfer;
pub mod utils;

use anyhow::Result;
use batch::{run_batch, BatchSummary};
use cli::Cli;
use config::{discover_host_configs, SessionOptions};
use log::{debug, info};
use ssh::SshConnector;

pub fn run(cli: &Cli) -> Result<BatchSummary> {
    let options = SessionOptions::from_cli(cli)?;
    let sources = discover_host_configs(&cli.config_dir)?;
    debug!(
        "Processing config files in {}: {:?}",
        cli.config_dir.display(),
        sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
    );
    if sources.is_empty() {
        info!("No host configurations found in {}", cli.config_dir.display());
    }

    let connector = SshConnector::new(options);
    Ok(run_batch(&connector, &sources))
}

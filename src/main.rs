use clap::Parser;
use log::{error, info};
use ssh_sweep::{cli::Cli, run};

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    info!("Beginning processing");

    match run(&cli) {
        Ok(summary) => {
            info!(
                "Transfer process complete: {} host(s) succeeded, {} failed",
                summary.succeeded.len(),
                summary.failed.len()
            );
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

// Command line arguments
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ssh-sweep")]
#[command(about = "Download matching files from SSH hosts and remove them remotely")]
#[command(version)]
pub struct Cli {
    /// Directory holding one `<name>.toml` file per remote host
    #[arg(short, long, default_value = "config")]
    pub config_dir: PathBuf,

    /// OpenSSH known_hosts file used to verify host keys (default: ~/.ssh/known_hosts)
    #[arg(short, long)]
    pub known_hosts: Option<PathBuf>,

    /// Skip host key verification for every host
    #[arg(long)]
    pub insecure_accept_any_host_key: bool,

    /// Session inactivity timeout in seconds
    #[arg(short, long, default_value = "180")]
    pub timeout: u64,

    /// TCP connect timeout in seconds
    #[arg(long, default_value = "30")]
    pub connect_timeout: u64,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

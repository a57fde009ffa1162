// SSH transport
pub mod client;
pub mod session;
pub mod shell;

pub use client::SshClient;
pub use session::SshConnector;
pub use shell::{CommandOutput, Connector, RemoteShell, RemovalOutcome};

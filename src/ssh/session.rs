// Opens one SSH session per host run
use crate::config::{HostConfig, SessionOptions};
use crate::ssh::shell::Connector;
use crate::ssh::SshClient;
use anyhow::Result;
use log::info;

pub struct SshConnector {
    pub options: SessionOptions,
}

impl SshConnector {
    pub fn new(options: SessionOptions) -> Self {
        SshConnector { options }
    }
}

impl Connector for SshConnector {
    type Shell = SshClient;

    fn connect(&self, host: &HostConfig) -> Result<SshClient> {
        let client = SshClient::connect(host, &self.options)?;
        info!(
            "[{}] Connected to {}@{}",
            host.name,
            host.username,
            host.address()
        );
        Ok(client)
    }
}

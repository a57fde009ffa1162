use thiserror::Error;

#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid host configuration {name}: {reason}")]
    Configuration { name: String, reason: String },

    #[error("Cannot reach {address}: {message}")]
    Connectivity { address: String, message: String },

    #[error("Authentication failed for {username}@{host}")]
    AuthenticationFailed { username: String, host: String },

    #[error("Host key verification failed for {host}: {reason}")]
    HostKey { host: String, reason: String },

    #[error("Remote command `{command}` failed with status {status}: {stderr}")]
    RemoteCommand {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("Transfer of {path} failed: {message}")]
    Transfer { path: String, message: String },

    #[error("Local IO error on {path}: {source}")]
    LocalIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SweepError {
    pub fn local_io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        SweepError::LocalIo {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

// SSH client wrapper
use crate::config::{AuthMethod, HostConfig, HostKeyPolicy, SessionOptions};
use crate::ssh::shell::{CommandOutput, RemoteShell};
use crate::utils::error::SweepError;
use anyhow::{Context, Result};
use log::{debug, warn};
use ssh2::{CheckResult, KnownHostFileKind, Session};
use std::io::prelude::*;
use std::io::{self, ErrorKind};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

const CHUNK_SIZE: usize = 64 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct SshClient {
    pub session: Session,
    address: String,
    inactivity_timeout: Duration,
}

impl SshClient {
    pub fn connect(host: &HostConfig, options: &SessionOptions) -> Result<Self> {
        let address = host.address();
        let tcp = connect_tcp(&address, options.connect_timeout)?;

        let mut session = Session::new().context("Failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout_millis(options.inactivity_timeout));
        session
            .handshake()
            .map_err(|e| SweepError::Connectivity {
                address: address.clone(),
                message: format!("SSH handshake failed: {}", e),
            })?;

        verify_host_key(&session, host, &options.host_key_policy_for(host))?;

        let auth_result = match &host.auth {
            AuthMethod::Password(password) => session.userauth_password(&host.username, password),
            AuthMethod::PublicKey(key_path) => {
                session.userauth_pubkey_file(&host.username, None, key_path, None)
            }
            AuthMethod::Agent => session.userauth_agent(&host.username),
        };
        if let Err(e) = auth_result {
            debug!("[{}] authentication error: {}", host.name, e);
        }

        if !session.authenticated() {
            return Err(SweepError::AuthenticationFailed {
                username: host.username.clone(),
                host: host.host.clone(),
            }
            .into());
        }

        Ok(SshClient {
            session,
            address,
            inactivity_timeout: options.inactivity_timeout,
        })
    }
}

fn connect_tcp(address: &str, timeout: Duration) -> Result<TcpStream> {
    let unreachable = |message: String| SweepError::Connectivity {
        address: address.to_string(),
        message,
    };

    let addrs = address
        .to_socket_addrs()
        .map_err(|e| unreachable(format!("cannot resolve: {}", e)))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
    }
    let message = match last_error {
        Some(e) => e.to_string(),
        None => "no addresses resolved".to_string(),
    };
    Err(unreachable(message).into())
}

fn verify_host_key(session: &Session, host: &HostConfig, policy: &HostKeyPolicy) -> Result<()> {
    let rejected = |reason: String| SweepError::HostKey {
        host: host.address(),
        reason,
    };

    let known_hosts_path = match policy {
        HostKeyPolicy::AcceptAny => {
            warn!(
                "[{}] HOST KEY VERIFICATION DISABLED: accepting any key presented by {}",
                host.name,
                host.address()
            );
            return Ok(());
        }
        HostKeyPolicy::KnownHosts(path) => path,
    };

    let mut known_hosts = session.known_hosts()?;
    known_hosts
        .read_file(known_hosts_path, KnownHostFileKind::OpenSSH)
        .map_err(|e| {
            rejected(format!(
                "cannot read {}: {}",
                known_hosts_path.display(),
                e
            ))
        })?;

    let (key, _) = session
        .host_key()
        .ok_or_else(|| rejected("server presented no host key".to_string()))?;

    match known_hosts.check_port(&host.host, host.port, key) {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(rejected(format!(
            "host is not listed in {}",
            known_hosts_path.display()
        ))
        .into()),
        CheckResult::Mismatch => Err(rejected(format!(
            "key does not match the entry in {}",
            known_hosts_path.display()
        ))
        .into()),
        CheckResult::Failure => Err(rejected("known_hosts lookup failed".to_string()).into()),
    }
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

/// Reads two non-blocking streams side by side until `finished` reports EOF and
/// neither stream has data left, so a full stderr window cannot stall stdout.
fn drain_streams(
    stdout: &mut dyn Read,
    stderr: &mut dyn Read,
    finished: &dyn Fn() -> bool,
    idle_timeout: Duration,
) -> io::Result<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut last_activity = Instant::now();

    loop {
        let read_out = read_available(stdout, &mut buffer, &mut out)?;
        let read_err = read_available(stderr, &mut buffer, &mut err)?;

        if read_out || read_err {
            last_activity = Instant::now();
            continue;
        }
        if finished() {
            return Ok((out, err));
        }
        if last_activity.elapsed() >= idle_timeout {
            return Err(io::Error::new(
                ErrorKind::TimedOut,
                "remote command produced no output before the timeout",
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

// Returns whether any bytes were read.
fn read_available(stream: &mut dyn Read, buffer: &mut [u8], into: &mut Vec<u8>) -> io::Result<bool> {
    match stream.read(buffer) {
        Ok(0) => Ok(false),
        Ok(n) => {
            into.extend_from_slice(&buffer[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

impl RemoteShell for SshClient {
    fn run_command(&mut self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .session
            .channel_session()
            .context("Failed to create SSH channel")?;

        channel
            .exec(command)
            .with_context(|| format!("Failed to execute `{}`", command))?;

        self.session.set_blocking(false);
        let drained = drain_streams(
            &mut channel.stream(0),
            &mut channel.stderr(),
            &|| channel.eof(),
            self.inactivity_timeout,
        );
        self.session.set_blocking(true);
        let (stdout, stderr) =
            drained.with_context(|| format!("Failed to read output of `{}`", command))?;

        // The exit status is only reliable once the channel is closed.
        channel.wait_close().context("Failed to close channel")?;
        let exit_status = channel
            .exit_status()
            .context("Failed to read command exit status")?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    fn download(
        &mut self,
        remote_path: &str,
        sink: &mut dyn Write,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<u64> {
        let (mut channel, stat) = self
            .session
            .scp_recv(Path::new(remote_path))
            .with_context(|| format!("Failed to open {} on {}", remote_path, self.address))?;

        let total = stat.size();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut received = 0u64;
        progress(received, total);

        while received < total {
            let wanted = (total - received).min(buffer.len() as u64) as usize;
            let bytes_read = channel
                .read(&mut buffer[..wanted])
                .with_context(|| format!("Failed to read {}", remote_path))?;
            if bytes_read == 0 {
                break;
            }
            sink.write_all(&buffer[..bytes_read])
                .context("Failed to write to staging file")?;
            received += bytes_read as u64;
            progress(received, total);
        }

        if received < total {
            return Err(SweepError::Transfer {
                path: remote_path.to_string(),
                message: format!("stream ended after {} of {} bytes", received, total),
            }
            .into());
        }

        channel.send_eof().context("Failed to finish SCP transfer")?;
        channel.wait_eof().context("Failed to finish SCP transfer")?;
        channel.close().context("Failed to close SCP channel")?;
        channel.wait_close().context("Failed to close SCP channel")?;

        Ok(received)
    }
}

impl Drop for SshClient {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "ssh-sweep done", None) {
            debug!("Disconnect from {} failed: {}", self.address, e);
        } else {
            debug!("Disconnected from {}", self.address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_saturate() {
        assert_eq!(timeout_millis(Duration::from_secs(180)), 180_000);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX)), u32::MAX);
    }

    struct Chunks {
        pending: Vec<io::Result<Vec<u8>>>,
    }

    impl Chunks {
        fn new(mut pending: Vec<io::Result<Vec<u8>>>) -> Self {
            pending.reverse();
            Chunks { pending }
        }
    }

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.pending.pop() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
            }
        }
    }

    fn would_block() -> io::Result<Vec<u8>> {
        Err(io::Error::from(ErrorKind::WouldBlock))
    }

    #[test]
    fn large_stderr_is_drained_alongside_stdout() {
        let big = vec![b'e'; CHUNK_SIZE];
        let mut stdout = Chunks::new(vec![would_block(), Ok(b"a.txt\n".to_vec()), would_block()]);
        let mut stderr = Chunks::new(vec![Ok(big.clone()), Ok(big.clone()), would_block()]);

        let (out, err) =
            drain_streams(&mut stdout, &mut stderr, &|| true, Duration::from_secs(5)).unwrap();

        assert_eq!(out, b"a.txt\n");
        assert_eq!(err.len(), 2 * CHUNK_SIZE);
    }

    #[test]
    fn silent_command_times_out() {
        let mut stdout = Chunks::new((0..1000).map(|_| would_block()).collect());
        let mut stderr = Chunks::new(Vec::new());

        let err = drain_streams(&mut stdout, &mut stderr, &|| false, Duration::from_millis(30))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn read_errors_are_propagated() {
        let mut stdout = Chunks::new(vec![Err(io::Error::from(ErrorKind::ConnectionReset))]);
        let mut stderr = Chunks::new(Vec::new());

        let err = drain_streams(&mut stdout, &mut stderr, &|| true, Duration::from_secs(5))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConnectionReset);
    }

    #[test]
    fn unusable_addresses_are_connectivity_errors() {
        for address in ["missing-port", "127.0.0.1:1"] {
            let err = connect_tcp(address, Duration::from_secs(2)).unwrap_err();
            assert!(
                matches!(
                    err.downcast_ref::<SweepError>(),
                    Some(SweepError::Connectivity { .. })
                ),
                "{}: {:#}",
                address,
                err
            );
        }
    }
}

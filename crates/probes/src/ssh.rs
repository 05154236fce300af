//! SSH password authentication probe
//!
//! libssh2 is blocking, so every attempt runs on Tokio's blocking pool with
//! a fresh TCP connection and session.

use crate::common::ProbeError;
use crate::constants::DEFAULT_SSH_TIMEOUT;

use probeforge_core::{Candidate, Outcome, Payload, Probe};
use ssh2::{ErrorCode, Session};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::trace;

/// `LIBSSH2_ERROR_AUTHENTICATION_FAILED`
const AUTHENTICATION_FAILED: i32 = -18;

/// Tries each candidate as the password for one user
#[derive(Debug, Clone)]
pub struct SshProbe {
    host: String,
    port: u16,
    username: String,
    connect_timeout: Duration,
}

impl SshProbe {
    pub fn new<H: Into<String>, U: Into<String>>(host: H, port: u16, username: U) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            connect_timeout: DEFAULT_SSH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// One blocking login attempt; `Ok(false)` means the server said no
    fn attempt(&self, password: &str, limit: Duration) -> Result<bool, ProbeError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| ProbeError::InvalidTarget(self.target()))?;

        let tcp = TcpStream::connect_timeout(&addr, limit)?;
        tcp.set_read_timeout(Some(limit))?;
        tcp.set_write_timeout(Some(limit))?;

        let mut session = Session::new().map_err(|e| ProbeError::Internal(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(limit.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(|e| ProbeError::Protocol(format!("handshake: {e}")))?;

        match session.userauth_password(&self.username, password) {
            Ok(()) => Ok(session.authenticated()),
            Err(e) if e.code() == ErrorCode::Session(AUTHENTICATION_FAILED) => Ok(false),
            Err(e) => Err(ProbeError::Protocol(format!("auth: {e}"))),
        }
    }
}

impl Probe for SshProbe {
    async fn probe(&self, candidate: &Candidate, timeout: Option<Duration>) -> Outcome {
        let limit = timeout.map_or(self.connect_timeout, |t| t.min(self.connect_timeout));
        let probe = self.clone();
        let password = candidate.value().to_string();

        let attempt = tokio::task::spawn_blocking(move || {
            probe
                .attempt(&password, limit)
                .map(|authenticated| (authenticated, password))
        })
        .await;

        match attempt {
            Ok(Ok((true, password))) => {
                Outcome::Success(Payload::new(format!("{}:{}", self.username, password)))
            }
            Ok(Ok((false, _))) => {
                trace!(host = %self.target(), user = %self.username, "Authentication rejected");
                Outcome::hard_reject("auth")
            }
            Ok(Err(e)) => e.into_outcome(),
            Err(e) => Outcome::transient(format!("ssh worker: {e}")),
        }
    }
}

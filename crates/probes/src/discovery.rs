//! Host liveness checks run before a port scan
//!
//! Candidates are bare hosts. [`DiscoveryMethod::Ping`] shells out to the
//! system `ping` (one echo request, exit status 0 means up) so no raw socket
//! privileges are needed. [`DiscoveryMethod::TcpConnect`] tries a handful of
//! common ports at once; an accepted or actively refused connection both
//! prove the host answered.

use crate::constants::{DEFAULT_TCP_TIMEOUT, DISCOVERY_PORTS};

use probeforge_core::{Candidate, Outcome, Payload, Probe};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, trace};

/// How hosts are checked for liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    /// One ICMP echo through the system `ping`
    Ping,
    /// TCP connect to common ports
    TcpConnect,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::Ping => "ping",
            DiscoveryMethod::TcpConnect => "tcp",
        }
    }
}

/// Host liveness probe
#[derive(Debug, Clone)]
pub struct HostDiscoveryProbe {
    method: DiscoveryMethod,
    wait: Duration,
    program: String,
    ports: Vec<u16>,
}

impl HostDiscoveryProbe {
    pub fn new(method: DiscoveryMethod) -> Self {
        Self {
            method,
            wait: DEFAULT_TCP_TIMEOUT,
            program: "ping".to_string(),
            ports: DISCOVERY_PORTS.to_vec(),
        }
    }

    /// Longest wait for a reply
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Use another `ping` executable
    pub fn with_program<S: Into<String>>(mut self, program: S) -> Self {
        self.program = program.into();
        self
    }

    /// Ports tried by [`DiscoveryMethod::TcpConnect`]
    pub fn with_ports<I: IntoIterator<Item = u16>>(mut self, ports: I) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    pub fn method(&self) -> DiscoveryMethod {
        self.method
    }

    async fn ping(&self, host: &str, wait: Duration) -> Outcome {
        let start = Instant::now();
        let mut command = Command::new(&self.program);
        command
            .args(ping_args(host, wait))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match command.status().await {
            Ok(status) if status.success() => Outcome::Success(alive(host, "ping", start)),
            Ok(status) => {
                trace!(host, status = ?status.code(), "No echo reply");
                Outcome::hard_reject("down")
            }
            Err(e) => {
                debug!(program = %self.program, error = %e, "Failed to run ping");
                Outcome::transient(format!("cannot run {}: {}", self.program, e))
            }
        }
    }

    async fn tcp_connect(&self, host: &str, wait: Duration) -> Outcome {
        let start = Instant::now();
        let mut attempts = JoinSet::new();
        for &port in &self.ports {
            let address = (host.to_string(), port);
            attempts.spawn(async move {
                match timeout(wait, TcpStream::connect(address)).await {
                    Ok(Ok(_stream)) => Some((port, "open")),
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                        Some((port, "refused"))
                    }
                    _ => None,
                }
            });
        }

        while let Some(joined) = attempts.join_next().await {
            if let Ok(Some((port, state))) = joined {
                trace!(host, port, state, "Host answered");
                let payload = alive(host, "tcp", start)
                    .with_metadata("port", port.to_string())
                    .with_metadata("state", state);
                return Outcome::Success(payload);
            }
        }
        Outcome::hard_reject("down")
    }
}

fn alive(host: &str, method: &str, start: Instant) -> Payload {
    Payload::new(host)
        .with_metadata("method", method)
        .with_metadata("rtt_ms", start.elapsed().as_millis().to_string())
}

/// One echo request, waiting at most `wait`
fn ping_args(host: &str, wait: Duration) -> Vec<String> {
    let secs = wait.as_secs().max(1).to_string();
    let mut args: Vec<String> = if cfg!(windows) {
        vec!["-n".into(), "1".into(), "-w".into(), wait.as_millis().max(1).to_string()]
    } else if cfg!(target_os = "macos") {
        vec!["-c".into(), "1".into(), "-t".into(), secs]
    } else {
        vec!["-c".into(), "1".into(), "-w".into(), secs]
    };
    args.push(host.to_string());
    args
}

impl Probe for HostDiscoveryProbe {
    async fn probe(&self, candidate: &Candidate, timeout: Option<Duration>) -> Outcome {
        let host = candidate.value();
        if host.is_empty() {
            return Outcome::hard_reject("invalid target");
        }
        let wait = timeout.map_or(self.wait, |t| t.min(self.wait));

        match self.method {
            DiscoveryMethod::Ping => self.ping(host, wait).await,
            DiscoveryMethod::TcpConnect => self.tcp_connect(host, wait).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probeforge_core::OutcomeKind;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ping_exit_status_decides() {
        let up = HostDiscoveryProbe::new(DiscoveryMethod::Ping).with_program("true");
        let outcome = up.probe(&Candidate::new(0, "10.0.0.1"), None).await;
        assert_eq!(outcome.kind(), OutcomeKind::Success);
        assert_eq!(outcome.payload().unwrap().summary, "10.0.0.1");

        let down = HostDiscoveryProbe::new(DiscoveryMethod::Ping).with_program("false");
        let outcome = down.probe(&Candidate::new(1, "10.0.0.2"), None).await;
        assert_eq!(outcome, Outcome::hard_reject("down"));
    }

    #[tokio::test]
    async fn test_missing_ping_is_transient() {
        let check = HostDiscoveryProbe::new(DiscoveryMethod::Ping)
            .with_program("/nonexistent/bin/ping-missing");
        let outcome = check.probe(&Candidate::new(0, "10.0.0.1"), None).await;
        assert_eq!(outcome.kind(), OutcomeKind::TransientError);
    }

    #[tokio::test]
    async fn test_tcp_refused_or_open_means_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = {
            let temp = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            temp.local_addr().unwrap().port()
        };

        let check = HostDiscoveryProbe::new(DiscoveryMethod::TcpConnect).with_ports([open]);
        let outcome = check.probe(&Candidate::new(0, "127.0.0.1"), None).await;
        assert_eq!(outcome.payload().unwrap().metadata["state"], "open");

        let check = HostDiscoveryProbe::new(DiscoveryMethod::TcpConnect).with_ports([closed]);
        let outcome = check.probe(&Candidate::new(1, "127.0.0.1"), None).await;
        assert_eq!(outcome.payload().unwrap().metadata["state"], "refused");
    }

    #[tokio::test]
    async fn test_tcp_silence_means_down() {
        let check = HostDiscoveryProbe::new(DiscoveryMethod::TcpConnect)
            .with_wait(Duration::from_millis(50))
            .with_ports([9]);
        // TEST-NET-1 is never routed
        let outcome = check.probe(&Candidate::new(0, "192.0.2.1"), None).await;
        assert_eq!(outcome, Outcome::hard_reject("down"));

        let check = HostDiscoveryProbe::new(DiscoveryMethod::TcpConnect).with_ports([]);
        let outcome = check.probe(&Candidate::new(1, "127.0.0.1"), None).await;
        assert_eq!(outcome, Outcome::hard_reject("down"));
    }

    #[test]
    fn test_ping_args_send_one_request() {
        let args = ping_args("10.0.0.1", Duration::from_millis(300));
        assert_eq!(args.last().map(String::as_str), Some("10.0.0.1"));
        assert_eq!(args[1], "1");
        assert_eq!(DiscoveryMethod::TcpConnect.as_str(), "tcp");
    }
}

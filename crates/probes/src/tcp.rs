//! TCP connect probing for probeforge
//!
//! Candidates are `host:port` pairs. An accepted connection is a success, an
//! actively refused one is a closed port, and anything else (timeouts,
//! unreachable networks) says nothing about the port and is transient.

use crate::common::ProbeError;
use crate::constants::{DEFAULT_TCP_TIMEOUT, MAX_CIDR_HOSTS};

use probeforge_core::{Candidate, Outcome, Payload, Probe};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// TCP connect probe
#[derive(Debug, Clone)]
pub struct TcpConnectProbe {
    connect_timeout: Duration,
}

impl Default for TcpConnectProbe {
    fn default() -> Self {
        Self::new(DEFAULT_TCP_TIMEOUT)
    }
}

impl TcpConnectProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Perform TCP connect
    async fn connect(&self, host: &str, port: u16, limit: Duration) -> Result<Duration, ProbeError> {
        let start_time = Instant::now();
        match timeout(limit, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => Ok(start_time.elapsed()),
            Ok(Err(e)) => {
                trace!("TCP connect failed to {}:{}: {}", host, port, e);
                Err(ProbeError::from(e))
            }
            Err(_) => {
                trace!("TCP connect timeout to {}:{}", host, port);
                Err(ProbeError::Timeout)
            }
        }
    }
}

impl Probe for TcpConnectProbe {
    async fn probe(&self, candidate: &Candidate, timeout: Option<Duration>) -> Outcome {
        let (host, port) = match split_target(candidate.value()) {
            Ok(target) => target,
            Err(e) => return e.into_outcome(),
        };
        let limit = timeout.map_or(self.connect_timeout, |t| t.min(self.connect_timeout));

        match self.connect(host, port, limit).await {
            Ok(connect_time) => {
                let mut payload = Payload::new(format!("{}:{} open", host, port))
                    .with_metadata("connect_ms", connect_time.as_millis().to_string());
                if let Some(service) = service_name(port) {
                    payload = payload.with_metadata("service", service);
                    payload.summary = format!("{}:{} open ({})", host, port, service);
                }
                Outcome::Success(payload)
            }
            Err(ProbeError::ConnectionRefused) => Outcome::hard_reject("closed"),
            Err(e) => e.into_outcome(),
        }
    }
}

/// Split `host:port`; IPv6 hosts are written `[addr]:port`
pub fn split_target(target: &str) -> Result<(&str, u16), ProbeError> {
    let invalid = || ProbeError::InvalidTarget(target.to_string());
    let (host, port) = target.rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }
    Ok((host, port))
}

/// Expand a host argument: an IPv4 CIDR block, or a single host kept as is
///
/// Blocks larger than [`MAX_CIDR_HOSTS`] are rejected. For prefixes shorter
/// than /31 the network and broadcast addresses are excluded.
pub fn expand_hosts(spec: &str) -> Result<Vec<String>, ProbeError> {
    let spec = spec.trim();
    let Some((addr, prefix)) = spec.split_once('/') else {
        if spec.is_empty() {
            return Err(ProbeError::InvalidTarget(spec.to_string()));
        }
        return Ok(vec![spec.to_string()]);
    };

    let invalid = || ProbeError::InvalidTarget(spec.to_string());
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let prefix: u32 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 {
        return Err(invalid());
    }

    let size = 1u64 << (32 - prefix);
    if size > MAX_CIDR_HOSTS {
        return Err(ProbeError::Unsupported(format!(
            "{spec} spans {size} addresses (max {MAX_CIDR_HOSTS})"
        )));
    }

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let network = u64::from(u32::from(addr) & mask);
    let (first, last) = if prefix < 31 {
        (network + 1, network + size - 2)
    } else {
        (network, network + size - 1)
    };

    Ok((first..=last)
        .map(|ip| Ipv4Addr::from(ip as u32).to_string())
        .collect())
}

/// Parse a port list such as `22,80,8000-8010`
pub fn parse_ports(spec: &str) -> Result<Vec<u16>, ProbeError> {
    let mut ports = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let invalid = || ProbeError::InvalidTarget(format!("port {part}"));
        let parse = |value: &str| match value.trim().parse::<u16>() {
            Ok(0) | Err(_) => Err(invalid()),
            Ok(port) => Ok(port),
        };

        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(invalid());
                }
                ports.extend(start..=end);
            }
            None => ports.push(parse(part)?),
        }
    }

    if ports.is_empty() {
        return Err(ProbeError::InvalidTarget("empty port list".to_string()));
    }
    let mut seen = std::collections::HashSet::new();
    ports.retain(|port| seen.insert(*port));
    Ok(ports)
}

/// Get service name for common TCP ports
pub fn service_name(port: u16) -> Option<&'static str> {
    match port {
        21 => Some("ftp"),
        22 => Some("ssh"),
        23 => Some("telnet"),
        25 => Some("smtp"),
        53 => Some("domain"),
        80 => Some("http"),
        110 => Some("pop3"),
        111 => Some("sunrpc"),
        135 => Some("epmap"),
        139 => Some("netbios-ssn"),
        143 => Some("imap"),
        389 => Some("ldap"),
        443 => Some("https"),
        445 => Some("microsoft-ds"),
        465 => Some("submissions"),
        587 => Some("submission"),
        993 => Some("imaps"),
        995 => Some("pop3s"),
        1433 => Some("ms-sql-s"),
        1723 => Some("pptp"),
        3306 => Some("mysql"),
        3389 => Some("ms-wbt-server"),
        5432 => Some("postgresql"),
        5900 => Some("vnc"),
        6379 => Some("redis"),
        8080 => Some("http-alt"),
        8443 => Some("https-alt"),
        27017 => Some("mongodb"),
        _ => None,
    }
}

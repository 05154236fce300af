//! Probes for probeforge
//!
//! This crate provides the [`Probe`] implementations behind the probeforge
//! tools:
//! - HTTP GET probing for directory enumeration and subdomain discovery
//! - TCP connect probing for port scans
//! - Host discovery (system `ping` or TCP connect) ahead of a port scan
//! - Offline hash comparison for hash cracking
//! - SSH password authentication (feature `ssh`)
//! - Hash type identification and generation

pub mod common;
pub mod discovery;
pub mod hash;
pub mod hashid;
pub mod http;
#[cfg(feature = "ssh")]
pub mod ssh;
pub mod tcp;

// Re-export commonly used types
pub use common::ProbeError;
pub use discovery::{DiscoveryMethod, HostDiscoveryProbe};
pub use hash::{HashAlgorithm, HashProbe};
pub use hashid::{analyze, generate, identify, HashAnalysis};
pub use http::{HttpProbe, UrlMode};
#[cfg(feature = "ssh")]
pub use ssh::SshProbe;
pub use tcp::{expand_hosts, parse_ports, service_name, split_target, TcpConnectProbe};

// Re-export from core
pub use probeforge_core::{Candidate, Outcome, Probe};

/// Constants for common probe configurations
pub mod constants {
    use std::time::Duration;

    /// Default HTTP request timeout
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

    /// Default connection timeout for TCP probes
    pub const DEFAULT_TCP_TIMEOUT: Duration = Duration::from_secs(1);

    /// Default SSH connection timeout
    pub const DEFAULT_SSH_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default pause between SSH attempts
    pub const DEFAULT_SSH_DELAY: Duration = Duration::from_secs(1);

    /// Largest CIDR block a port scan will expand
    pub const MAX_CIDR_HOSTS: u64 = 65_536;

    /// Ports scanned when none are given
    pub const COMMON_TCP_PORTS: &[u16] = &[21, 22, 23, 25, 53, 80, 110, 135, 139, 143, 443, 445, 3389];

    /// Ports tried when checking whether a host is up over TCP
    pub const DISCOVERY_PORTS: &[u16] = &[80, 443, 22, 21, 25, 53, 110, 143, 993, 995];
}

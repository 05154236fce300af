//! Common types and utilities for probes

use probeforge_core::Outcome;

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Common probe error types
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeError {
    #[error("Connection timeout")]
    Timeout,

    #[error("Connection refused")]
    ConnectionRefused,

    #[error("Host unreachable")]
    HostUnreachable,

    #[error("Network unreachable")]
    NetworkUnreachable,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    /// Outcome for a probe that could not reach a verdict
    ///
    /// A malformed candidate can never succeed, so it is a hard rejection;
    /// everything else says nothing about the candidate and is transient.
    pub fn into_outcome(self) -> Outcome {
        match self {
            ProbeError::InvalidTarget(target) => {
                Outcome::hard_reject(format!("invalid target {target}"))
            }
            other => Outcome::transient(other.to_string()),
        }
    }

    /// Whether the error is a connect-level failure
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ProbeError::Timeout
                | ProbeError::ConnectionRefused
                | ProbeError::HostUnreachable
                | ProbeError::NetworkUnreachable
        )
    }
}

impl From<io::Error> for ProbeError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => ProbeError::ConnectionRefused,
            io::ErrorKind::TimedOut => ProbeError::Timeout,
            io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied,
            _ => match e.raw_os_error() {
                Some(code) if code == EHOSTUNREACH => ProbeError::HostUnreachable,
                Some(code) if code == ENETUNREACH => ProbeError::NetworkUnreachable,
                _ => ProbeError::IoError(e.to_string()),
            },
        }
    }
}

// `ErrorKind::HostUnreachable` and friends are newer than our MSRV
#[cfg(target_os = "linux")]
const EHOSTUNREACH: i32 = 113;
#[cfg(target_os = "linux")]
const ENETUNREACH: i32 = 101;
#[cfg(not(target_os = "linux"))]
const EHOSTUNREACH: i32 = 65;
#[cfg(not(target_os = "linux"))]
const ENETUNREACH: i32 = 51;

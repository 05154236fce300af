//! Core data types: candidates and probe outcomes

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One unit of probe input: a path, subdomain, `host:port` pair, password or word
///
/// Immutable once produced by a [`CandidateSource`](crate::source::CandidateSource).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    index: usize,
    value: String,
}

impl Candidate {
    /// Create a candidate at the given source position
    pub fn new<S: Into<String>>(index: usize, value: S) -> Self {
        Self {
            index,
            value: value.into(),
        }
    }

    /// Position of this candidate in source order (0-based)
    pub fn index(&self) -> usize {
        self.index
    }

    /// The probe input
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consume the candidate and return its value
    pub fn into_value(self) -> String {
        self.value
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for Candidate {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

/// Probe-specific data carried by a success
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// One-line description of the finding (URL, `user:password`, `hash -> word`)
    pub summary: String,
    /// Protocol status code, if the probe speaks one
    pub status: Option<u16>,
    /// Additional key/value data
    pub metadata: BTreeMap<String, String>,
}

impl Payload {
    /// Create a payload with the given summary
    pub fn new<S: Into<String>>(summary: S) -> Self {
        Self {
            summary: summary.into(),
            ..Default::default()
        }
    }

    /// Attach a status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Result of probing a single candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The candidate qualified
    Success(Payload),
    /// Negative but ambiguous: redirect, auth challenge, unexpected status
    SoftReject { reason: String, detail: String },
    /// Definitive negative protocol response
    HardReject { reason: String },
    /// Infrastructure failure: timeout, refused connection, DNS, probe fault
    TransientError { cause: String },
}

impl Outcome {
    /// Success with a bare summary
    pub fn success<S: Into<String>>(summary: S) -> Self {
        Outcome::Success(Payload::new(summary))
    }

    /// Soft rejection
    pub fn soft_reject<R: Into<String>, D: Into<String>>(reason: R, detail: D) -> Self {
        Outcome::SoftReject {
            reason: reason.into(),
            detail: detail.into(),
        }
    }

    /// Hard rejection
    pub fn hard_reject<R: Into<String>>(reason: R) -> Self {
        Outcome::HardReject {
            reason: reason.into(),
        }
    }

    /// Transient error
    pub fn transient<C: Into<String>>(cause: C) -> Self {
        Outcome::TransientError {
            cause: cause.into(),
        }
    }

    /// Category of this outcome
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) => OutcomeKind::Success,
            Outcome::SoftReject { .. } => OutcomeKind::SoftReject,
            Outcome::HardReject { .. } => OutcomeKind::HardReject,
            Outcome::TransientError { .. } => OutcomeKind::TransientError,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Success payload, if any
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Success(payload) => Some(payload),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(payload) => write!(f, "success: {}", payload.summary),
            Outcome::SoftReject { reason, detail } => write!(f, "{reason}: {detail}"),
            Outcome::HardReject { reason } => write!(f, "rejected: {reason}"),
            Outcome::TransientError { cause } => write!(f, "error: {cause}"),
        }
    }
}

/// Outcome categories tallied in the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    SoftReject,
    HardReject,
    TransientError,
}

impl OutcomeKind {
    /// All categories, in report order
    pub const ALL: [OutcomeKind; 4] = [
        OutcomeKind::Success,
        OutcomeKind::SoftReject,
        OutcomeKind::HardReject,
        OutcomeKind::TransientError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::SoftReject => "soft_reject",
            OutcomeKind::HardReject => "hard_reject",
            OutcomeKind::TransientError => "transient_error",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

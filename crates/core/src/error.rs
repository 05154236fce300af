//! Error types for probeforge core

use thiserror::Error;

/// Result type alias for probeforge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for probeforge operations
///
/// Only construction-time errors ever abort a run. Probe faults are folded
/// into [`Outcome::TransientError`](crate::types::Outcome) and persistence
/// faults are reported once inside the [`Report`](crate::results::Report).
#[derive(Error, Debug)]
pub enum Error {
    /// Candidate source construction errors
    #[error("Candidate source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Durable output errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A run was started twice or driven out of order
    #[error("Invalid run state: {message}")]
    InvalidState { message: String },
}

/// Candidate source errors, raised once at construction and never mid-run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("wordlist is empty{}", path.as_ref().map(|p| format!(": {p}")).unwrap_or_default())]
    EmptyWordlist { path: Option<String> },

    #[error("wordlist {path} cannot be read: {reason}")]
    UnreadableWordlist { path: String, reason: String },

    #[error("invalid extension: {extension:?}")]
    InvalidExtension { extension: String },

    #[error("invalid domain: {domain:?}")]
    InvalidDomain { domain: String },

    #[error("invalid port: {port}")]
    InvalidPort { port: u16 },
}

/// Configuration-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid concurrency setting: {value}")]
    InvalidConcurrency { value: usize },

    #[error("Invalid timeout value: {value}ms")]
    InvalidTimeout { value: u64 },

    #[error("Invalid dispatch delay: {value}ms")]
    InvalidDelay { value: u64 },

    #[error("Configuration file not found: {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },
}

/// Errors writing the durable output destination
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("cannot open output {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("cannot append to output {path}: {reason}")]
    Write { path: String, reason: String },
}

impl Error {
    /// Create a new configuration error
    pub fn config<E: Into<ConfigError>>(error: E) -> Self {
        Error::Config(error.into())
    }

    /// Create a new source error
    pub fn source_error<E: Into<SourceError>>(error: E) -> Self {
        Error::Source(error.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Error::InvalidState {
            message: message.into(),
        }
    }

    /// Check if this error prevents a run from starting
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Error::Source(_) | Error::Config(_))
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Source(_) => "source",
            Error::Config(_) => "config",
            Error::Persistence(_) => "persistence",
            Error::Io(_) => "io",
            Error::InvalidState { .. } => "state",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::config(ConfigError::InvalidFormat {
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        let source_err = Error::source_error(SourceError::EmptyWordlist { path: None });
        assert_eq!(source_err.category(), "source");

        let config_err = Error::config(ConfigError::InvalidConcurrency { value: 0 });
        assert_eq!(config_err.category(), "config");

        let persistence_err = Error::Persistence(PersistenceError::Write {
            path: "out.txt".to_string(),
            reason: "disk full".to_string(),
        });
        assert_eq!(persistence_err.category(), "persistence");
    }

    #[test]
    fn test_construction_errors() {
        assert!(Error::config(ConfigError::InvalidConcurrency { value: 0 }).is_construction_error());
        assert!(Error::source_error(SourceError::InvalidDomain {
            domain: String::new()
        })
        .is_construction_error());
        assert!(!Error::invalid_state("run already done").is_construction_error());
    }

    #[test]
    fn test_error_display() {
        let err = Error::source_error(SourceError::EmptyWordlist {
            path: Some("words.txt".to_string()),
        });
        let display = format!("{}", err);
        assert!(display.contains("Candidate source error"));
        assert!(display.contains("words.txt"));

        let bare = SourceError::EmptyWordlist { path: None }.to_string();
        assert_eq!(bare, "wordlist is empty");
    }
}

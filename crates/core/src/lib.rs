//! # probeforge Core
//!
//! Bounded-concurrency probing engine shared by the probeforge tools.
//! A run expands a wordlist into candidates, hands each candidate to a
//! caller-supplied [`Probe`] from a fixed pool of workers, and aggregates the
//! four-way outcomes into a [`Report`].
//!
//! ## Features
//!
//! - **Candidate expansion**: extensions, domain suffixes and ports, lazily
//! - **Bounded concurrency**: a fixed worker pool, never one task per item
//! - **Global pacing**: one delay shared by the whole pool
//! - **Early exit and cancellation**: in-flight probes drain and are recorded
//! - **Durable output**: successes appended and flushed as they arrive
//!
//! ## Example
//!
//! ```rust,no_run
//! use probeforge_core::{probe_fn, start_run, CandidateSource, Outcome, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = CandidateSource::builder()
//!         .words(["admin", "login"])
//!         .extensions([".php"])
//!         .build()?;
//!     let config = RunConfig::builder().concurrency(10).build();
//!
//!     let probe = probe_fn(|candidate, _timeout| async move {
//!         if candidate.value() == "admin.php" {
//!             Outcome::success(candidate.value())
//!         } else {
//!             Outcome::hard_reject("not_found")
//!         }
//!     });
//!
//!     let report = start_run(config, source, probe).await?;
//!     println!("Found {} hits", report.successes().len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod probe;
pub mod rate_limiter;
pub mod results;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod types;

// Re-export main types
pub use config::{
    Config, LogFormat, LogLevel, LoggingConfig, RunConfig, RunConfigBuilder, RunSettings,
};
pub use controller::{cancel_run, start_run, start_run_blocking, RunController, RunHandle};
pub use error::{ConfigError, Error, PersistenceError, Result, SourceError};
pub use probe::{probe_fn, Probe, ProbeFn};
pub use rate_limiter::DispatchPacer;
pub use results::{Finding, OutcomeCounts, Report, RunSummary, TerminationReason};
pub use scheduler::{RunPhase, RunState};
pub use sink::{
    classify_http_status, sanitize_line, EventCallback, EventEmitter, FileOutput, OutputSink,
    ResultSink, RunEvent,
};
pub use source::{
    load_wordlist, normalize_domain, CandidateSource, CandidateSourceBuilder, SuffixPolicy,
};
pub use types::{Candidate, Outcome, OutcomeKind, Payload};

use std::time::Duration;

/// Current version of the probeforge core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent string for HTTP requests
pub const USER_AGENT: &str = concat!("probeforge/", env!("CARGO_PKG_VERSION"));

/// Default number of workers
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Maximum number of workers
pub const MAX_CONCURRENCY: usize = 10_000;

/// Slack granted past the probe timeout before the engine gives up on a call
pub const PROBE_TIMEOUT_GRACE: Duration = Duration::from_millis(100);

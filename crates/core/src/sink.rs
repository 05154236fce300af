//! Result sink: classification, tallying and durable output
//!
//! [`ResultSink::record`] may be called concurrently from every worker and in
//! any order. Tally updates are serialised behind a single lock so no update
//! is lost. Successes are appended to the output destination before `record`
//! returns; the first write failure is reported once and the sink continues
//! console-only.

use crate::error::PersistenceError;
use crate::results::{Finding, RunSummary, Tally, TerminationReason};
use crate::types::{Candidate, Outcome, Payload};

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Events published while a run progresses
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// Run started
    Started {
        run_id: Uuid,
        total_candidates: usize,
        concurrency: usize,
    },
    /// One candidate was classified
    Outcome {
        candidate: Candidate,
        outcome: Outcome,
    },
    /// Durable output failed; recording continues console-only
    PersistenceDegraded { error: PersistenceError },
    /// Dispatch stopped; in-flight probes are draining
    Draining { reason: TerminationReason },
    /// Run finished
    Finished { summary: RunSummary },
}

/// Event callback type
pub type EventCallback = Arc<dyn Fn(&RunEvent) + Send + Sync>;

/// Optional event callback; events are only built when someone listens
#[derive(Clone, Default)]
pub struct EventEmitter {
    callback: Option<EventCallback>,
}

impl EventEmitter {
    pub fn new(callback: EventCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// Emitter that drops every event
    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit_with<F: FnOnce() -> RunEvent>(&self, build: F) {
        if let Some(callback) = &self.callback {
            callback(&build());
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listening", &self.callback.is_some())
            .finish()
    }
}

/// Append-only, line-oriented result destination
pub trait OutputSink: Send {
    /// Append one line; must be durable when this returns `Ok`
    fn append(&mut self, line: &str) -> Result<(), PersistenceError>;

    /// Human-readable destination name
    fn describe(&self) -> String;
}

/// Append-only UTF-8 file, one result per line
#[derive(Debug)]
pub struct FileOutput {
    path: PathBuf,
    file: File,
}

impl FileOutput {
    /// Open (creating if needed) a file for appending
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PersistenceError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileOutput {
    fn append(&mut self, line: &str) -> Result<(), PersistenceError> {
        let write_err = |e: std::io::Error| PersistenceError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };
        let mut record = sanitize_line(line);
        record.push('\n');
        self.file.write_all(record.as_bytes()).map_err(write_err)?;
        self.file.flush().map_err(write_err)?;
        self.file.sync_data().map_err(write_err)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Strip line breaks so one result always occupies exactly one line
pub fn sanitize_line(line: &str) -> String {
    line.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}

/// Map an HTTP-like status to an outcome
///
/// `target` becomes the success summary; `location` is the redirect target.
pub fn classify_http_status(target: &str, status: u16, location: Option<&str>) -> Outcome {
    match status {
        200 => Outcome::Success(Payload::new(target).with_status(status)),
        301 | 302 | 303 | 307 | 308 => {
            Outcome::soft_reject("redirect", location.unwrap_or("?"))
        }
        401 | 403 => Outcome::soft_reject("auth", status.to_string()),
        404 | 410 => Outcome::hard_reject("not_found"),
        400..=499 => Outcome::hard_reject(format!("status {status}")),
        500..=599 => Outcome::transient(format!("server error {status}")),
        _ => Outcome::soft_reject("status", status.to_string()),
    }
}

/// Concurrent result sink
pub struct ResultSink {
    tally: Mutex<Tally>,
    output: Mutex<Option<Box<dyn OutputSink>>>,
    persistence_error: Mutex<Option<PersistenceError>>,
    events: EventEmitter,
}

impl ResultSink {
    /// Console-only sink
    pub fn new(events: EventEmitter) -> Self {
        Self {
            tally: Mutex::new(Tally::default()),
            output: Mutex::new(None),
            persistence_error: Mutex::new(None),
            events,
        }
    }

    /// Sink appending successes to `output`
    pub fn with_output(events: EventEmitter, output: Box<dyn OutputSink>) -> Self {
        debug!(output = %output.describe(), "Result sink persisting successes");
        let mut sink = Self::new(events);
        *sink.output.get_mut() = Some(output);
        sink
    }

    /// Sink appending to a file; an unopenable file degrades to console-only
    pub fn open(events: EventEmitter, path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::new(events);
        };

        match FileOutput::open(path) {
            Ok(file) => Self::with_output(events, Box::new(file)),
            Err(error) => {
                let mut sink = Self::new(events);
                sink.degrade_at_start(error);
                sink
            }
        }
    }

    /// Classify, tally and persist one outcome
    pub async fn record(&self, candidate: Candidate, outcome: Outcome) {
        trace!(candidate = %candidate, outcome = %outcome, "Outcome recorded");
        self.events.emit_with(|| RunEvent::Outcome {
            candidate: candidate.clone(),
            outcome: outcome.clone(),
        });

        let line = {
            let mut tally = self.tally.lock().await;
            tally
                .record(candidate, outcome)
                .map(|finding: &Finding| finding.output_line().to_string())
        };

        if let Some(line) = line {
            self.persist(&line).await;
        }
    }

    /// Whether successes are still being persisted
    pub async fn is_persisting(&self) -> bool {
        self.output.lock().await.is_some()
    }

    pub(crate) async fn take_tally(&self) -> Tally {
        std::mem::take(&mut *self.tally.lock().await)
    }

    pub(crate) async fn take_persistence_error(&self) -> Option<PersistenceError> {
        self.persistence_error.lock().await.take()
    }

    /// Append on the blocking pool; the output lock stays held so lines
    /// keep their completion order
    async fn persist(&self, line: &str) {
        let mut output = self.output.lock().await;
        let Some(mut destination) = output.take() else {
            return;
        };
        let name = destination.describe();
        let line = line.to_string();

        let written = tokio::task::spawn_blocking(move || {
            let result = destination.append(&line);
            (destination, result)
        })
        .await;

        let error = match written {
            Ok((destination, Ok(()))) => {
                *output = Some(destination);
                return;
            }
            Ok((_, Err(error))) => error,
            Err(join_error) => PersistenceError::Write {
                path: name.clone(),
                reason: join_error.to_string(),
            },
        };
        drop(output);

        warn!(
            output = %name,
            error = %error,
            "Result persistence failed, continuing console-only"
        );
        self.report_degraded(error).await;
    }

    async fn report_degraded(&self, error: PersistenceError) {
        self.events.emit_with(|| RunEvent::PersistenceDegraded {
            error: error.clone(),
        });
        let mut slot = self.persistence_error.lock().await;
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn degrade_at_start(&mut self, error: PersistenceError) {
        warn!(error = %error, "Result output unavailable, continuing console-only");
        self.events.emit_with(|| RunEvent::PersistenceDegraded {
            error: error.clone(),
        });
        *self.persistence_error.get_mut() = Some(error);
    }
}

impl std::fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSink")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

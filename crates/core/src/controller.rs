//! Run controller
//!
//! Owns the lifecycle of one run: `Idle -> Running -> Draining -> Done`.
//! Construction validates everything that can be validated up front; once a
//! run has started it always ends with a [`Report`], whatever individual
//! probes do.

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::probe::Probe;
use crate::results::{Report, TerminationReason};
use crate::scheduler::{Dispatcher, RunPhase, RunState, WorkerPool};
use crate::sink::{EventCallback, EventEmitter, ResultSink, RunEvent};
use crate::source::CandidateSource;

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

/// Handle for observing and cancelling a run from another task
#[derive(Debug, Clone)]
pub struct RunHandle {
    state: Arc<RunState>,
    events: EventEmitter,
}

impl RunHandle {
    /// Request cancellation; in-flight probes still complete and are recorded
    pub fn cancel(&self) {
        if !self.state.is_cancelled() {
            info!("Run cancelled by user request");
        }
        self.state.request_cancel(&self.events);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase()
    }

    pub fn dispatched(&self) -> u64 {
        self.state.dispatched()
    }

    pub fn completed(&self) -> u64 {
        self.state.completed()
    }

    pub fn found_success(&self) -> bool {
        self.state.found_success()
    }
}

/// Cancel the run behind `handle`
pub fn cancel_run(handle: &RunHandle) {
    handle.cancel();
}

/// Single-run controller
#[derive(Debug)]
pub struct RunController {
    config: RunConfig,
    source: CandidateSource,
    state: Arc<RunState>,
    events: EventEmitter,
}

impl RunController {
    /// Validate the configuration and prepare an idle run
    pub fn new(config: RunConfig, source: CandidateSource) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            state: Arc::new(RunState::new()),
            events: EventEmitter::none(),
        })
    }

    /// Subscribe to run events
    pub fn on_event(mut self, callback: EventCallback) -> Self {
        self.events = EventEmitter::new(callback);
        self
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle {
            state: self.state.clone(),
            events: self.events.clone(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.state.phase()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Drive the run to completion
    pub async fn run<P: Probe + 'static>(self, probe: P) -> Result<Report> {
        let RunController {
            config,
            source,
            state,
            events,
        } = self;

        if !state.transition(RunPhase::Idle, RunPhase::Running) {
            return Err(Error::invalid_state(format!(
                "run already {}",
                state.phase()
            )));
        }

        state.mark_started();
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();
        let total_candidates = source.len();

        info!(
            run_id = %run_id,
            phase = %RunPhase::Running,
            elapsed_ms = state.elapsed_ms(),
            candidates = total_candidates,
            concurrency = config.concurrency,
            timeout_ms = config.probe_timeout.map(|t| t.as_millis() as u64),
            delay_ms = config.delay.map(|d| d.as_millis() as u64),
            early_exit = config.early_exit,
            "Starting run"
        );
        events.emit_with(|| RunEvent::Started {
            run_id,
            total_candidates,
            concurrency: config.concurrency,
        });

        // Cancelled before start: nothing gets dispatched
        if let Some(reason) = state.drain_reason() {
            state.enter_draining(reason, &events);
        }

        let sink = Arc::new(ResultSink::open(events.clone(), config.output.as_deref()));
        let dispatcher = Dispatcher::new(source, config.delay, state.clone(), events.clone());
        let pool = WorkerPool::new(
            Arc::new(probe),
            sink.clone(),
            state.clone(),
            events.clone(),
            &config,
        );
        pool.run(dispatcher).await;

        // Workers only stop once a drain reason is set; default covers an
        // empty pool
        let termination = match state.drain_reason() {
            Some(reason) => reason,
            None => {
                state.begin_drain(TerminationReason::Exhausted, &events);
                TerminationReason::Exhausted
            }
        };

        let tally = sink.take_tally().await;
        let persistence_error = sink.take_persistence_error().await;
        let dispatched = state.dispatched();
        let completed = state.completed();
        if dispatched != completed {
            error!(dispatched, completed, "Outcomes missing for dispatched candidates");
        }

        let report = Report {
            run_id,
            started_at,
            finished_at: Utc::now(),
            duration: started.elapsed(),
            total_candidates,
            dispatched,
            completed,
            counts: tally.counts,
            soft_reject_reasons: tally.soft_reject_reasons,
            successes: tally.successes,
            termination,
            persistence_error: persistence_error.map(|e| e.to_string()),
        };
        state.mark_done();

        info!(
            run_id = %run_id,
            phase = %RunPhase::Done,
            elapsed_ms = state.elapsed_ms(),
            termination = %report.termination,
            dispatched = report.dispatched,
            successes = report.counts.success,
            soft_rejects = report.counts.soft_reject,
            hard_rejects = report.counts.hard_reject,
            transient_errors = report.counts.transient_error,
            duration_ms = report.duration.as_millis() as u64,
            "Run completed"
        );
        let summary = report.summary();
        events.emit_with(|| RunEvent::Finished { summary });

        Ok(report)
    }
}

/// Validate, run and report in one call
pub async fn start_run<P: Probe + 'static>(
    config: RunConfig,
    source: CandidateSource,
    probe: P,
) -> Result<Report> {
    RunController::new(config, source)?.run(probe).await
}

/// Blocking entry point for callers without a runtime
pub fn start_run_blocking<P: Probe + 'static>(
    config: RunConfig,
    source: CandidateSource,
    probe: P,
) -> Result<Report> {
    let controller = RunController::new(config, source)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(controller.run(probe))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::probe::probe_fn;
    use crate::types::{Candidate, Outcome, OutcomeKind};
    use std::sync::Mutex;
    use std::time::Duration;

    fn source(words: &[&str]) -> CandidateSource {
        CandidateSource::from_words(words.iter().copied()).unwrap()
    }

    fn config(concurrency: usize) -> RunConfig {
        RunConfig::builder().concurrency(concurrency).build()
    }

    #[test]
    fn test_invalid_concurrency_rejected_before_start() {
        let result = RunController::new(config(0), source(&["a"]));
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidConcurrency { value: 0 }))
        ));
    }

    #[tokio::test]
    async fn test_phases_and_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let controller = RunController::new(config(2), source(&["a", "b", "c"]))
            .unwrap()
            .on_event(Arc::new(move |event: &RunEvent| {
                let name = match event {
                    RunEvent::Started { .. } => "started",
                    RunEvent::Outcome { .. } => "outcome",
                    RunEvent::PersistenceDegraded { .. } => "degraded",
                    RunEvent::Draining { .. } => "draining",
                    RunEvent::Finished { .. } => "finished",
                };
                sink.lock().unwrap().push(name);
            }));
        let handle = controller.handle();
        assert_eq!(handle.phase(), RunPhase::Idle);

        let report = controller
            .run(probe_fn(|_c, _t| async { Outcome::hard_reject("nope") }))
            .await
            .unwrap();

        assert_eq!(handle.phase(), RunPhase::Done);
        assert_eq!(report.termination, TerminationReason::Exhausted);
        assert_eq!(report.count(OutcomeKind::HardReject), 3);

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&"started"));
        assert_eq!(events.last(), Some(&"finished"));
        assert_eq!(events.iter().filter(|e| **e == "outcome").count(), 3);
        assert_eq!(events.iter().filter(|e| **e == "draining").count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_start_dispatches_nothing() {
        let controller = RunController::new(config(4), source(&["a", "b"])).unwrap();
        cancel_run(&controller.handle());
        let report = controller
            .run(probe_fn(|_c, _t| async { Outcome::success("") }))
            .await
            .unwrap();
        assert_eq!(report.dispatched, 0);
        assert_eq!(report.termination, TerminationReason::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_mid_run_records_in_flight() {
        let controller = RunController::new(config(2), source(&["a", "b", "c", "d", "e", "f"]))
            .unwrap();
        let handle = controller.handle();
        let probe = probe_fn(move |candidate: Candidate, _t| {
            let handle = handle.clone();
            async move {
                if candidate.value() == "b" {
                    handle.cancel();
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                Outcome::hard_reject("nope")
            }
        });

        let report = controller.run(probe).await.unwrap();
        assert_eq!(report.termination, TerminationReason::Cancelled);
        assert!(report.dispatched < 6);
        assert_eq!(report.completed, report.dispatched);
        assert_eq!(report.counts.total(), report.dispatched);
    }

    #[test]
    fn test_start_run_blocking() {
        let report = start_run_blocking(
            config(3),
            source(&["x", "y"]),
            probe_fn(|candidate: Candidate, _t| async move {
                Outcome::success(candidate.value())
            }),
        )
        .unwrap();
        assert_eq!(report.counts.success, 2);
        assert_eq!(report.successes().len(), 2);
    }
}

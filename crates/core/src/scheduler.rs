//! Scheduler and worker pool
//!
//! A fixed number of workers pull candidates from one shared [`Dispatcher`].
//! The dispatcher owns the candidate cursor and the pacer behind a single
//! lock, which gives two guarantees at once: candidates are dispatched in
//! source order, and the configured delay spaces dispatches across the whole
//! pool. Candidates are pulled one at a time, never enqueued up front.

use crate::config::RunConfig;
use crate::probe::Probe;
use crate::rate_limiter::DispatchPacer;
use crate::results::TerminationReason;
use crate::sink::{EventEmitter, ResultSink, RunEvent};
use crate::source::CandidateSource;
use crate::types::{Candidate, Outcome};
use crate::PROBE_TIMEOUT_GRACE;

use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

/// Run controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunPhase {
    /// Constructed, not started
    Idle = 0,
    /// Dispatching candidates
    Running = 1,
    /// No new dispatch; in-flight probes finishing
    Draining = 2,
    /// Report finalised
    Done = 3,
}

impl RunPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunPhase::Idle,
            1 => RunPhase::Running,
            2 => RunPhase::Draining,
            _ => RunPhase::Done,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Running => "running",
            RunPhase::Draining => "draining",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Mutable state shared by the controller and every worker of one run
///
/// Workers only read the cancellation flag and set the found-success flag;
/// counters are atomics.
#[derive(Debug)]
pub struct RunState {
    dispatched: AtomicU64,
    completed: AtomicU64,
    found_success: AtomicBool,
    phase: AtomicU8,
    drain_reason: OnceLock<TerminationReason>,
    started: OnceLock<Instant>,
    cancel: CancellationToken,
}

impl RunState {
    pub(crate) fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            found_success: AtomicBool::new(false),
            phase: AtomicU8::new(RunPhase::Idle as u8),
            drain_reason: OnceLock::new(),
            started: OnceLock::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Acquire)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    pub fn found_success(&self) -> bool {
        self.found_success.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Reason dispatch stopped, once it has
    pub fn drain_reason(&self) -> Option<TerminationReason> {
        self.drain_reason.get().copied()
    }

    /// Milliseconds since the run entered `Running`
    pub fn elapsed_ms(&self) -> u64 {
        self.started
            .get()
            .map_or(0, |started| started.elapsed().as_millis() as u64)
    }

    pub(crate) fn mark_started(&self) {
        let _ = self.started.set(Instant::now());
    }

    pub(crate) fn transition(&self, from: RunPhase, to: RunPhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn mark_done(&self) {
        self.phase.store(RunPhase::Done as u8, Ordering::Release);
    }

    /// Stop further dispatch; the first reason wins
    pub(crate) fn begin_drain(&self, reason: TerminationReason, events: &EventEmitter) -> bool {
        if self.drain_reason.set(reason).is_err() {
            return false;
        }
        self.enter_draining(reason, events);
        true
    }

    /// Move a running run to draining if a drain was already requested
    pub(crate) fn enter_draining(&self, reason: TerminationReason, events: &EventEmitter) {
        if self.transition(RunPhase::Running, RunPhase::Draining) {
            info!(
                phase = %RunPhase::Draining,
                reason = %reason,
                elapsed_ms = self.elapsed_ms(),
                dispatched = self.dispatched(),
                completed = self.completed(),
                "Run draining"
            );
            events.emit_with(|| RunEvent::Draining { reason });
        }
    }

    /// External cancellation
    pub(crate) fn request_cancel(&self, events: &EventEmitter) {
        self.begin_drain(TerminationReason::Cancelled, events);
        self.cancel.cancel();
    }

    /// A worker saw a success
    pub(crate) fn record_success(&self, early_exit: bool, events: &EventEmitter) {
        self.found_success.store(true, Ordering::Release);
        if early_exit {
            self.begin_drain(TerminationReason::EarlyExit, events);
            self.cancel.cancel();
        }
    }

    fn record_dispatch(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }
}

struct DispatchQueue {
    source: CandidateSource,
    pacer: Option<DispatchPacer>,
}

/// Shared cursor over the candidate source, with global pacing
pub(crate) struct Dispatcher {
    queue: Mutex<DispatchQueue>,
    state: Arc<RunState>,
    events: EventEmitter,
}

impl Dispatcher {
    pub(crate) fn new(
        source: CandidateSource,
        delay: Option<Duration>,
        state: Arc<RunState>,
        events: EventEmitter,
    ) -> Self {
        Self {
            queue: Mutex::new(DispatchQueue {
                source,
                pacer: delay.map(DispatchPacer::new),
            }),
            state,
            events,
        }
    }

    /// Next candidate to probe, or `None` once the run is draining
    pub(crate) async fn next(&self) -> Option<Candidate> {
        if self.stopped() {
            return None;
        }

        let mut queue = self.queue.lock().await;
        if self.stopped() {
            return None;
        }
        if queue.source.remaining() == 0 {
            self.state
                .begin_drain(TerminationReason::Exhausted, &self.events);
            return None;
        }

        if let Some(pacer) = queue.pacer.as_mut() {
            let slot = pacer.next_slot();
            tokio::select! {
                biased;
                _ = self.state.cancel.cancelled() => {
                    self.stopped();
                    return None;
                }
                _ = sleep_until(slot) => {}
            }
            pacer.mark_dispatched();
        }

        if self.stopped() {
            return None;
        }
        let candidate = queue.source.next_candidate()?;
        let dispatched = self.state.record_dispatch();
        trace!(candidate = %candidate, dispatched, "Candidate dispatched");
        Some(candidate)
    }

    fn stopped(&self) -> bool {
        if self.state.is_cancelled() {
            self.state
                .begin_drain(TerminationReason::Cancelled, &self.events);
            return true;
        }
        false
    }
}

/// Fixed-size pool of workers
pub(crate) struct WorkerPool<P> {
    probe: Arc<P>,
    sink: Arc<ResultSink>,
    state: Arc<RunState>,
    events: EventEmitter,
    concurrency: usize,
    probe_timeout: Option<Duration>,
    early_exit: bool,
}

impl<P: Probe + 'static> WorkerPool<P> {
    pub(crate) fn new(
        probe: Arc<P>,
        sink: Arc<ResultSink>,
        state: Arc<RunState>,
        events: EventEmitter,
        config: &RunConfig,
    ) -> Self {
        Self {
            probe,
            sink,
            state,
            events,
            concurrency: config.concurrency,
            probe_timeout: config.probe_timeout,
            early_exit: config.early_exit,
        }
    }

    /// Run workers until the dispatcher stops handing out candidates and
    /// every in-flight probe has been recorded
    pub(crate) async fn run(self, dispatcher: Dispatcher) {
        let dispatcher = Arc::new(dispatcher);
        let mut tasks = Vec::with_capacity(self.concurrency);

        for worker_id in 0..self.concurrency {
            let worker = Worker {
                id: worker_id,
                dispatcher: dispatcher.clone(),
                probe: self.probe.clone(),
                sink: self.sink.clone(),
                state: self.state.clone(),
                events: self.events.clone(),
                probe_timeout: self.probe_timeout,
                early_exit: self.early_exit,
            };
            tasks.push(tokio::spawn(worker.run()));
        }

        debug!(workers = tasks.len(), "Worker pool started");

        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Worker task failed");
            }
        }
    }
}

struct Worker<P> {
    id: usize,
    dispatcher: Arc<Dispatcher>,
    probe: Arc<P>,
    sink: Arc<ResultSink>,
    state: Arc<RunState>,
    events: EventEmitter,
    probe_timeout: Option<Duration>,
    early_exit: bool,
}

impl<P: Probe> Worker<P> {
    async fn run(self) {
        let mut probed = 0usize;
        while let Some(candidate) = self.dispatcher.next().await {
            let outcome = invoke(self.probe.as_ref(), &candidate, self.probe_timeout).await;
            if outcome.is_success() {
                self.state.record_success(self.early_exit, &self.events);
            }
            self.sink.record(candidate, outcome).await;
            self.state.record_completion();
            probed += 1;
        }
        debug!(worker = self.id, probed, "Worker exiting");
    }
}

/// Call the probe, bounding it by the timeout and folding panics
pub(crate) async fn invoke<P: Probe + ?Sized>(
    probe: &P,
    candidate: &Candidate,
    timeout: Option<Duration>,
) -> Outcome {
    let call = AssertUnwindSafe(probe.probe(candidate, timeout)).catch_unwind();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit + PROBE_TIMEOUT_GRACE, call).await {
            Ok(result) => result,
            Err(_) => {
                return Outcome::transient(format!("timed out after {}ms", limit.as_millis()))
            }
        },
        None => call.await,
    };

    result.unwrap_or_else(|panic| {
        let message = panic_message(panic.as_ref());
        error!(candidate = %candidate, panic = %message, "Probe panicked");
        Outcome::transient(format!("probe fault: {message}"))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::probe_fn;

    fn dispatcher(words: &[&str], delay: Option<Duration>) -> (Dispatcher, Arc<RunState>) {
        let state = Arc::new(RunState::new());
        state.transition(RunPhase::Idle, RunPhase::Running);
        let source = CandidateSource::from_words(words.iter().copied()).unwrap();
        (
            Dispatcher::new(source, delay, state.clone(), EventEmitter::none()),
            state,
        )
    }

    #[tokio::test]
    async fn test_dispatcher_yields_in_order_then_drains() {
        let (dispatcher, state) = dispatcher(&["a", "b", "c"], None);
        let mut seen = Vec::new();
        while let Some(candidate) = dispatcher.next().await {
            seen.push(candidate.into_value());
        }
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert_eq!(state.dispatched(), 3);
        assert_eq!(state.phase(), RunPhase::Draining);
        assert_eq!(state.drain_reason(), Some(TerminationReason::Exhausted));
    }

    #[tokio::test]
    async fn test_dispatcher_stops_on_cancel() {
        let (dispatcher, state) = dispatcher(&["a", "b", "c"], None);
        assert!(dispatcher.next().await.is_some());
        state.request_cancel(&EventEmitter::none());
        assert!(dispatcher.next().await.is_none());
        assert_eq!(state.dispatched(), 1);
        assert_eq!(state.drain_reason(), Some(TerminationReason::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_paced_wait() {
        let (dispatcher, state) = dispatcher(&["a", "b"], Some(Duration::from_secs(3600)));
        assert!(dispatcher.next().await.is_some());

        let canceller = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.request_cancel(&EventEmitter::none());
        });

        let start = tokio::time::Instant::now();
        assert!(dispatcher.next().await.is_none());
        assert!(start.elapsed() < Duration::from_secs(3600));
        assert_eq!(state.dispatched(), 1);
    }

    #[tokio::test]
    async fn test_first_drain_reason_wins() {
        let state = RunState::new();
        state.transition(RunPhase::Idle, RunPhase::Running);
        state.record_success(true, &EventEmitter::none());
        state.request_cancel(&EventEmitter::none());
        assert!(state.found_success());
        assert!(state.is_cancelled());
        assert_eq!(state.drain_reason(), Some(TerminationReason::EarlyExit));
    }

    #[tokio::test]
    async fn test_success_without_early_exit_keeps_running() {
        let state = RunState::new();
        state.transition(RunPhase::Idle, RunPhase::Running);
        state.record_success(false, &EventEmitter::none());
        assert!(state.found_success());
        assert!(!state.is_cancelled());
        assert_eq!(state.phase(), RunPhase::Running);
    }

    #[tokio::test]
    async fn test_invoke_folds_timeout() {
        let probe = probe_fn(|_c, _t| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Outcome::success("late")
        });
        let outcome = invoke(&probe, &Candidate::new(0, "slow"), Some(Duration::from_millis(20))).await;
        assert_eq!(outcome, Outcome::transient("timed out after 20ms"));
    }

    #[tokio::test]
    async fn test_invoke_folds_panic() {
        let probe = probe_fn(|candidate: Candidate, _t| async move {
            if candidate.value() == "boom" {
                panic!("exploded");
            }
            Outcome::hard_reject("no")
        });
        let outcome = invoke(&probe, &Candidate::new(0, "boom"), None).await;
        assert_eq!(outcome, Outcome::transient("probe fault: exploded"));
    }

    #[test]
    fn test_elapsed_counts_from_start() {
        let state = RunState::new();
        assert_eq!(state.elapsed_ms(), 0);
        state.mark_started();
        std::thread::sleep(Duration::from_millis(15));
        assert!(state.elapsed_ms() >= 15);
    }

    #[test]
    fn test_phase_roundtrip() {
        for phase in [RunPhase::Idle, RunPhase::Running, RunPhase::Draining, RunPhase::Done] {
            assert_eq!(RunPhase::from_u8(phase as u8), phase);
        }
        assert_eq!(RunPhase::Draining.to_string(), "draining");
    }
}

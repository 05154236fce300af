//! Run reports for probeforge

use crate::types::{Candidate, Outcome, OutcomeKind, Payload};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Per-category outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub success: u64,
    pub soft_reject: u64,
    pub hard_reject: u64,
    pub transient_error: u64,
}

impl OutcomeCounts {
    /// Count one outcome of the given kind
    pub fn record(&mut self, kind: OutcomeKind) {
        *self.slot(kind) += 1;
    }

    /// Count for one category
    pub fn get(&self, kind: OutcomeKind) -> u64 {
        match kind {
            OutcomeKind::Success => self.success,
            OutcomeKind::SoftReject => self.soft_reject,
            OutcomeKind::HardReject => self.hard_reject,
            OutcomeKind::TransientError => self.transient_error,
        }
    }

    /// Sum over all categories
    pub fn total(&self) -> u64 {
        OutcomeKind::ALL.iter().map(|kind| self.get(*kind)).sum()
    }

    fn slot(&mut self, kind: OutcomeKind) -> &mut u64 {
        match kind {
            OutcomeKind::Success => &mut self.success,
            OutcomeKind::SoftReject => &mut self.soft_reject,
            OutcomeKind::HardReject => &mut self.hard_reject,
            OutcomeKind::TransientError => &mut self.transient_error,
        }
    }
}

/// A recorded success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Candidate that produced the success
    pub candidate: Candidate,
    /// Probe payload
    pub payload: Payload,
    /// Time the sink recorded it
    pub found_at: DateTime<Utc>,
}

impl Finding {
    /// Line written to durable output: the payload summary, or the candidate
    /// when the probe left the summary empty
    pub fn output_line(&self) -> &str {
        if self.payload.summary.is_empty() {
            self.candidate.value()
        } else {
            &self.payload.summary
        }
    }
}

/// Why a run stopped dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Every candidate was dispatched
    Exhausted,
    /// A success was found with early exit enabled
    EarlyExit,
    /// Cancellation was requested from outside the engine
    Cancelled,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Exhausted => f.write_str("candidates exhausted"),
            TerminationReason::EarlyExit => f.write_str("success found"),
            TerminationReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Running aggregate owned by the result sink
#[derive(Debug, Default)]
pub(crate) struct Tally {
    pub(crate) counts: OutcomeCounts,
    pub(crate) soft_reject_reasons: BTreeMap<String, u64>,
    pub(crate) successes: Vec<Finding>,
}

impl Tally {
    pub(crate) fn record(&mut self, candidate: Candidate, outcome: Outcome) -> Option<&Finding> {
        self.counts.record(outcome.kind());
        match outcome {
            Outcome::Success(payload) => {
                self.successes.push(Finding {
                    candidate,
                    payload,
                    found_at: Utc::now(),
                });
                self.successes.last()
            }
            Outcome::SoftReject { reason, .. } => {
                *self.soft_reject_reasons.entry(reason).or_insert(0) += 1;
                None
            }
            Outcome::HardReject { .. } | Outcome::TransientError { .. } => None,
        }
    }
}

/// Final aggregate of one run; read-only once returned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Unique run ID
    pub run_id: Uuid,
    /// Run start time
    pub started_at: DateTime<Utc>,
    /// Run end time
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration
    pub duration: Duration,
    /// Candidates the source could produce
    pub total_candidates: usize,
    /// Candidates handed to a probe
    pub dispatched: u64,
    /// Outcomes recorded
    pub completed: u64,
    /// Per-category counts
    pub counts: OutcomeCounts,
    /// Soft rejections by reason
    pub soft_reject_reasons: BTreeMap<String, u64>,
    /// Every success, in arrival order
    pub successes: Vec<Finding>,
    /// Why dispatch stopped
    pub termination: TerminationReason,
    /// Output error reported during the run, if persistence degraded
    pub persistence_error: Option<String>,
}

impl Report {
    /// Count for one category
    pub fn count(&self, kind: OutcomeKind) -> u64 {
        self.counts.get(kind)
    }

    pub fn successes(&self) -> &[Finding] {
        &self.successes
    }

    /// Fraction of completed probes that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.completed == 0 {
            return 0.0;
        }
        self.counts.success as f64 / self.completed as f64
    }

    /// Dispatched candidates per second
    pub fn dispatch_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.dispatched as f64 / secs
        } else {
            0.0
        }
    }

    /// Compact view used by the finished event
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            counts: self.counts,
            dispatched: self.dispatched,
            completed: self.completed,
            duration: self.duration,
            termination: self.termination,
        }
    }
}

/// Compact run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub counts: OutcomeCounts,
    pub dispatched: u64,
    pub completed: u64,
    pub duration: Duration,
    pub termination: TerminationReason,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut counts = OutcomeCounts::default();
        counts.record(OutcomeKind::Success);
        counts.record(OutcomeKind::TransientError);
        counts.record(OutcomeKind::TransientError);
        assert_eq!(counts.get(OutcomeKind::TransientError), 2);
        assert_eq!(counts.get(OutcomeKind::HardReject), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_tally_records_successes_and_reasons() {
        let mut tally = Tally::default();
        let finding = tally
            .record(Candidate::new(0, "admin"), Outcome::success("http://t/admin"))
            .cloned();
        assert_eq!(finding.unwrap().output_line(), "http://t/admin");

        tally.record(
            Candidate::new(1, "old"),
            Outcome::soft_reject("redirect", "/new"),
        );
        tally.record(
            Candidate::new(2, "private"),
            Outcome::soft_reject("auth", "403"),
        );
        tally.record(
            Candidate::new(3, "moved"),
            Outcome::soft_reject("redirect", "/x"),
        );
        assert!(tally
            .record(Candidate::new(4, "nope"), Outcome::hard_reject("not_found"))
            .is_none());

        assert_eq!(tally.counts.success, 1);
        assert_eq!(tally.counts.soft_reject, 3);
        assert_eq!(tally.counts.hard_reject, 1);
        assert_eq!(tally.soft_reject_reasons.get("redirect"), Some(&2));
        assert_eq!(tally.soft_reject_reasons.get("auth"), Some(&1));
        assert_eq!(tally.successes.len(), 1);
    }

    #[test]
    fn test_output_line_falls_back_to_candidate() {
        let finding = Finding {
            candidate: Candidate::new(0, "hunter2"),
            payload: Payload::default(),
            found_at: Utc::now(),
        };
        assert_eq!(finding.output_line(), "hunter2");
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(TerminationReason::EarlyExit.to_string(), "success found");
        assert_eq!(TerminationReason::Cancelled.to_string(), "cancelled");
    }
}

//! The probe capability seam
//!
//! Everything that touches the outside world (HTTP, TCP, SSH, digests) sits
//! behind [`Probe`]. Implementations must be safe to call from many workers
//! at once and should fold their own faults into
//! [`Outcome::TransientError`]; the engine additionally bounds each call by
//! the configured timeout and catches panics.

use crate::types::{Candidate, Outcome};

use std::future::Future;
use std::time::Duration;

/// A function from candidate to outcome
pub trait Probe: Send + Sync {
    /// Probe one candidate, returning within `timeout` when one is given
    fn probe(
        &self,
        candidate: &Candidate,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Outcome> + Send;
}

/// Adapter turning an async closure into a [`Probe`]
#[derive(Debug, Clone)]
pub struct ProbeFn<F> {
    f: F,
}

/// Wrap `f` as a probe
///
/// ```rust
/// use probeforge_core::{probe_fn, Outcome};
///
/// let probe = probe_fn(|candidate, _timeout| async move {
///     if candidate.value() == "secret" {
///         Outcome::success(candidate.value())
///     } else {
///         Outcome::hard_reject("mismatch")
///     }
/// });
/// # let _ = probe;
/// ```
pub fn probe_fn<F, Fut>(f: F) -> ProbeFn<F>
where
    F: Fn(Candidate, Option<Duration>) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send,
{
    ProbeFn { f }
}

impl<F, Fut> Probe for ProbeFn<F>
where
    F: Fn(Candidate, Option<Duration>) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome> + Send,
{
    fn probe(
        &self,
        candidate: &Candidate,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Outcome> + Send {
        (self.f)(candidate.clone(), timeout)
    }
}

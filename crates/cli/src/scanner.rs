//! CLI run driver: progress, console streaming and Ctrl-C handling

use anyhow::Result;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use probeforge_core::{
    CandidateSource, OutcomeKind, Probe, Report, RunConfig, RunController, RunEvent,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tracing::{debug, warn};

use crate::{
    output::{ConsoleRenderer, SuccessStyle},
    Cli, EngineArgs,
};

/// Console options for one run
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub renderer: ConsoleRenderer,
    pub progress: bool,
}

impl RunOptions {
    pub fn new(cli: &Cli, engine: &EngineArgs, style: SuccessStyle) -> Self {
        Self {
            renderer: ConsoleRenderer::new(style, cli.verbose, cli.quiet),
            progress: !cli.quiet && !engine.no_progress,
        }
    }
}

/// Live counters shown next to the progress bar
#[derive(Debug, Default)]
pub struct RunStats {
    pub successes: AtomicUsize,
    pub errors: AtomicUsize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Success => {
                self.successes.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::TransientError => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::SoftReject | OutcomeKind::HardReject => {}
        }
    }

    pub fn message(&self) -> String {
        format!(
            "found {} | errors {}",
            self.successes.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed)
        )
    }
}

fn progress_bar(total: usize, enabled: bool) -> Result<ProgressBar> {
    if !enabled {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Run `probe` over `source`, streaming results to the console
///
/// Ctrl-C cancels the run; in-flight probes finish and are reported.
pub async fn execute<P: Probe + 'static>(
    options: RunOptions,
    config: RunConfig,
    source: CandidateSource,
    probe: P,
) -> Result<Report> {
    let pb = progress_bar(source.len(), options.progress)?;
    let stats = Arc::new(RunStats::new());

    let callback = {
        let pb = pb.clone();
        let stats = stats.clone();
        let renderer = options.renderer;
        Arc::new(move |event: &RunEvent| {
            if let RunEvent::Outcome { outcome, .. } = event {
                stats.record(outcome.kind());
                pb.inc(1);
                pb.set_message(stats.message());
            }
            if let Some(line) = renderer.render(event) {
                if pb.is_hidden() {
                    println!("{}", line);
                } else {
                    pb.println(line);
                }
            }
        })
    };

    let controller = RunController::new(config, source)?.on_event(callback);
    let handle = controller.handle();

    let interrupt = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, cancelling run");
                handle.cancel();
            }
            Err(e) => debug!("Ctrl-C handler unavailable: {}", e),
        }
    });

    let result = controller.run(probe).await;
    interrupt.abort();

    match &result {
        Ok(report) => pb.finish_with_message(format!(
            "{} ({})",
            stats.message(),
            report.termination
        )),
        Err(_) => pb.abandon_with_message("run failed".red().to_string()),
    }

    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use probeforge_core::{probe_fn, Candidate, Outcome};

    #[test]
    fn test_run_stats() {
        let stats = RunStats::new();
        stats.record(OutcomeKind::Success);
        stats.record(OutcomeKind::TransientError);
        stats.record(OutcomeKind::HardReject);
        assert_eq!(stats.message(), "found 1 | errors 1");
    }

    #[tokio::test]
    async fn test_execute_without_progress() {
        let options = RunOptions {
            renderer: ConsoleRenderer::new(SuccessStyle::Found, 0, true),
            progress: false,
        };
        let source = CandidateSource::from_words(["a", "b", "c"]).unwrap();
        let probe = probe_fn(|candidate: Candidate, _t| async move {
            if candidate.value() == "b" {
                Outcome::success("b")
            } else {
                Outcome::hard_reject("not_found")
            }
        });

        let report = execute(options, RunConfig::default(), source, probe)
            .await
            .unwrap();
        assert_eq!(report.successes().len(), 1);
        assert_eq!(report.completed, 3);
    }
}

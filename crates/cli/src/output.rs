//! Console rendering and report output

use anyhow::{Context, Result};
use colored::*;
use probeforge_core::{Candidate, Outcome, Report, RunEvent, TerminationReason};
use probeforge_probes::HashAnalysis;
use std::path::Path;

use crate::{utils, Cli, EngineArgs};

/// How a success line is worded for each tool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessStyle {
    /// HTTP hit
    Found,
    /// Open port
    Open,
    /// Host answered discovery
    Alive,
    /// Cracked hash
    Cracked,
    /// Working credentials
    Login,
}

/// Turns run events into console lines
#[derive(Debug, Clone, Copy)]
pub struct ConsoleRenderer {
    style: SuccessStyle,
    verbosity: u8,
    quiet: bool,
}

impl ConsoleRenderer {
    pub fn new(style: SuccessStyle, verbosity: u8, quiet: bool) -> Self {
        Self {
            style,
            verbosity,
            quiet,
        }
    }

    /// Line for one event, if it should be shown at the current verbosity
    pub fn render(&self, event: &RunEvent) -> Option<String> {
        match event {
            RunEvent::Outcome { candidate, outcome } => self.render_outcome(candidate, outcome),
            RunEvent::PersistenceDegraded { error } => Some(
                format!("[!] Output disabled, continuing console-only: {}", error)
                    .yellow()
                    .to_string(),
            ),
            RunEvent::Draining {
                reason: TerminationReason::Cancelled,
            } if !self.quiet => Some(
                "[!] Interrupted, waiting for in-flight probes"
                    .yellow()
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn render_outcome(&self, candidate: &Candidate, outcome: &Outcome) -> Option<String> {
        match outcome {
            Outcome::Success(payload) => {
                let line = match self.style {
                    SuccessStyle::Found => match payload.status {
                        Some(code) => format!("[+] Found: {} (Code: {})", payload.summary, code),
                        None => format!("[+] Found: {}", payload.summary),
                    },
                    SuccessStyle::Open => format!("[+] {}", payload.summary),
                    SuccessStyle::Alive => format!("[+] Host {} available", payload.summary),
                    SuccessStyle::Cracked => format!("\n[+] CRACKED: {}", payload.summary),
                    SuccessStyle::Login => format!("[+] SUCCESS! {}", payload.summary),
                };
                Some(line.green().to_string())
            }
            _ if self.quiet => None,
            Outcome::SoftReject { reason, detail } => match (reason.as_str(), detail.as_str()) {
                ("redirect", location) => Some(
                    format!("[→] Redirect: {} → {}", candidate, location)
                        .yellow()
                        .to_string(),
                ),
                ("auth", "401") => Some(
                    format!("[!] Unauthorized: {} (Code: 401)", candidate)
                        .blue()
                        .to_string(),
                ),
                ("auth", code) => Some(
                    format!("[!] Forbidden: {} (Code: {})", candidate, code)
                        .red()
                        .to_string(),
                ),
                (_, code) if self.verbosity >= 1 => {
                    Some(format!("[?] {} (Code: {})", candidate, code))
                }
                _ => None,
            },
            Outcome::TransientError { cause } if self.verbosity >= 1 => Some(
                format!("[x] Error checking {}: {}", candidate, cause)
                    .red()
                    .to_string(),
            ),
            Outcome::HardReject { reason } if self.verbosity >= 2 => {
                Some(format!("[-] {}: {}", candidate, reason).dimmed().to_string())
            }
            _ => None,
        }
    }
}

/// Print the `[•]` header lines that open every run
pub fn print_banner(cli: &Cli, fields: &[(&str, String)]) {
    if cli.quiet {
        return;
    }
    for (index, (label, value)) in fields.iter().enumerate() {
        let prefix = if index == 0 { "\n[•]" } else { "[•]" };
        let line = if value.is_empty() {
            format!("{} {}", prefix, label)
        } else {
            format!("{} {}: {}", prefix, label, value)
        };
        println!("{}", line.cyan());
    }
}

/// Run summary block
pub fn format_summary(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", "Run Summary:".bold()));
    out.push_str(&format!(
        "{}: {} of {} ({})\n",
        "Candidates probed".cyan(),
        report.completed,
        report.total_candidates,
        report.termination
    ));
    out.push_str(&format!("{}: {}\n", "Successes".green(), report.counts.success));
    out.push_str(&format!("{}: {}\n", "Soft rejects".yellow(), report.counts.soft_reject));
    for (reason, count) in &report.soft_reject_reasons {
        out.push_str(&format!("  {}: {}\n", reason, count));
    }
    out.push_str(&format!("{}: {}\n", "Hard rejects".normal(), report.counts.hard_reject));
    out.push_str(&format!("{}: {}\n", "Errors".red(), report.counts.transient_error));
    out.push_str(&format!(
        "{}: {} ({:.1}/s)",
        "Time elapsed".cyan(),
        utils::format_duration(report.duration),
        report.dispatch_rate()
    ));
    if let Some(error) = &report.persistence_error {
        out.push_str(&format!("\n{}: {}", "Output error".red(), error));
    }
    out
}

/// Write the report as pretty JSON
pub fn write_json_report(path: &Path, report: &Report) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

/// Close a run: summary, optional JSON report, completion line
pub fn finish(cli: &Cli, engine: &EngineArgs, report: &Report, message: &str) -> Result<()> {
    if let Some(path) = &engine.json {
        write_json_report(path, report)?;
    }
    if !cli.quiet {
        if cli.verbose > 0 {
            println!("{}", format_summary(report));
        }
        println!("{}", format!("\n[•] {}", message).cyan());
    }
    Ok(())
}

/// Print hash identification results
pub fn print_hash_analysis(analysis: &HashAnalysis, verbose: bool) {
    if verbose {
        println!("{}", "\n[•] Detailed hash analysis:".cyan());
        println!("Hash length: {} characters", analysis.length);
        println!(
            "Characters: {}",
            if analysis.hex_only { "Hex only" } else { "Mixed" }
        );
    }

    if analysis.is_identified() {
        println!("{}", "\n[+] Possible hash types:".green());
        for name in &analysis.candidates {
            println!("- {}", name);
        }
    } else {
        println!("{}", "\n[!] Failed to identify hash type".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probeforge_core::{OutcomeCounts, Payload};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn outcome_event(value: &str, outcome: Outcome) -> RunEvent {
        RunEvent::Outcome {
            candidate: Candidate::new(0, value),
            outcome,
        }
    }

    #[test]
    fn test_render_success_styles() {
        colored::control::set_override(false);
        let found = ConsoleRenderer::new(SuccessStyle::Found, 0, false);
        let event = outcome_event(
            "admin",
            Outcome::Success(Payload::new("http://t/admin").with_status(200)),
        );
        assert_eq!(
            found.render(&event).unwrap(),
            "[+] Found: http://t/admin (Code: 200)"
        );

        let cracked = ConsoleRenderer::new(SuccessStyle::Cracked, 0, true);
        let event = outcome_event("password", Outcome::success("abc -> password"));
        assert_eq!(cracked.render(&event).unwrap(), "\n[+] CRACKED: abc -> password");

        let alive = ConsoleRenderer::new(SuccessStyle::Alive, 0, false);
        let event = outcome_event("10.0.0.5", Outcome::success("10.0.0.5"));
        assert_eq!(alive.render(&event).unwrap(), "[+] Host 10.0.0.5 available");
    }

    #[test]
    fn test_render_respects_verbosity() {
        colored::control::set_override(false);
        let quiet = ConsoleRenderer::new(SuccessStyle::Found, 0, true);
        let normal = ConsoleRenderer::new(SuccessStyle::Found, 0, false);
        let verbose = ConsoleRenderer::new(SuccessStyle::Found, 2, false);

        let redirect = outcome_event("old", Outcome::soft_reject("redirect", "/new"));
        assert!(quiet.render(&redirect).is_none());
        assert_eq!(normal.render(&redirect).unwrap(), "[→] Redirect: old → /new");

        let forbidden = outcome_event("secret", Outcome::soft_reject("auth", "403"));
        assert_eq!(
            normal.render(&forbidden).unwrap(),
            "[!] Forbidden: secret (Code: 403)"
        );

        let error = outcome_event("x", Outcome::transient("timeout"));
        assert!(normal.render(&error).is_none());
        assert_eq!(verbose.render(&error).unwrap(), "[x] Error checking x: timeout");

        let miss = outcome_event("x", Outcome::hard_reject("not_found"));
        assert!(normal.render(&miss).is_none());
        assert!(verbose.render(&miss).is_some());
    }

    fn report() -> Report {
        let now = chrono::Utc::now();
        Report {
            run_id: uuid::Uuid::nil(),
            started_at: now,
            finished_at: now,
            duration: Duration::from_millis(1500),
            total_candidates: 10,
            dispatched: 10,
            completed: 10,
            counts: OutcomeCounts {
                success: 1,
                soft_reject: 2,
                hard_reject: 6,
                transient_error: 1,
            },
            soft_reject_reasons: BTreeMap::from([("redirect".to_string(), 2)]),
            successes: Vec::new(),
            termination: TerminationReason::Exhausted,
            persistence_error: None,
        }
    }

    #[test]
    fn test_format_summary() {
        colored::control::set_override(false);
        let summary = format_summary(&report());
        assert!(summary.contains("Candidates probed: 10 of 10 (candidates exhausted)"));
        assert!(summary.contains("  redirect: 2"));
        assert!(summary.contains("Errors: 1"));
    }

    #[test]
    fn test_write_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json_report(&path, &report()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["completed"], 10);
        assert_eq!(value["termination"], "exhausted");
    }
}

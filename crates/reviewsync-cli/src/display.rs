//! Plain-text rendering of import results.
//!
//! One line per record, then a failure section with the per-stage outcomes
//! of every record that did not make it, then the totals.

use std::fmt::Write;

use reviewsync_core::Outcome;
use reviewsync_sync::{BatchSummary, FinalOutcome, RecordReport};

const LABEL_WIDTH: usize = 12;

// ── Public API ──

pub fn render_summary(summary: &BatchSummary, dry_run: bool) -> String {
    let mut out = String::new();
    let mode = if dry_run { "dry run" } else { "import" };
    let _ = writeln!(out, "=== Review {mode} ===");

    for (index, report) in summary.reports.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}", index + 1, record_line(report));
    }

    if summary.failed() > 0 {
        let _ = writeln!(out);
        let _ = writeln!(out, "Failures");
        for report in summary.failures() {
            render_failure(&mut out, report);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Succeeded: {} / {}",
        summary.succeeded(),
        summary.processed()
    );
    out
}

pub fn print_summary(summary: &BatchSummary, dry_run: bool) {
    print!("{}", render_summary(summary, dry_run));
}

// ── Record rendering ──

fn record_line(report: &RecordReport) -> String {
    let verdict = match &report.outcome {
        FinalOutcome::Success => match report.verified_status {
            Some(status) => format!("ok ({status})"),
            None => "ok".to_string(),
        },
        FinalOutcome::Failure(failure) => failure.to_string(),
    };
    format!(
        "paper #{} {}: {verdict}",
        report.paper_id, report.reviewer_email
    )
}

fn render_failure(out: &mut String, report: &RecordReport) {
    let _ = writeln!(out, "  paper #{} {}", report.paper_id, report.reviewer_email);
    let stages = [
        ("assignment", &report.assignment),
        ("acceptance", &report.acceptance),
        ("submission", &report.submission),
    ];
    for (label, outcome) in stages {
        if let Some(outcome) = outcome {
            let _ = writeln!(out, "    {label:<LABEL_WIDTH$} {outcome}");
            render_messages(out, outcome);
        }
    }
    if let Some(status) = report.verified_status {
        let _ = writeln!(out, "    {:<LABEL_WIDTH$} {status}", "status");
    }
}

fn render_messages(out: &mut String, outcome: &Outcome) {
    for message in outcome.messages() {
        let _ = writeln!(out, "    {:<LABEL_WIDTH$}   - {message}", "");
    }
}

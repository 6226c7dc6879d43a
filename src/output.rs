//! CLI output formatting for all pipeline stages.
//!
//! # Output Format
//!
//! ## Classification
//!
//! ```text
//! warning: photos/missing.jpg: media file is missing
//! warning: b/x.jpg: destination /tmp/.../x.jpg is already produced from a/x.jpg, skipping
//! 12 jobs: 4 copies, 8 conversions (3 already done)
//! ```
//!
//! ## Execution
//!
//! ```text
//! ==> Copying 4 files
//! ==> Converting 8 files
//! ⠙ [00:00:12] [##########--------] 7/12 (58%) dawn_thumb.jpg
//! ```
//!
//! ## Summary
//!
//! ```text
//! Copied 4, converted 6, skipped 0, failed 2
//!
//! There were errors:
//!   a.gif -> /tmp/media-batch-holiday/a_thumb.jpg
//!     convert exited with exit status: 1: convert: improper image header
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects. The progress bar lives on its own printer thread
//! fed by executor events.

use crate::execute::{BatchReport, ExecEvent, Phase};
use crate::types::{JobBatch, Warning};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

// ============================================================================
// Classification
// ============================================================================

pub fn format_warnings(warnings: &[Warning]) -> Vec<String> {
    warnings.iter().map(|w| format!("warning: {w}")).collect()
}

pub fn print_warnings(warnings: &[Warning]) {
    for line in format_warnings(warnings) {
        eprintln!("{line}");
    }
}

/// One-line overview of a classified batch.
pub fn format_plan(batch: &JobBatch, satisfied: usize) -> Vec<String> {
    let conversions = batch.conversion_count();
    let copies = batch.len() - conversions;
    let mut line = format!(
        "{}: {}, {}",
        plural(batch.len(), "job", "jobs"),
        plural(copies, "copy", "copies"),
        plural(conversions, "conversion", "conversions")
    );
    if satisfied > 0 {
        line.push_str(&format!(" ({satisfied} already done)"));
    }
    vec![line]
}

pub fn print_plan(batch: &JobBatch, satisfied: usize) {
    for line in format_plan(batch, satisfied) {
        println!("{line}");
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Line printed above the progress bar for an event, if any.
pub fn format_exec_event(event: &ExecEvent) -> Option<String> {
    match event {
        ExecEvent::PhaseStarted { phase, jobs } => {
            let verb = match phase {
                Phase::Copy => "Copying",
                Phase::Convert => "Converting",
            };
            Some(format!("==> {verb} {}", plural(*jobs, "file", "files")))
        }
        ExecEvent::JobFailed { job, message } => Some(format!(
            "failed: {} -> {}: {message}",
            job.source.display(),
            file_name(&job.destination)
        )),
        ExecEvent::JobFinished { .. } | ExecEvent::JobSkipped { .. } => None,
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

fn drive_progress(rx: Receiver<ExecEvent>, pb: ProgressBar) {
    for event in rx {
        if let Some(line) = format_exec_event(&event) {
            pb.println(line);
        }
        match &event {
            ExecEvent::PhaseStarted { .. } => {}
            ExecEvent::JobFinished { job } => {
                pb.set_message(file_name(&job.destination));
                pb.inc(1);
            }
            ExecEvent::JobSkipped { .. } | ExecEvent::JobFailed { .. } => pb.inc(1),
        }
    }
    pb.finish_and_clear();
}

/// Start a printer thread showing a progress bar for `total` jobs.
///
/// Drop the sender (the executor does when it returns) and join the handle
/// to wait for the bar to clear.
pub fn spawn_progress(total: usize) -> (Sender<ExecEvent>, JoinHandle<()>) {
    let (tx, rx) = channel();
    let pb = create_progress_bar(total as u64);
    let handle = std::thread::spawn(move || drive_progress(rx, pb));
    (tx, handle)
}

// ============================================================================
// Summary
// ============================================================================

pub fn format_summary(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Copied {}, converted {}, skipped {}, failed {}",
        report.copied, report.converted, report.skipped, report.failed
    )];
    if report.not_run > 0 {
        lines.push(format!("Not started: {}", report.not_run));
    }
    if !report.errors.is_empty() {
        lines.push(String::new());
        lines.push("There were errors:".to_string());
        for error in &report.errors {
            lines.push(format!(
                "  {} -> {}",
                error.source.display(),
                error.destination.display()
            ));
            for message_line in error.message.lines() {
                lines.push(format!("    {message_line}"));
            }
        }
    }
    if report.is_cancelled() {
        lines.push("Cancelled".to_string());
    }
    lines
}

pub fn print_summary(report: &BatchReport) {
    for line in format_summary(report) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::{JobError, Outcome};
    use crate::types::{Job, JobKind};
    use std::path::PathBuf;

    fn report(outcome: Outcome, errors: Vec<JobError>) -> BatchReport {
        BatchReport {
            total: 10,
            copied: 2,
            converted: 5,
            skipped: 1,
            failed: errors.len(),
            not_run: 2 - errors.len().min(2),
            errors,
            outcome,
        }
    }

    #[test]
    fn warnings_are_prefixed() {
        let lines = format_warnings(&[Warning::new("a.jpg", "media file is missing")]);
        assert_eq!(lines, vec!["warning: a.jpg: media file is missing"]);
    }

    #[test]
    fn plan_counts_copies_and_conversions() {
        let batch = JobBatch {
            jobs: vec![
                Job::new("a.mp4", "o/a.mp4", JobKind::Copy),
                Job::new(
                    "a.mp4",
                    "o/a_thumb.jpg",
                    JobKind::VideoThumbnail {
                        size: 100,
                        quality: 90,
                        play_overlay: true,
                    },
                ),
            ],
        };
        assert_eq!(
            format_plan(&batch, 0),
            vec!["2 jobs: 1 copy, 1 conversion"]
        );
        assert_eq!(
            format_plan(&batch, 2),
            vec!["2 jobs: 1 copy, 1 conversion (2 already done)"]
        );
    }

    #[test]
    fn phase_header_and_failure_lines() {
        let header = format_exec_event(&ExecEvent::PhaseStarted {
            phase: Phase::Convert,
            jobs: 3,
        });
        assert_eq!(header.as_deref(), Some("==> Converting 3 files"));

        let failed = format_exec_event(&ExecEvent::JobFailed {
            job: Job::new("/in/a.gif", "/w/a_thumb.jpg", JobKind::Copy),
            message: "boom".into(),
        });
        assert_eq!(failed.as_deref(), Some("failed: /in/a.gif -> a_thumb.jpg: boom"));

        let finished = format_exec_event(&ExecEvent::JobFinished {
            job: Job::new("a", "b", JobKind::Copy),
        });
        assert_eq!(finished, None);
    }

    #[test]
    fn summary_lists_errors_verbatim() {
        let lines = format_summary(&report(
            Outcome::Completed,
            vec![JobError {
                source: PathBuf::from("/in/a.gif"),
                destination: PathBuf::from("/w/a_thumb.jpg"),
                message: "convert: bad header\nsecond line".into(),
            }],
        ));
        assert_eq!(lines[0], "Copied 2, converted 5, skipped 1, failed 1");
        assert!(lines.contains(&"There were errors:".to_string()));
        assert!(lines.contains(&"  /in/a.gif -> /w/a_thumb.jpg".to_string()));
        assert!(lines.contains(&"    second line".to_string()));
        assert!(!lines.contains(&"Cancelled".to_string()));
    }

    #[test]
    fn cancelled_summary_ends_with_cancelled() {
        let lines = format_summary(&report(Outcome::Cancelled, vec![]));
        assert_eq!(lines.last().map(String::as_str), Some("Cancelled"));
        assert!(lines.contains(&"Not started: 2".to_string()));
    }
}

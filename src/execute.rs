//! Job execution.
//!
//! Runs a [`JobBatch`] in two phases: all copy jobs first, sequentially,
//! since they are I/O-bound; then all conversion jobs on a [`TaskPool`]
//! chosen once per run. Every job makes exactly one converter call or one
//! filesystem copy, writes through [`crate::staging`], and reports back
//! through a shared [`Progress`].
//!
//! ## Failure and cancellation
//!
//! A failing job is recorded as a [`JobError`] and the batch continues.
//! Cancellation stops dispatching new jobs; jobs already running finish and
//! their outputs stay. The run then reports [`Outcome::Cancelled`], which is
//! not an error.
//!
//! ## Progress events
//!
//! When a channel is supplied, an [`ExecEvent`] is sent after each job so a
//! printer thread can drive a progress display.

use crate::convert::{Converter, convert_job};
use crate::staging::{Staging, copy_into_place, promote};
use crate::types::{Job, JobBatch};
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("Cannot create staging directory: {0}")]
    Staging(std::io::Error),
    #[error("Cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// How conversions are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolMode {
    /// One at a time, in batch order.
    Sequential,
    /// Bounded worker pool.
    Parallel(NonZeroUsize),
}

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Re-run jobs whose destination already exists.
    pub overwrite: bool,
    pub mode: PoolMode,
    /// Parent of the per-run staging directory; system temp when `None`.
    pub staging_dir: Option<PathBuf>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            mode: PoolMode::Sequential,
            staging_dir: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Copy,
    Convert,
}

/// Emitted after each step of a run.
#[derive(Debug, Clone)]
pub enum ExecEvent {
    PhaseStarted { phase: Phase, jobs: usize },
    JobFinished { job: Job },
    JobSkipped { job: Job },
    JobFailed { job: Job, message: String },
}

/// A job that failed, with the converter's or filesystem's message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct JobError {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Cancelled,
}

/// Final summary of a run.
///
/// `copied + converted + skipped + failed + not_run == total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub copied: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Jobs never dispatched because the run was cancelled.
    pub not_run: usize,
    /// Sorted by source, then destination.
    pub errors: Vec<JobError>,
    pub outcome: Outcome,
}

impl BatchReport {
    pub fn is_cancelled(&self) -> bool {
        self.outcome == Outcome::Cancelled
    }
}

/// Counters shared by all workers.
#[derive(Debug, Default)]
pub struct Progress {
    pub total: usize,
    dispatched: AtomicUsize,
    completed: AtomicUsize,
    copied: AtomicUsize,
    converted: AtomicUsize,
    errors: Mutex<Vec<JobError>>,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    fn dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
    }

    fn succeeded(&self, copy: bool) {
        if copy {
            self.copied.fetch_add(1, Ordering::SeqCst);
        } else {
            self.converted.fetch_add(1, Ordering::SeqCst);
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn failed(&self, job: &Job, message: String) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(JobError {
                source: job.source.clone(),
                destination: job.destination.clone(),
                message,
            });
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// `Cancelled` only when some pending job was never dispatched; a
    /// signal that arrives during the last job leaves a complete run.
    fn into_report(self, skipped: usize) -> BatchReport {
        let mut errors = self
            .errors
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        errors.sort();
        let dispatched = self.dispatched.into_inner();
        let not_run = (self.total - skipped).saturating_sub(dispatched);
        BatchReport {
            total: self.total,
            copied: self.copied.into_inner(),
            converted: self.converted.into_inner(),
            skipped,
            failed: errors.len(),
            not_run,
            errors,
            outcome: if not_run > 0 {
                Outcome::Cancelled
            } else {
                Outcome::Completed
            },
        }
    }
}

/// Runs `count` indexed tasks and returns when all have returned.
pub trait TaskPool {
    fn run_all(&self, count: usize, task: &(dyn Fn(usize) + Sync));
}

/// Runs tasks on the calling thread in index order.
pub struct SequentialPool;

impl TaskPool for SequentialPool {
    fn run_all(&self, count: usize, task: &(dyn Fn(usize) + Sync)) {
        (0..count).for_each(task);
    }
}

/// Runs tasks on a dedicated rayon pool of fixed size.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: NonZeroUsize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.get())
            .thread_name(|i| format!("media-batch-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }
}

impl TaskPool for WorkerPool {
    fn run_all(&self, count: usize, task: &(dyn Fn(usize) + Sync)) {
        use rayon::prelude::*;
        self.pool
            .install(|| (0..count).into_par_iter().with_max_len(1).for_each(task));
    }
}

fn make_pool(mode: PoolMode) -> Result<Box<dyn TaskPool>, ExecuteError> {
    Ok(match mode {
        PoolMode::Sequential => Box::new(SequentialPool),
        PoolMode::Parallel(workers) => Box::new(WorkerPool::new(workers)?),
    })
}

fn emit(events: Option<&Sender<ExecEvent>>, event: ExecEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

fn record(
    progress: &Progress,
    events: Option<&Sender<ExecEvent>>,
    job: &Job,
    result: Result<(), String>,
) {
    match result {
        Ok(()) => {
            progress.succeeded(job.kind.is_copy());
            emit(events, ExecEvent::JobFinished { job: job.clone() });
        }
        Err(message) => {
            tracing::debug!(source = %job.source.display(), %message, "job failed");
            progress.failed(job, message.clone());
            emit(
                events,
                ExecEvent::JobFailed {
                    job: job.clone(),
                    message,
                },
            );
        }
    }
}

fn run_conversion(converter: &dyn Converter, staging: &Staging, job: &Job) -> Result<(), String> {
    let staged = staging.path_for(&job.destination);
    let result = convert_job(converter, job, &staged)
        .map_err(|e| e.to_string())
        .and_then(|()| {
            if staged.is_file() {
                Ok(())
            } else {
                Err("converter reported success but wrote no output".to_string())
            }
        })
        .and_then(|()| {
            promote(&staged, &job.destination)
                .map_err(|e| format!("cannot move output into place: {e}"))
        });
    if result.is_err() {
        let _ = std::fs::remove_file(&staged);
    }
    result
}

/// Run a batch to completion or cancellation.
///
/// Only setup problems (staging directory, worker pool) are errors; job
/// failures end up in the report.
pub fn execute(
    batch: &JobBatch,
    converter: &dyn Converter,
    options: &ExecuteOptions,
    cancel: &CancellationToken,
    events: Option<Sender<ExecEvent>>,
) -> Result<BatchReport, ExecuteError> {
    let events = events.as_ref();
    let progress = Progress::new(batch.len());

    let (pending, satisfied): (Vec<&Job>, Vec<&Job>) = batch
        .jobs
        .iter()
        .partition(|job| options.overwrite || !job.is_satisfied());
    for job in &satisfied {
        emit(events, ExecEvent::JobSkipped { job: (*job).clone() });
    }
    let skipped = satisfied.len();

    let (copies, conversions): (Vec<&Job>, Vec<&Job>) =
        pending.into_iter().partition(|job| job.kind.is_copy());
    tracing::info!(
        total = batch.len(),
        skipped,
        copies = copies.len(),
        conversions = conversions.len(),
        "executing batch"
    );

    if !copies.is_empty() {
        emit(
            events,
            ExecEvent::PhaseStarted {
                phase: Phase::Copy,
                jobs: copies.len(),
            },
        );
        for job in &copies {
            if cancel.is_cancelled() {
                break;
            }
            progress.dispatched();
            let result = copy_into_place(&job.source, &job.destination)
                .map_err(|e| format!("copy failed: {e}"));
            record(&progress, events, job, result);
        }
    }

    if !conversions.is_empty() && !cancel.is_cancelled() {
        let staging = Staging::new(options.staging_dir.as_deref()).map_err(ExecuteError::Staging)?;
        let pool = make_pool(options.mode)?;
        emit(
            events,
            ExecEvent::PhaseStarted {
                phase: Phase::Convert,
                jobs: conversions.len(),
            },
        );
        pool.run_all(conversions.len(), &|i| {
            if cancel.is_cancelled() {
                return;
            }
            let job = conversions[i];
            progress.dispatched();
            let result = run_conversion(converter, &staging, job);
            record(&progress, events, job, result);
        });
    }

    let report = progress.into_report(skipped);
    tracing::info!(
        copied = report.copied,
        converted = report.converted,
        failed = report.failed,
        not_run = report.not_run,
        outcome = ?report.outcome,
        "batch finished"
    );
    Ok(report)
}

//! Per-run outcome counters and the terminal failure list.

use std::path::PathBuf;

use serde::Serialize;

use super::error::FetchFailureReason;
use super::job::{DownloadJob, JobState};
use crate::content::Fingerprint;

/// A descriptor that exhausted its attempt limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    /// Deduplication key of the descriptor.
    pub fingerprint: Fingerprint,
    /// Origin URL.
    pub source_url: String,
    /// Failed attempts made.
    pub attempts: u32,
    /// Reason of the last failed attempt.
    pub last_reason: Option<FetchFailureReason>,
    /// Message of the last failed attempt.
    pub last_error: Option<String>,
}

/// Final state of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// Deduplication key of the descriptor.
    pub fingerprint: Fingerprint,
    /// Origin URL.
    pub source_url: String,
    /// Planned destination.
    pub destination: PathBuf,
    /// Terminal state for this run.
    pub state: JobState,
    /// Failed attempts made.
    pub attempts_made: u32,
    /// True if the job succeeded via a history hit without fetching.
    pub skipped_duplicate: bool,
}

impl JobReport {
    fn from_job(job: &DownloadJob, skipped_duplicate: bool) -> Self {
        let descriptor = job.descriptor();
        Self {
            fingerprint: descriptor.fingerprint().clone(),
            source_url: descriptor.source_url().to_string(),
            destination: descriptor.destination_path().to_path_buf(),
            state: job.state(),
            attempts_made: job.attempts_made(),
            skipped_duplicate,
        }
    }
}

/// Summary of one dispatcher run.
///
/// `succeeded` counts descriptors fetched (or found complete on disk) in this
/// run; history hits are counted separately in `skipped_duplicate`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    total: usize,
    succeeded: usize,
    already_present: usize,
    skipped_duplicate: usize,
    failed: usize,
    excluded_by_filter: usize,
    cancelled: usize,
    retried: usize,
    failures: Vec<FailedJob>,
    jobs: Vec<JobReport>,
    empty_input: bool,
    interrupted: bool,
    partial_files_remain: bool,
}

impl RunSummary {
    /// Creates an all-zero summary for `total` input descriptors.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            empty_input: total == 0,
            ..Self::default()
        }
    }

    /// Input descriptors, before filtering.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Descriptors fetched (or already present) in this run.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Of `succeeded`, how many were already complete on disk.
    #[must_use]
    pub fn already_present(&self) -> usize {
        self.already_present
    }

    /// Descriptors skipped because history marks them completed.
    #[must_use]
    pub fn skipped_duplicate(&self) -> usize {
        self.skipped_duplicate
    }

    /// Descriptors that exhausted their attempt limit.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Descriptors rejected by the content filter.
    #[must_use]
    pub fn excluded_by_filter(&self) -> usize {
        self.excluded_by_filter
    }

    /// Descriptors that did not finish because the run was cancelled.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled
    }

    /// Number of retry attempts scheduled.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried
    }

    /// Terminal failures in completion order.
    #[must_use]
    pub fn failures(&self) -> &[FailedJob] {
        &self.failures
    }

    /// Final per-descriptor reports in completion order.
    #[must_use]
    pub fn jobs(&self) -> &[JobReport] {
        &self.jobs
    }

    /// Report for the descriptor with `fingerprint`, if it was dispatched.
    #[must_use]
    pub fn job(&self, fingerprint: &Fingerprint) -> Option<&JobReport> {
        self.jobs.iter().find(|job| &job.fingerprint == fingerprint)
    }

    /// True if the run received no descriptors at all.
    #[must_use]
    pub fn is_empty_input(&self) -> bool {
        self.empty_input
    }

    /// True if cancellation stopped the run early.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// True if `.part` files were left under the output folder.
    #[must_use]
    pub fn partial_files_remain(&self) -> bool {
        self.partial_files_remain
    }

    pub(crate) fn record_succeeded(&mut self, job: &DownloadJob, already_present: bool) {
        self.succeeded += 1;
        if already_present {
            self.already_present += 1;
        }
        self.jobs.push(JobReport::from_job(job, false));
    }

    pub(crate) fn record_skipped_duplicate(&mut self, job: &DownloadJob) {
        self.skipped_duplicate += 1;
        self.jobs.push(JobReport::from_job(job, true));
    }

    /// Counts a descriptor dropped because an earlier one in the same batch
    /// has the same fingerprint.
    pub(crate) fn record_batch_duplicate(&mut self) {
        self.skipped_duplicate += 1;
    }

    pub(crate) fn record_failed(&mut self, job: &DownloadJob) {
        debug_assert_eq!(job.state(), JobState::FailedTerminal);
        self.failed += 1;
        let descriptor = job.descriptor();
        self.failures.push(FailedJob {
            fingerprint: descriptor.fingerprint().clone(),
            source_url: descriptor.source_url().to_string(),
            attempts: job.attempts_made(),
            last_reason: job.last_reason(),
            last_error: job.last_error().map(str::to_string),
        });
        self.jobs.push(JobReport::from_job(job, false));
    }

    pub(crate) fn record_cancelled(&mut self, job: &DownloadJob) {
        self.cancelled += 1;
        self.jobs.push(JobReport::from_job(job, false));
    }

    pub(crate) fn record_retry(&mut self) {
        self.retried += 1;
    }

    pub(crate) fn set_excluded_by_filter(&mut self, excluded: usize) {
        self.excluded_by_filter = excluded;
    }

    pub(crate) fn set_interrupted(&mut self, interrupted: bool) {
        self.interrupted = interrupted;
    }

    pub(crate) fn set_partial_files_remain(&mut self, remain: bool) {
        self.partial_files_remain = remain;
    }
}

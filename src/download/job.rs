//! Per-descriptor job state tracked by the dispatcher.

use std::fmt;

use serde::Serialize;
use tokio::time::Instant;

use super::error::{FetchError, FetchFailureReason};
use crate::content::ContentDescriptor;

/// Lifecycle state of a [`DownloadJob`].
///
/// ```text
/// Pending -> InFlight -> Succeeded
///                     -> FailedRetryable -> Pending (after backoff)
///                     -> FailedTerminal
/// Pending -> Succeeded (history hit, skipped)
/// Pending | InFlight -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for a worker slot (or for its backoff to elapse).
    Pending,
    /// A fetch attempt is running.
    InFlight,
    /// Terminal: fetched, already present, or skipped as a duplicate.
    Succeeded,
    /// Last attempt failed; the job will be requeued.
    FailedRetryable,
    /// Terminal: attempt limit exhausted.
    FailedTerminal,
    /// Terminal for this run: stopped by cancellation before completing.
    Cancelled,
}

impl JobState {
    /// Returns true for states a job never leaves within a run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::FailedTerminal | Self::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Succeeded => "succeeded",
            Self::FailedRetryable => "failed_retryable",
            Self::FailedTerminal => "failed_terminal",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// One descriptor plus its retry bookkeeping.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    descriptor: ContentDescriptor,
    state: JobState,
    attempts_made: u32,
    not_before: Option<Instant>,
    last_reason: Option<FetchFailureReason>,
    last_error: Option<String>,
}

impl DownloadJob {
    /// Wraps a descriptor as a fresh pending job.
    #[must_use]
    pub fn new(descriptor: ContentDescriptor) -> Self {
        Self {
            descriptor,
            state: JobState::Pending,
            attempts_made: 0,
            not_before: None,
            last_reason: None,
            last_error: None,
        }
    }

    /// The descriptor being downloaded.
    #[must_use]
    pub fn descriptor(&self) -> &ContentDescriptor {
        &self.descriptor
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Number of failed fetch attempts so far.
    #[must_use]
    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    /// Reason of the most recent failed attempt.
    #[must_use]
    pub fn last_reason(&self) -> Option<FetchFailureReason> {
        self.last_reason
    }

    /// Message of the most recent failed attempt.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns true if the job may be started at `now`.
    #[must_use]
    pub fn is_ready(&self, now: Instant) -> bool {
        self.state == JobState::Pending && self.not_before.is_none_or(|at| at <= now)
    }

    /// Earliest instant at which the job becomes eligible.
    #[must_use]
    pub fn not_before(&self) -> Option<Instant> {
        self.not_before
    }

    pub(crate) fn start(&mut self) {
        self.state = JobState::InFlight;
        self.not_before = None;
    }

    pub(crate) fn succeed(&mut self) {
        self.state = JobState::Succeeded;
    }

    /// Records a failed attempt and returns the new attempt count.
    pub(crate) fn record_failure(&mut self, error: &FetchError) -> u32 {
        self.attempts_made = self.attempts_made.saturating_add(1);
        self.last_reason = Some(error.reason());
        self.last_error = Some(error.to_string());
        self.state = JobState::FailedRetryable;
        self.attempts_made
    }

    pub(crate) fn requeue(&mut self, not_before: Instant) {
        self.state = JobState::Pending;
        self.not_before = Some(not_before);
    }

    pub(crate) fn fail_terminal(&mut self) {
        self.state = JobState::FailedTerminal;
    }

    pub(crate) fn cancel(&mut self) {
        self.state = JobState::Cancelled;
    }
}

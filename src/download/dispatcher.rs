//! Bounded concurrent dispatcher driving descriptors to completion.
//!
//! A single scheduling loop owns every [`DownloadJob`]. It checks history,
//! starts fetch tasks on a [`JoinSet`] up to the concurrency limit, and
//! settles each finished attempt: success is recorded in history, failures
//! are requeued behind the other pending jobs until the attempt limit is
//! reached. Because only the loop touches jobs and history writes, no job can
//! be in flight twice and writes are naturally serialized.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bulkdl_core::download::{DispatchConfig, Dispatcher, HttpFetcher};
//! use bulkdl_core::history::SqliteHistory;
//! use bulkdl_core::Database;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let history = SqliteHistory::new(Database::new_in_memory().await?);
//! let dispatcher = Dispatcher::new(
//!     DispatchConfig::default(),
//!     Arc::new(history),
//!     Arc::new(HttpFetcher::new()?),
//! )?;
//! let summary = dispatcher.run(Vec::new(), &CancellationToken::new()).await?;
//! assert!(summary.is_empty_input());
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::task::{Id, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::constants::{FALLBACK_CONCURRENCY, MAX_CONCURRENCY};
use super::error::FetchError;
use super::fetcher::{FetchOutcome, Fetcher};
use super::job::{DownloadJob, JobState};
use super::retry::{RetryDecision, RetryPolicy};
use super::summary::RunSummary;
use crate::content::ContentDescriptor;
use crate::filter::{self, ExclusionSet};
use crate::history::{CompletionMetadata, HistoryError, HistoryStore};

type AttemptResult = (DownloadJob, Result<FetchOutcome, FetchError>);

/// Error type for dispatcher operations that abort the whole run.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Invalid concurrency value provided.
    #[error("invalid concurrency value {value}: must be between 0 (auto) and {MAX_CONCURRENCY}")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// History store failed under [`StorePolicy::Strict`].
    #[error("history store error: {0}")]
    Store(#[from] HistoryError),
}

/// What to do when the history store fails mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorePolicy {
    /// Abort the run: drain in-flight fetches and return the error.
    #[default]
    Strict,
    /// Log and continue: lookups count as "not completed", and a failed
    /// completion write still counts the download as succeeded.
    Degrade,
}

/// Run-level dispatcher configuration.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Maximum in-flight fetches; 0 means host parallelism.
    pub concurrency: usize,
    /// Attempt limit and backoff.
    pub retry_policy: RetryPolicy,
    /// Upper bound on a single fetch attempt.
    pub attempt_timeout: Option<Duration>,
    /// History failure handling.
    pub store_policy: StorePolicy,
    /// Media categories to skip.
    pub exclusions: ExclusionSet,
}

/// Live counters for progress display, shared with the caller.
#[derive(Debug, Default)]
pub struct DispatchProgress {
    total: AtomicUsize,
    settled: AtomicUsize,
    in_flight: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
}

impl DispatchProgress {
    /// Descriptors accepted for dispatch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Descriptors in a terminal state.
    #[must_use]
    pub fn settled(&self) -> usize {
        self.settled.load(Ordering::SeqCst)
    }

    /// Fetches currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Terminal failures so far.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Retries scheduled so far.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.settled.store(0, Ordering::SeqCst);
        self.in_flight.store(0, Ordering::SeqCst);
        self.failed.store(0, Ordering::SeqCst);
        self.retried.store(0, Ordering::SeqCst);
    }

    fn attempt_started(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn attempt_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn job_settled(&self) {
        self.settled.fetch_add(1, Ordering::SeqCst);
    }

    fn job_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        self.job_settled();
    }

    fn retry_scheduled(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}

/// Drives a batch of descriptors through fetch, retry and history recording.
pub struct Dispatcher {
    concurrency: usize,
    config: DispatchConfig,
    store: Arc<dyn HistoryStore>,
    fetcher: Arc<dyn Fetcher>,
    progress: Arc<DispatchProgress>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("concurrency", &self.concurrency)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidConcurrency`] if `config.concurrency`
    /// is above the maximum.
    #[instrument(level = "debug", skip_all, fields(requested = config.concurrency))]
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn HistoryStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, DispatchError> {
        let concurrency = resolve_concurrency(config.concurrency)?;
        debug!(
            concurrency,
            attempt_limit = %config.retry_policy.limit(),
            store_policy = ?config.store_policy,
            "creating dispatcher"
        );
        Ok(Self {
            concurrency,
            config,
            store,
            fetcher,
            progress: Arc::new(DispatchProgress::default()),
        })
    }

    /// Returns the effective concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the live progress counters.
    #[must_use]
    pub fn progress(&self) -> Arc<DispatchProgress> {
        Arc::clone(&self.progress)
    }

    /// Runs `descriptors` to completion or cancellation.
    ///
    /// Excluded categories never become jobs. Descriptors whose fingerprint
    /// is already in history succeed without a fetch. Per-job failures never
    /// fail the run; they are reported in the returned [`RunSummary`].
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] when the history store fails under
    /// [`StorePolicy::Strict`]. In-flight fetches are cancelled and drained
    /// before returning.
    #[instrument(skip_all, fields(descriptors = descriptors.len(), concurrency = self.concurrency))]
    pub async fn run(
        &self,
        descriptors: Vec<ContentDescriptor>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, DispatchError> {
        let mut summary = RunSummary::new(descriptors.len());
        if summary.is_empty_input() {
            info!("no descriptors to dispatch");
            self.progress.reset(0);
            return Ok(summary);
        }

        let (accepted, excluded) = filter::partition(descriptors, &self.config.exclusions);
        summary.set_excluded_by_filter(excluded);
        let mut pending = self.enqueue(accepted, &mut summary);
        self.progress.reset(pending.len());
        info!(jobs = pending.len(), excluded, "starting dispatch");

        let run_token = cancel.child_token();
        let mut in_flight: JoinSet<AttemptResult> = JoinSet::new();
        let mut in_flight_jobs: HashMap<Id, DownloadJob> = HashMap::new();
        let mut fatal: Option<DispatchError> = None;

        loop {
            if fatal.is_none()
                && !run_token.is_cancelled()
                && let Err(error) = self
                    .fill_slots(
                        &mut pending,
                        &mut in_flight,
                        &mut in_flight_jobs,
                        &run_token,
                        &mut summary,
                    )
                    .await
            {
                warn!(error = %error, "aborting run after history failure");
                fatal = Some(error);
                run_token.cancel();
            }

            if in_flight.is_empty() {
                if fatal.is_some() || run_token.is_cancelled() || pending.is_empty() {
                    break;
                }
                // Every pending job is waiting out its backoff.
                let Some(wake) = next_wake(&pending) else {
                    continue;
                };
                tokio::select! {
                    () = run_token.cancelled() => {}
                    () = tokio::time::sleep_until(wake) => {}
                }
                continue;
            }

            let wake = (in_flight.len() < self.concurrency && !run_token.is_cancelled())
                .then(|| next_wake(&pending))
                .flatten();

            tokio::select! {
                joined = in_flight.join_next_with_id() => match joined {
                    Some(Ok((id, (job, result)))) => {
                        in_flight_jobs.remove(&id);
                        if let Err(error) = self.settle(job, result, &mut pending, &mut summary).await {
                            warn!(error = %error, "aborting run after history failure");
                            fatal.get_or_insert(error);
                            run_token.cancel();
                        }
                    }
                    Some(Err(join_error)) => {
                        warn!(error = %join_error, "download task failed to join");
                        self.settle_lost(in_flight_jobs.remove(&join_error.id()), &mut summary);
                    }
                    None => {}
                },
                () = sleep_until_opt(wake) => {}
                () = run_token.cancelled(), if !run_token.is_cancelled() => {
                    debug!(in_flight = in_flight.len(), "cancellation requested, draining");
                }
            }
        }

        for mut job in pending.drain(..) {
            job.cancel();
            summary.record_cancelled(&job);
        }
        summary.set_interrupted(cancel.is_cancelled());

        if let Some(error) = fatal {
            return Err(error);
        }

        info!(
            succeeded = summary.succeeded(),
            skipped_duplicate = summary.skipped_duplicate(),
            failed = summary.failed(),
            cancelled = summary.cancelled(),
            retried = summary.retried(),
            "dispatch complete"
        );
        Ok(summary)
    }

    /// Wraps accepted descriptors as jobs, dropping in-batch fingerprint
    /// duplicates.
    fn enqueue(
        &self,
        descriptors: Vec<ContentDescriptor>,
        summary: &mut RunSummary,
    ) -> VecDeque<DownloadJob> {
        let mut seen = HashSet::new();
        let mut pending = VecDeque::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if seen.insert(descriptor.fingerprint().clone()) {
                pending.push_back(DownloadJob::new(descriptor));
            } else {
                debug!(url = %descriptor.source_url(), "dropping duplicate descriptor in batch");
                summary.record_batch_duplicate();
            }
        }
        pending
    }

    /// Starts ready jobs until every slot is taken or none is ready.
    async fn fill_slots(
        &self,
        pending: &mut VecDeque<DownloadJob>,
        in_flight: &mut JoinSet<AttemptResult>,
        in_flight_jobs: &mut HashMap<Id, DownloadJob>,
        run_token: &CancellationToken,
        summary: &mut RunSummary,
    ) -> Result<(), DispatchError> {
        while in_flight.len() < self.concurrency && !run_token.is_cancelled() {
            let now = Instant::now();
            let Some(index) = pending.iter().position(|job| job.is_ready(now)) else {
                break;
            };
            let Some(mut job) = pending.remove(index) else {
                break;
            };

            match self.is_completed(&job).await {
                Ok(true) => {
                    debug!(url = %job.descriptor().source_url(), "already in history, skipping");
                    job.succeed();
                    summary.record_skipped_duplicate(&job);
                    self.progress.job_settled();
                    continue;
                }
                Ok(false) => {}
                Err(error) => {
                    pending.push_front(job);
                    return Err(error);
                }
            }

            job.start();
            self.progress.attempt_started();
            let fetcher = Arc::clone(&self.fetcher);
            let token = run_token.clone();
            let attempt_timeout = self.config.attempt_timeout;
            let snapshot = job.clone();
            let handle = in_flight.spawn(async move {
                let attempt = run_attempt(fetcher.as_ref(), job.descriptor(), &token, attempt_timeout);
                let result = AssertUnwindSafe(attempt)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(FetchError::network(
                            job.descriptor().source_url(),
                            "fetch task panicked",
                        ))
                    });
                (job, result)
            });
            in_flight_jobs.insert(handle.id(), snapshot);
        }
        Ok(())
    }

    async fn is_completed(&self, job: &DownloadJob) -> Result<bool, DispatchError> {
        match self.store.has_completed(job.descriptor().fingerprint()).await {
            Ok(known) => Ok(known),
            Err(error) => match self.config.store_policy {
                StorePolicy::Strict => Err(error.into()),
                StorePolicy::Degrade => {
                    warn!(
                        error = %error,
                        url = %job.descriptor().source_url(),
                        "history lookup failed, treating as not completed"
                    );
                    Ok(false)
                }
            },
        }
    }

    /// Settles a job whose task ended without returning it.
    fn settle_lost(&self, job: Option<DownloadJob>, summary: &mut RunSummary) {
        self.progress.attempt_finished();
        let Some(mut job) = job else {
            return;
        };
        job.cancel();
        summary.record_cancelled(&job);
        self.progress.job_settled();
    }

    /// Applies the outcome of one attempt to its job.
    async fn settle(
        &self,
        mut job: DownloadJob,
        result: Result<FetchOutcome, FetchError>,
        pending: &mut VecDeque<DownloadJob>,
        summary: &mut RunSummary,
    ) -> Result<(), DispatchError> {
        self.progress.attempt_finished();
        let url = job.descriptor().source_url().to_string();

        let error = match result {
            Ok(outcome) => {
                let recorded = self.record_completion(&job, &outcome).await;
                job.succeed();
                summary.record_succeeded(&job, outcome.already_present);
                self.progress.job_settled();
                return recorded;
            }
            Err(error) if error.is_aborted() => {
                debug!(url = %url, "attempt aborted by cancellation");
                job.cancel();
                summary.record_cancelled(&job);
                self.progress.job_settled();
                return Ok(());
            }
            Err(error) => error,
        };

        let attempts_made = job.record_failure(&error);
        match self.config.retry_policy.should_retry(attempts_made) {
            RetryDecision::Retry { delay, attempt } => {
                warn!(
                    url = %url,
                    error = %error,
                    reason = %error.reason(),
                    next_attempt = attempt,
                    delay_ms = delay.as_millis(),
                    "attempt failed, requeueing"
                );
                job.requeue(Instant::now() + delay);
                summary.record_retry();
                self.progress.retry_scheduled();
                pending.push_back(job);
            }
            RetryDecision::DoNotRetry { reason } => {
                warn!(
                    url = %url,
                    error = %error,
                    attempts_made,
                    reason = %reason,
                    "download failed after all attempts"
                );
                job.fail_terminal();
                summary.record_failed(&job);
                self.progress.job_failed();
            }
        }
        Ok(())
    }

    async fn record_completion(
        &self,
        job: &DownloadJob,
        outcome: &FetchOutcome,
    ) -> Result<(), DispatchError> {
        debug_assert_eq!(job.state(), JobState::InFlight);
        let descriptor = job.descriptor();
        let metadata = CompletionMetadata {
            source_url: descriptor.source_url(),
            file_path: Some(outcome.path.as_path()),
            file_size: Some(outcome.bytes),
        };
        match self
            .store
            .record_completed(descriptor.fingerprint(), &metadata)
            .await
        {
            Ok(()) => Ok(()),
            Err(error) => match self.config.store_policy {
                StorePolicy::Strict => Err(error.into()),
                StorePolicy::Degrade => {
                    warn!(
                        error = %error,
                        url = %descriptor.source_url(),
                        "failed to record completion, file will be fetched again next run"
                    );
                    Ok(())
                }
            },
        }
    }
}

async fn run_attempt(
    fetcher: &dyn Fetcher,
    descriptor: &ContentDescriptor,
    cancel: &CancellationToken,
    attempt_timeout: Option<Duration>,
) -> Result<FetchOutcome, FetchError> {
    let fetch = fetcher.fetch(descriptor, descriptor.destination_path(), cancel);
    match attempt_timeout {
        Some(limit) => tokio::time::timeout(limit, fetch)
            .await
            .unwrap_or_else(|_| Err(FetchError::timeout(descriptor.source_url()))),
        None => fetch.await,
    }
}

fn resolve_concurrency(requested: usize) -> Result<usize, DispatchError> {
    match requested {
        0 => Ok(std::thread::available_parallelism()
            .map_or(FALLBACK_CONCURRENCY, NonZeroUsize::get)
            .min(MAX_CONCURRENCY)),
        n if n <= MAX_CONCURRENCY => Ok(n),
        n => Err(DispatchError::InvalidConcurrency { value: n }),
    }
}

fn next_wake(pending: &VecDeque<DownloadJob>) -> Option<Instant> {
    pending.iter().filter_map(DownloadJob::not_before).min()
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;

    use super::*;
    use crate::content::{FingerprintPolicy, MediaCategory};
    use crate::download::{AttemptLimit, FetchFailureReason};
    use crate::history::SqliteHistory;
    use crate::Database;

    /// Fails every call with a 503.
    #[derive(Default)]
    struct AlwaysFails {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Fetcher for AlwaysFails {
        async fn fetch(
            &self,
            descriptor: &ContentDescriptor,
            _destination: &Path,
            _cancel: &CancellationToken,
        ) -> Result<FetchOutcome, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::http_status(descriptor.source_url(), 503))
        }
    }

    /// Succeeds without touching the filesystem.
    #[derive(Default)]
    struct AlwaysSucceeds {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Fetcher for AlwaysSucceeds {
        async fn fetch(
            &self,
            _descriptor: &ContentDescriptor,
            destination: &Path,
            _cancel: &CancellationToken,
        ) -> Result<FetchOutcome, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchOutcome {
                path: destination.to_path_buf(),
                bytes: 1,
                already_present: false,
            })
        }
    }

    /// Never finishes on its own.
    struct Hangs;

    #[async_trait]
    impl Fetcher for Hangs {
        async fn fetch(
            &self,
            _descriptor: &ContentDescriptor,
            _destination: &Path,
            _cancel: &CancellationToken,
        ) -> Result<FetchOutcome, FetchError> {
            std::future::pending().await
        }
    }

    fn descriptor(url: &str) -> ContentDescriptor {
        ContentDescriptor::new(
            url,
            "file.jpg",
            PathBuf::from("out").join(url.rsplit('/').next().unwrap()),
            None,
            FingerprintPolicy::UrlOnly,
        )
    }

    async fn history() -> Arc<SqliteHistory> {
        Arc::new(SqliteHistory::new(Database::new_in_memory().await.unwrap()))
    }

    fn config(limit: AttemptLimit) -> DispatchConfig {
        DispatchConfig {
            concurrency: 2,
            retry_policy: RetryPolicy::immediate(limit),
            ..DispatchConfig::default()
        }
    }

    // ==================== Construction Tests ====================

    #[test]
    fn test_resolve_concurrency_auto_uses_host_parallelism() {
        let resolved = resolve_concurrency(0).unwrap();
        assert!(resolved >= 1);
        assert!(resolved <= MAX_CONCURRENCY);
    }

    #[test]
    fn test_resolve_concurrency_accepts_max() {
        assert_eq!(resolve_concurrency(MAX_CONCURRENCY).unwrap(), MAX_CONCURRENCY);
        assert_eq!(resolve_concurrency(1).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dispatcher_rejects_concurrency_above_max() {
        let result = Dispatcher::new(
            DispatchConfig {
                concurrency: MAX_CONCURRENCY + 1,
                ..DispatchConfig::default()
            },
            history().await,
            Arc::new(AlwaysSucceeds::default()),
        );
        assert!(matches!(
            result,
            Err(DispatchError::InvalidConcurrency { value: 101 })
        ));
    }

    // ==================== Run Tests ====================

    #[tokio::test]
    async fn test_run_empty_input_returns_flagged_summary() {
        let fetcher = Arc::new(AlwaysSucceeds::default());
        let dispatcher = Dispatcher::new(
            config(AttemptLimit::Bounded(3)),
            history().await,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        )
        .unwrap();

        let summary = dispatcher
            .run(Vec::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(summary.is_empty_input());
        assert_eq!(summary.succeeded(), 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_run_drops_in_batch_duplicates() {
        let fetcher = Arc::new(AlwaysSucceeds::default());
        let dispatcher = Dispatcher::new(
            config(AttemptLimit::Bounded(3)),
            history().await,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        )
        .unwrap();

        let summary = dispatcher
            .run(
                vec![
                    descriptor("https://example.com/same.jpg"),
                    descriptor("https://example.com/same.jpg"),
                ],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.skipped_duplicate(), 1);
    }

    #[tokio::test]
    async fn test_run_bounded_limit_exhausts_attempts() {
        let fetcher = Arc::new(AlwaysFails::default());
        let dispatcher = Dispatcher::new(
            config(AttemptLimit::Bounded(4)),
            history().await,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        )
        .unwrap();

        let summary = dispatcher
            .run(
                vec![descriptor("https://example.com/broken.jpg")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.retried(), 3);
        assert_eq!(summary.failures()[0].attempts, 4);
        assert_eq!(
            summary.failures()[0].last_reason,
            Some(FetchFailureReason::HttpStatus)
        );
        assert_eq!(dispatcher.progress().failed(), 1);
    }

    #[tokio::test]
    async fn test_run_attempt_timeout_counts_as_timeout_failure() {
        let dispatcher = Dispatcher::new(
            DispatchConfig {
                attempt_timeout: Some(Duration::from_millis(20)),
                ..config(AttemptLimit::Bounded(2))
            },
            history().await,
            Arc::new(Hangs),
        )
        .unwrap();

        let summary = dispatcher
            .run(
                vec![descriptor("https://example.com/slow.mp4")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.failures()[0].attempts, 2);
        assert_eq!(
            summary.failures()[0].last_reason,
            Some(FetchFailureReason::Timeout)
        );
    }

    #[tokio::test]
    async fn test_run_respects_exclusions_before_dispatch() {
        let fetcher = Arc::new(AlwaysSucceeds::default());
        let dispatcher = Dispatcher::new(
            DispatchConfig {
                exclusions: ExclusionSet {
                    images: true,
                    ..ExclusionSet::none()
                },
                ..config(AttemptLimit::Bounded(1))
            },
            history().await,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        )
        .unwrap();

        let image = descriptor("https://example.com/a.jpg");
        assert_eq!(image.media_category(), MediaCategory::Image);

        let summary = dispatcher
            .run(
                vec![image, descriptor("https://example.com/b.mp3")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.excluded_by_filter(), 1);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(!summary.is_empty_input());
    }

    #[tokio::test]
    async fn test_lost_task_is_counted_as_cancelled() {
        let dispatcher = Dispatcher::new(
            config(AttemptLimit::Bounded(1)),
            history().await,
            Arc::new(Hangs),
        )
        .unwrap();
        let mut summary = RunSummary::new(1);
        let mut job = DownloadJob::new(descriptor("https://example.com/lost.jpg"));
        dispatcher.progress.reset(1);
        job.start();
        dispatcher.progress.attempt_started();

        dispatcher.settle_lost(Some(job), &mut summary);

        assert_eq!(summary.cancelled(), 1);
        assert_eq!(summary.jobs().len(), summary.total());
        assert_eq!(summary.jobs()[0].state, JobState::Cancelled);
        assert_eq!(dispatcher.progress().in_flight(), 0);
        assert_eq!(dispatcher.progress().settled(), 1);
    }

    #[tokio::test]
    async fn test_run_already_cancelled_starts_nothing() {
        let fetcher = Arc::new(AlwaysSucceeds::default());
        let dispatcher = Dispatcher::new(
            config(AttemptLimit::Bounded(1)),
            history().await,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = dispatcher
            .run(
                vec![
                    descriptor("https://example.com/1.jpg"),
                    descriptor("https://example.com/2.jpg"),
                ],
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(summary.cancelled(), 2);
        assert!(summary.is_interrupted());
        assert!(
            summary
                .jobs()
                .iter()
                .all(|job| job.state == JobState::Cancelled)
        );
    }
}

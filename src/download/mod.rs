//! Fetching descriptors to disk and dispatching them concurrently.
//!
//! # Features
//!
//! - Streaming downloads written to a `.part` file, renamed on completion
//! - Length verification against the declared size or `Content-Length`
//! - Bounded concurrent dispatch with history-based deduplication
//! - Bounded or unbounded retries with exponential backoff and jitter
//! - Cooperative cancellation at chunk boundaries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bulkdl_core::download::{AttemptLimit, DispatchConfig, Dispatcher, HttpFetcher, RetryPolicy};
//! use bulkdl_core::history::SqliteHistory;
//! use bulkdl_core::Database;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(descriptors: Vec<bulkdl_core::ContentDescriptor>) -> Result<(), Box<dyn std::error::Error>> {
//! let history = SqliteHistory::new(Database::new(std::path::Path::new("history.sqlite")).await?);
//! let config = DispatchConfig {
//!     concurrency: 4,
//!     retry_policy: RetryPolicy::with_limit(AttemptLimit::Bounded(5)),
//!     ..DispatchConfig::default()
//! };
//! let dispatcher = Dispatcher::new(config, Arc::new(history), Arc::new(HttpFetcher::new()?))?;
//! let summary = dispatcher.run(descriptors, &CancellationToken::new()).await?;
//! println!("succeeded: {}, failed: {}", summary.succeeded(), summary.failed());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod dispatcher;
mod error;
mod fetcher;
mod job;
mod retry;
mod summary;

pub use client::HttpFetcher;
pub use dispatcher::{DispatchConfig, DispatchError, DispatchProgress, Dispatcher, StorePolicy};
pub use error::{FetchError, FetchFailureReason};
pub use fetcher::{FetchOutcome, Fetcher, is_partial_path, partial_path_for};
pub use job::{DownloadJob, JobState};
pub use retry::{AttemptLimit, RetryDecision, RetryPolicy};
pub use summary::{FailedJob, JobReport, RunSummary};

//! bulkdl core library
//!
//! Turns a list of direct file links into downloaded files, skipping anything
//! a previous run already completed.
//!
//! # Architecture
//!
//! Leaves first:
//! - [`db`] - `SQLite` connection and schema migrations
//! - [`history`] - persistent "already downloaded" fingerprints
//! - [`content`] - content descriptors, fingerprints and destination naming
//! - [`filter`] - media category classification and exclusion
//! - [`download`] - the HTTP fetcher and the concurrent dispatcher
//! - [`finalize`] - empty directory purge and partial file detection
//! - [`input`] - link extraction from text

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod content;
pub mod db;
pub mod download;
pub mod filter;
pub mod finalize;
pub mod history;
pub mod input;
#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use content::{
    ContentDescriptor, DescriptorBuilder, Fingerprint, FingerprintPolicy, MediaCategory,
};
pub use db::{Database, DbError};
pub use download::{
    AttemptLimit, DispatchConfig, DispatchError, DispatchProgress, Dispatcher, FetchError,
    FetchFailureReason, FetchOutcome, Fetcher, HttpFetcher, RetryPolicy, RunSummary,
    StorePolicy,
};
pub use filter::ExclusionSet;
pub use finalize::{FinalizeReport, detect_partials, finalize_run, purge_empty_directories};
pub use history::{HistoryError, HistoryStore, SqliteHistory};
pub use input::extract_links;

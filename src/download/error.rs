//! Error types for the download module.
//!
//! Every way a single fetch attempt can fail maps to one [`FetchError`]
//! variant, and every variant maps to a [`FetchFailureReason`] used by the
//! dispatcher and the run summary.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Coarse failure reason recorded per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailureReason {
    /// DNS, connect, TLS, or mid-stream transport error.
    Network,
    /// Server answered with a non-2xx status.
    HttpStatus,
    /// Stream ended before the declared length.
    Truncated,
    /// Connect/read or per-attempt timeout.
    Timeout,
    /// Local filesystem write, flush, or rename failure.
    DiskWrite,
    /// The run was cancelled while the fetch was in flight.
    Aborted,
}

impl FetchFailureReason {
    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::HttpStatus => "http_status",
            Self::Truncated => "truncated",
            Self::Timeout => "timeout",
            Self::DiskWrite => "disk_write",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for FetchFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS, reset).
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying transport error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Request or attempt timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Body ended short of the declared length.
    #[error("truncated download of {url}: expected {expected_bytes} bytes, got {actual_bytes}")]
    Truncated {
        /// The URL being fetched.
        url: String,
        /// Declared size in bytes.
        expected_bytes: u64,
        /// Bytes actually written.
        actual_bytes: u64,
    },

    /// File system error (create dir, write, flush, rename).
    #[error("IO error writing to {path}: {source}")]
    DiskWrite {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The fetch was stopped by run cancellation; the partial file stays.
    #[error("download of {url} aborted by cancellation")]
    Aborted {
        /// The URL being fetched.
        url: String,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl FetchError {
    /// Creates a network error.
    pub fn network(url: impl Into<String>, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Network {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a truncation error.
    pub fn truncated(url: impl Into<String>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Truncated {
            url: url.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a disk write error.
    pub fn disk_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DiskWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a cancellation error.
    pub fn aborted(url: impl Into<String>) -> Self {
        Self::Aborted { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Maps the error to its summary reason.
    #[must_use]
    pub fn reason(&self) -> FetchFailureReason {
        match self {
            Self::Network { .. } | Self::InvalidUrl { .. } => FetchFailureReason::Network,
            Self::Timeout { .. } => FetchFailureReason::Timeout,
            Self::HttpStatus { .. } => FetchFailureReason::HttpStatus,
            Self::Truncated { .. } => FetchFailureReason::Truncated,
            Self::DiskWrite { .. } => FetchFailureReason::DiskWrite,
            Self::Aborted { .. } => FetchFailureReason::Aborted,
        }
    }

    /// Returns true if the run was cancelled mid-fetch.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// URL or path, which the source errors do not carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_reasons() {
        let io = || std::io::Error::other("boom");
        assert_eq!(
            FetchError::network("u", io()).reason(),
            FetchFailureReason::Network
        );
        assert_eq!(FetchError::timeout("u").reason(), FetchFailureReason::Timeout);
        assert_eq!(
            FetchError::http_status("u", 503).reason(),
            FetchFailureReason::HttpStatus
        );
        assert_eq!(
            FetchError::truncated("u", 10, 4).reason(),
            FetchFailureReason::Truncated
        );
        assert_eq!(
            FetchError::disk_write("/tmp/x", io()).reason(),
            FetchFailureReason::DiskWrite
        );
        assert_eq!(FetchError::aborted("u").reason(), FetchFailureReason::Aborted);
        assert_eq!(
            FetchError::invalid_url("nope").reason(),
            FetchFailureReason::Network
        );
    }

    #[test]
    fn test_fetch_error_http_status_display() {
        let msg = FetchError::http_status("https://example.com/a.jpg", 404).to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://example.com/a.jpg"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_fetch_error_truncated_display() {
        let msg = FetchError::truncated("https://example.com/a.mp4", 100, 40).to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("40"));
    }

    #[test]
    fn test_fetch_error_is_aborted() {
        assert!(FetchError::aborted("u").is_aborted());
        assert!(!FetchError::timeout("u").is_aborted());
    }

    #[test]
    fn test_failure_reason_labels() {
        assert_eq!(FetchFailureReason::DiskWrite.to_string(), "disk_write");
        assert_eq!(FetchFailureReason::HttpStatus.as_str(), "http_status");
    }
}

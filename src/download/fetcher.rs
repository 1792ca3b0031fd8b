//! The fetch seam between the dispatcher and the network.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::constants::PARTIAL_SUFFIX;
use super::error::FetchError;
use crate::content::ContentDescriptor;

/// Result of one successful fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Final location of the complete file.
    pub path: PathBuf,
    /// Size of the file at `path`.
    pub bytes: u64,
    /// True if a file of the declared size was already on disk and nothing
    /// was fetched.
    pub already_present: bool,
}

/// Performs a single fetch attempt for one descriptor.
///
/// On `Ok` the file at [`FetchOutcome::path`] is complete: either it was
/// already present at `destination` with the declared size, or the bytes
/// were written to a partial sibling and renamed into place. The outcome path
/// may differ from `destination` when that name is taken by another file. On
/// `Err` no completed path holds a partial file.
///
/// Implementations must observe `cancel` at least between body chunks and
/// return [`FetchError::Aborted`] when it fires.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `descriptor` into `destination`.
    async fn fetch(
        &self,
        descriptor: &ContentDescriptor,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError>;
}

/// Returns the in-progress path for `destination` (`name.ext.part`).
#[must_use]
pub fn partial_path_for(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map_or_else(OsString::new, std::ffi::OsStr::to_os_string);
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

/// Returns true if `path` carries the partial-file marker.
#[must_use]
pub fn is_partial_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(PARTIAL_SUFFIX) && name.len() > PARTIAL_SUFFIX.len())
}

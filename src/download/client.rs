//! HTTP fetcher that streams one descriptor to disk.
//!
//! Bytes go to a `.part` sibling of the destination; the partial file is
//! renamed into place only after the body length matches the declared size.
//! The destination path therefore only ever holds complete files.
//!
//! An existing file counts as already downloaded only when the descriptor
//! declares a size and the file matches it. Otherwise the new body is written
//! next to it as `name (2).ext` so a different source never clobbers it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, USER_AGENT};
use super::error::FetchError;
use super::fetcher::{FetchOutcome, Fetcher, partial_path_for};
use crate::content::ContentDescriptor;

/// Streaming HTTP fetcher.
///
/// Created once per run and shared by all workers so connections are pooled.
///
/// # Example
///
/// ```no_run
/// use bulkdl_core::download::HttpFetcher;
///
/// # fn example() -> Result<(), reqwest::Error> {
/// let fetcher = HttpFetcher::new()?.with_overwrite(true);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    overwrite: bool,
}

impl HttpFetcher {
    /// Creates a fetcher with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout between chunks: 5 minutes
    /// - Gzip decompression: enabled
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a fetcher with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    pub fn new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            overwrite: false,
        })
    }

    /// Refetch even when a complete destination file already exists.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    #[instrument(
        skip(self, descriptor, cancel),
        fields(url = %descriptor.source_url(), dest = %destination.display())
    )]
    async fn fetch_inner(
        &self,
        descriptor: &ContentDescriptor,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let url = descriptor.source_url();

        if !self.overwrite
            && let Some(expected) = descriptor.size()
            && let Some(bytes) = existing_complete_file(destination, expected).await
        {
            info!(bytes, "destination already present, skipping fetch");
            return Ok(FetchOutcome {
                path: destination.to_path_buf(),
                bytes,
                already_present: true,
            });
        }

        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::disk_write(parent, e))?;
        }

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FetchError::aborted(url)),
            response = self.send_request(url) => response?,
        };

        let expected = descriptor.size().or_else(|| response.content_length());
        let partial = partial_path_for(destination);
        debug!(partial = %partial.display(), ?expected, "streaming to partial file");

        let file = File::create(&partial)
            .await
            .map_err(|e| FetchError::disk_write(&partial, e))?;
        let written = stream_to_file(file, response, url, &partial, cancel).await?;

        if let Some(expected) = expected
            && expected != written
        {
            return Err(FetchError::truncated(url, expected, written));
        }

        let target = if self.overwrite {
            destination.to_path_buf()
        } else {
            free_destination(destination).await
        };
        tokio::fs::rename(&partial, &target)
            .await
            .map_err(|e| FetchError::disk_write(&target, e))?;

        info!(bytes = written, path = %target.display(), "download complete");
        Ok(FetchOutcome {
            path: target,
            bytes: written,
            already_present: false,
        })
    }

    async fn send_request(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        descriptor: &ContentDescriptor,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        self.fetch_inner(descriptor, destination, cancel).await
    }
}

/// Returns the size of `destination` if it is a file of exactly `expected` bytes.
async fn existing_complete_file(destination: &Path, expected: u64) -> Option<u64> {
    let metadata = tokio::fs::metadata(destination).await.ok()?;
    (metadata.is_file() && metadata.len() == expected).then_some(expected)
}

/// `destination`, or the first free `name (n).ext` sibling when a file from
/// another source already occupies it.
async fn free_destination(destination: &Path) -> PathBuf {
    if !path_taken(destination).await {
        return destination.to_path_buf();
    }
    let Some(filename) = destination.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return destination.to_path_buf();
    };
    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };
    let mut suffix = 2usize;
    loop {
        let candidate = destination.with_file_name(format!("{stem} ({suffix}){ext}"));
        if !path_taken(&candidate).await {
            debug!(
                taken = %destination.display(),
                using = %candidate.display(),
                "destination occupied, writing to sibling"
            );
            return candidate;
        }
        suffix += 1;
    }
}

async fn path_taken(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(true)
}

/// Streams the response body to `file`, stopping at the next chunk boundary
/// once `cancel` fires. Returns bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    cancel: &CancellationToken,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Keep what arrived so far in the partial file.
                if let Err(error) = writer.flush().await {
                    warn!(
                        error = %error,
                        partial = %file_path.display(),
                        "failed to flush partial file on cancellation"
                    );
                }
                debug!(bytes_written, "fetch aborted by cancellation");
                return Err(FetchError::aborted(url));
            }
            next = stream.next() => next,
        };
        let Some(chunk_result) = next else {
            break;
        };
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(url)
            } else {
                FetchError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::disk_write(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::disk_write(file_path, e))?;
    writer
        .get_mut()
        .sync_all()
        .await
        .map_err(|e| FetchError::disk_write(file_path, e))?;

    Ok(bytes_written)
}

//! Content descriptors: the unit of work handed to the download dispatcher.
//!
//! A [`ContentDescriptor`] is produced by a link-resolution collaborator at
//! run start and never mutated afterwards. It carries everything the
//! dispatcher needs: where to fetch from, where to write, which media
//! category the file belongs to, and the [`Fingerprint`] used for history
//! deduplication.
//!
//! # Example
//!
//! ```
//! use bulkdl_core::content::{ContentDescriptor, FingerprintPolicy, MediaCategory};
//! use std::path::PathBuf;
//!
//! let descriptor = ContentDescriptor::new(
//!     "https://cdn.example.com/a/clip.mp4",
//!     "clip.mp4",
//!     PathBuf::from("Downloads/example/clip.mp4"),
//!     Some(1024),
//!     FingerprintPolicy::UrlAndSize,
//! );
//! assert_eq!(descriptor.media_category(), MediaCategory::Video);
//! ```

mod naming;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::filter::classify_url;

pub use naming::{DescriptorBuilder, filename_from_url, sanitize_filename};

/// Media category of a content descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    /// Video files (mp4, webm, mkv, ...).
    Video,
    /// Still images (jpg, png, gif, ...).
    Image,
    /// Audio files (mp3, flac, ...).
    Audio,
    /// Recognized non-media files (archives, documents, ...).
    Other,
    /// The classifier could not decide. Never excluded by the filter.
    Unknown,
}

impl MediaCategory {
    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Other => "other",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which descriptor fields feed the deduplication fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintPolicy {
    /// Hash the source URL only.
    UrlOnly,
    /// Hash the source URL plus the declared size when the size is known.
    ///
    /// Content that changes length at the same URL is fetched again.
    #[default]
    UrlAndSize,
}

/// Stable deduplication key for a descriptor (hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint for a source URL and optional size.
    #[must_use]
    pub fn compute(source_url: &str, size: Option<u64>, policy: FingerprintPolicy) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source_url.trim().as_bytes());
        if policy == FingerprintPolicy::UrlAndSize
            && let Some(size) = size
        {
            hasher.update(b"|");
            hasher.update(size.to_string().as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wraps an already computed fingerprint (for example a stored key).
    #[must_use]
    pub fn from_hex(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One file to download.
///
/// Immutable once built; the dispatcher only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    source_url: String,
    suggested_name: String,
    destination_path: PathBuf,
    media_category: MediaCategory,
    size: Option<u64>,
    fingerprint: Fingerprint,
}

impl ContentDescriptor {
    /// Creates a descriptor, classifying its category from the URL and
    /// computing the fingerprint with `policy`.
    #[must_use]
    pub fn new(
        source_url: impl Into<String>,
        suggested_name: impl Into<String>,
        destination_path: PathBuf,
        size: Option<u64>,
        policy: FingerprintPolicy,
    ) -> Self {
        let source_url = source_url.into();
        let suggested_name = suggested_name.into();
        let media_category = match classify_url(&source_url) {
            MediaCategory::Unknown => crate::filter::classify_filename(&suggested_name),
            category => category,
        };
        let fingerprint = Fingerprint::compute(&source_url, size, policy);
        Self {
            source_url,
            suggested_name,
            destination_path,
            media_category,
            size,
            fingerprint,
        }
    }

    /// Returns the descriptor with an explicit category, for collaborators
    /// that know the content type better than the URL does.
    #[must_use]
    pub fn with_category(mut self, category: MediaCategory) -> Self {
        self.media_category = category;
        self
    }

    /// Origin URL of the file.
    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Filename proposed by the collaborator.
    #[must_use]
    pub fn suggested_name(&self) -> &str {
        &self.suggested_name
    }

    /// Final path of the completed download.
    #[must_use]
    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    /// Media category used by the content filter.
    #[must_use]
    pub fn media_category(&self) -> MediaCategory {
        self.media_category
    }

    /// Declared byte length, when known.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Deduplication key.
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

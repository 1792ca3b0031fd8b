//! Media-category classification and per-run exclusion filtering.
//!
//! Everything here is pure: no I/O, no logging side effects beyond trace
//! output. Descriptors the classifier cannot categorize are always accepted.

use url::Url;

use crate::content::{ContentDescriptor, MediaCategory};

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mkv", "webm", "mov", "avi", "wmv", "flv", "mpg", "mpeg", "ts", "3gp", "ogv",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "svg", "heic", "avif", "jfif",
];

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "oga", "m4a", "aac", "opus", "wma"];

const OTHER_EXTENSIONS: &[&str] = &[
    "zip", "rar", "7z", "tar", "gz", "bz2", "xz", "pdf", "txt", "doc", "docx", "epub", "iso",
    "exe", "apk", "json", "psd",
];

/// Classifies a bare extension (without the dot, any case).
#[must_use]
pub fn classify_extension(extension: &str) -> MediaCategory {
    let ext = extension.trim_start_matches('.').to_ascii_lowercase();
    if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaCategory::Video
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaCategory::Image
    } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        MediaCategory::Audio
    } else if OTHER_EXTENSIONS.contains(&ext.as_str()) {
        MediaCategory::Other
    } else {
        MediaCategory::Unknown
    }
}

/// Classifies a filename by its last extension.
#[must_use]
pub fn classify_filename(name: &str) -> MediaCategory {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => classify_extension(ext),
        _ => MediaCategory::Unknown,
    }
}

/// Classifies a URL by the extension of its last path segment.
#[must_use]
pub fn classify_url(url: &str) -> MediaCategory {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map_or(MediaCategory::Unknown, |last| classify_filename(&last))
}

/// Classifies a `Content-Type` header value by its top-level MIME type.
#[must_use]
pub fn classify_content_type(content_type: &str) -> MediaCategory {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match mime.split_once('/') {
        Some(("video", _)) => MediaCategory::Video,
        Some(("image", _)) => MediaCategory::Image,
        Some(("audio", _)) => MediaCategory::Audio,
        Some(("application" | "text", _)) => MediaCategory::Other,
        _ => MediaCategory::Unknown,
    }
}

/// Media categories to skip during a run; each toggles independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    /// Skip video files.
    pub videos: bool,
    /// Skip image files.
    pub images: bool,
    /// Skip audio files.
    pub audio: bool,
    /// Skip everything else that was recognized.
    pub other: bool,
}

impl ExclusionSet {
    /// An exclusion set that skips nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if `category` is excluded. `Unknown` never is.
    #[must_use]
    pub fn excludes(&self, category: MediaCategory) -> bool {
        match category {
            MediaCategory::Video => self.videos,
            MediaCategory::Image => self.images,
            MediaCategory::Audio => self.audio,
            MediaCategory::Other => self.other,
            MediaCategory::Unknown => false,
        }
    }

    /// Returns true when no category is excluded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.videos || self.images || self.audio || self.other)
    }
}

/// Returns true if the descriptor should be downloaded this run.
#[must_use]
pub fn accepts(descriptor: &ContentDescriptor, exclusions: &ExclusionSet) -> bool {
    !exclusions.excludes(descriptor.media_category())
}

/// Splits descriptors into accepted ones (order preserved) and the excluded count.
#[must_use]
pub fn partition(
    descriptors: Vec<ContentDescriptor>,
    exclusions: &ExclusionSet,
) -> (Vec<ContentDescriptor>, usize) {
    if exclusions.is_empty() {
        return (descriptors, 0);
    }
    let total = descriptors.len();
    let accepted: Vec<ContentDescriptor> = descriptors
        .into_iter()
        .filter(|descriptor| accepts(descriptor, exclusions))
        .collect();
    let excluded = total - accepted.len();
    (accepted, excluded)
}

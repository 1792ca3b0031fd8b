//! Filename sanitization and destination path construction for direct links.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use url::Url;

use super::{ContentDescriptor, FingerprintPolicy};

/// Folder used when a URL has no usable host.
const FALLBACK_ALBUM: &str = "loose_files";

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Filename from the last URL path segment, percent-decoded and sanitized.
///
/// Returns `None` when the URL has no non-empty last segment.
#[must_use]
pub fn filename_from_url(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    Some(sanitize_filename(&decoded))
}

/// Builds descriptors for direct file links.
///
/// Destination layout is `output_folder/<host>[ (<id>)]/<filename>`, where
/// `<id>` is the path segment preceding the filename. Destinations are unique
/// within one builder: a repeated name gets a `_2`, `_3`, ... suffix.
#[derive(Debug)]
pub struct DescriptorBuilder {
    output_folder: PathBuf,
    include_id: bool,
    policy: FingerprintPolicy,
    used_destinations: HashSet<PathBuf>,
}

impl DescriptorBuilder {
    /// Creates a builder rooted at `output_folder`.
    #[must_use]
    pub fn new(output_folder: impl Into<PathBuf>, include_id: bool, policy: FingerprintPolicy) -> Self {
        Self {
            output_folder: output_folder.into(),
            include_id,
            policy,
            used_destinations: HashSet::new(),
        }
    }

    /// Builds a descriptor for `url`, or `None` if it does not name a file.
    pub fn build(&mut self, url: &str, size: Option<u64>) -> Option<ContentDescriptor> {
        let parsed = Url::parse(url).ok()?;
        let filename = filename_from_url(&parsed)?;
        let folder = self.output_folder.join(self.album_folder(&parsed));
        let destination = self.claim_destination(&folder, &filename);
        Some(ContentDescriptor::new(
            parsed.as_str(),
            filename,
            destination,
            size,
            self.policy,
        ))
    }

    fn album_folder(&self, url: &Url) -> String {
        let album = url
            .host_str()
            .map(sanitize_filename)
            .unwrap_or_else(|| FALLBACK_ALBUM.to_string());
        if !self.include_id {
            return album;
        }
        let id = url.path_segments().and_then(|segments| {
            let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
            let len = segments.len();
            (len >= 2).then(|| sanitize_filename(segments[len - 2]))
        });
        match id {
            Some(id) => format!("{album} ({id})"),
            None => album,
        }
    }

    fn claim_destination(&mut self, folder: &Path, filename: &str) -> PathBuf {
        let candidate = folder.join(filename);
        if self.used_destinations.insert(candidate.clone()) {
            return candidate;
        }

        let (stem, ext) = match filename.rfind('.') {
            Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
            _ => (filename, ""),
        };
        let mut suffix = 2usize;
        loop {
            let candidate = folder.join(format!("{stem}_{suffix}{ext}"));
            if self.used_destinations.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

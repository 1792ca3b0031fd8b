//! Link extraction from free-form text (the input file and CLI arguments).

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, trace};
use url::Url;

/// Maximum accepted URL length.
pub const MAX_URL_LENGTH: usize = 2000;

/// Matches http:// and https:// URLs up to whitespace or common delimiters.
#[allow(clippy::expect_used)]
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'\]]+"#).expect("URL regex is valid")
});

/// Extracts valid http(s) links from `text`.
///
/// Trailing sentence punctuation and unbalanced closing brackets are
/// trimmed. Invalid candidates are dropped. The result is deduplicated,
/// keeping first-seen order.
///
/// # Examples
///
/// ```
/// use bulkdl_core::input::extract_links;
///
/// let links = extract_links("see https://example.com/a.jpg, and https://example.com/a.jpg.");
/// assert_eq!(links, vec!["https://example.com/a.jpg".to_string()]);
/// ```
#[instrument(skip(text), fields(text_len = text.len()))]
#[must_use]
pub fn extract_links(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for candidate in URL_PATTERN.find_iter(text) {
        let cleaned = clean_url_trailing(candidate.as_str());
        trace!(url = %cleaned, "found URL candidate");

        let Some(normalized) = normalize_link(cleaned) else {
            debug!(url = %cleaned, "dropping invalid link");
            continue;
        };
        if seen.insert(normalized.clone()) {
            links.push(normalized);
        }
    }

    debug!(count = links.len(), "links extracted");
    links
}

fn clean_url_trailing(url: &str) -> &str {
    let mut result = url;

    while let Some(last) = result.chars().last() {
        match last {
            '.' | ',' | ';' | ':' | '!' | '?' => {
                result = &result[..result.len() - 1];
            }
            ')' | ']' => {
                // Keep balanced brackets such as Wikipedia-style paths.
                let open = if last == ')' { '(' } else { '[' };
                let open_count = result.chars().filter(|&c| c == open).count();
                let close_count = result.chars().filter(|&c| c == last).count();
                if close_count > open_count {
                    result = &result[..result.len() - 1];
                } else {
                    break;
                }
            }
            _ => break,
        }
    }

    result
}

fn normalize_link(raw: &str) -> Option<String> {
    if raw.len() > MAX_URL_LENGTH {
        return None;
    }
    let parsed = Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(parsed.into())
}

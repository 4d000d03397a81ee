//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use self::url::{NormalizedNovel, normalize_novel_url, resolve_url};

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

use crate::error::{AppError, Result};
use crate::models::NovelId;

/// Canonical identity extracted from a user-supplied novel URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedNovel {
    pub id: NovelId,
    pub canonical_url: String,
}

/// Extract the canonical novel id from either URL shape.
///
/// Accepts `.../book/<title-slug>_<id>` and `.../book/<id>`; query strings,
/// fragments and trailing segments such as `/catalog` are ignored. The host
/// must be the site of `base_url` or one of its subdomains.
///
/// # Examples
/// ```
/// use novel_notify::utils::url::normalize_novel_url;
///
/// let a = normalize_novel_url(
///     "https://www.webnovel.com/book/lord-of-the-mysteries_11022733006234505",
///     "https://www.webnovel.com",
/// ).unwrap();
/// let b = normalize_novel_url(
///     "https://www.webnovel.com/book/11022733006234505?from=share",
///     "https://www.webnovel.com",
/// ).unwrap();
///
/// assert_eq!(a, b);
/// assert_eq!(a.canonical_url, "https://www.webnovel.com/book/11022733006234505");
/// ```
pub fn normalize_novel_url(raw: &str, base_url: &str) -> Result<NormalizedNovel> {
    let trimmed = raw.trim();
    let parsed = parse_lenient(trimmed)?;

    let site = site_domain(base_url)?;
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if host != site && !host.ends_with(&format!(".{site}")) {
        return Err(AppError::invalid_url(
            trimmed,
            format!("host '{host}' is not {site}"),
        ));
    }

    let mut segments = parsed
        .path_segments()
        .ok_or_else(|| AppError::invalid_url(trimmed, "URL has no path"))?
        .skip_while(|segment| *segment != "book");

    if segments.next().is_none() {
        return Err(AppError::invalid_url(trimmed, "path has no 'book' segment"));
    }
    let book_segment = segments
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::invalid_url(trimmed, "nothing follows the 'book' segment"))?;

    let token = book_segment
        .rsplit_once('_')
        .map_or(book_segment, |(_, suffix)| suffix);

    let id = NovelId::parse_raw(token).map_err(|_| {
        AppError::invalid_url(trimmed, format!("'{token}' is not a numeric novel id"))
    })?;
    let canonical_url = id.canonical_url(base_url);

    Ok(NormalizedNovel { id, canonical_url })
}

/// Host of the configured site without a leading `www.`.
fn site_domain(base_url: &str) -> Result<String> {
    let base = Url::parse(base_url)?;
    let host = base
        .host_str()
        .ok_or_else(|| AppError::config(format!("base_url '{base_url}' has no host")))?
        .to_ascii_lowercase();
    Ok(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Parse a URL, tolerating a missing scheme.
fn parse_lenient(raw: &str) -> Result<Url> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}"))
            .map_err(|e| AppError::invalid_url(raw, e)),
        Err(e) => Err(AppError::invalid_url(raw, e)),
    }
}

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.webnovel.com";

    #[test]
    fn test_slug_and_bare_forms_agree() {
        let ids = ["12345", "900000000001"];
        for id in ids {
            let slug = normalize_novel_url(&format!("{BASE}/book/some-title_{id}"), BASE).unwrap();
            let bare = normalize_novel_url(&format!("{BASE}/book/{id}"), BASE).unwrap();
            let catalog =
                normalize_novel_url(&format!("{BASE}/book/{id}/catalog?x=1#top"), BASE).unwrap();

            assert_eq!(slug, bare);
            assert_eq!(bare, catalog);
            assert_eq!(bare.id.as_str(), id);
            assert_eq!(bare.canonical_url, format!("{BASE}/book/{id}"));
        }
    }

    #[test]
    fn test_slug_with_underscores_uses_last_token() {
        let n = normalize_novel_url(&format!("{BASE}/book/the_great_novel_777"), BASE).unwrap();
        assert_eq!(n.id.as_str(), "777");
    }

    #[test]
    fn test_missing_scheme_and_whitespace() {
        let n = normalize_novel_url("  www.webnovel.com/book/title_42  ", BASE).unwrap();
        assert_eq!(n.id.as_str(), "42");
    }

    #[test]
    fn test_rejects_non_book_paths() {
        for raw in [
            "https://www.webnovel.com/novel/123",
            "https://www.webnovel.com/",
            "https://www.webnovel.com/book",
            "https://www.webnovel.com/book/",
        ] {
            assert!(
                matches!(normalize_novel_url(raw, BASE), Err(AppError::InvalidUrl { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_non_numeric_id() {
        assert!(normalize_novel_url(&format!("{BASE}/book/some-title"), BASE).is_err());
        assert!(normalize_novel_url(&format!("{BASE}/book/title_12ab"), BASE).is_err());
        assert!(normalize_novel_url(&format!("{BASE}/book/title_"), BASE).is_err());
    }

    #[test]
    fn test_canonical_uses_configured_base() {
        let n = normalize_novel_url("https://mirror.test/book/title_55", "https://mirror.test/")
            .unwrap();
        assert_eq!(n.canonical_url, "https://mirror.test/book/55");
    }

    #[test]
    fn test_host_must_belong_to_site() {
        let mobile = normalize_novel_url("https://m.webnovel.com/book/title_55", BASE).unwrap();
        assert_eq!(mobile.canonical_url, format!("{BASE}/book/55"));
        assert!(normalize_novel_url("webnovel.com/book/55", BASE).is_ok());

        for raw in [
            "https://example.com/book/55",
            "https://notwebnovel.com/book/55",
            "https://webnovel.com.evil.test/book/55",
        ] {
            assert!(
                matches!(normalize_novel_url(raw, BASE), Err(AppError::InvalidUrl { .. })),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://www.webnovel.com/book/1/catalog").unwrap();
        assert_eq!(
            resolve_url(&base, "/book/1/2"),
            "https://www.webnovel.com/book/1/2"
        );
        assert_eq!(
            resolve_url(&base, "//www.webnovel.com/book/1/3"),
            "https://www.webnovel.com/book/1/3"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }
}

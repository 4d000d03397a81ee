// src/services/catalog.rs

//! Catalog page parser.
//!
//! Turns a raw catalog document into a [`CatalogSnapshot`] using the
//! configured [`CatalogSelectors`]. Parsing is pure: no I/O, no shared state.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CatalogSelectors, CatalogSnapshot, ChapterRef, NovelId};
use crate::utils::{normalize_whitespace, resolve_url};

const UNKNOWN_DATE: &str = "Unknown Date";

/// Compiled extraction rules for the catalog page.
#[derive(Debug)]
pub struct CatalogParser {
    title: Vec<Selector>,
    author: Vec<Selector>,
    cover: Vec<Selector>,
    cover_attr: String,
    intro: Vec<Selector>,
    intro_anchor: Vec<Selector>,
    intro_published: Vec<Selector>,
    volume: Vec<Selector>,
    chapter_item: Vec<Selector>,
    chapter_anchor: Selector,
    chapter_number: Selector,
    chapter_title: Selector,
    chapter_published: Selector,
    lock_icon: Selector,
    lock_marker: String,
    link_attr: String,
    number_pattern: Regex,
}

impl CatalogParser {
    /// Compile every selector up front so a bad config fails at startup.
    pub fn new(selectors: &CatalogSelectors) -> Result<Self> {
        Ok(Self {
            title: Self::parse_chain(&selectors.title)?,
            author: Self::parse_chain(&selectors.author)?,
            cover: Self::parse_chain(&selectors.cover)?,
            cover_attr: selectors.cover_attr.clone(),
            intro: Self::parse_chain(&selectors.intro)?,
            intro_anchor: Self::parse_chain(&selectors.intro_anchor)?,
            intro_published: Self::parse_chain(&selectors.intro_published)?,
            volume: Self::parse_chain(&selectors.volume)?,
            chapter_item: Self::parse_chain(&selectors.chapter_item)?,
            chapter_anchor: Self::parse_selector(&selectors.chapter_anchor)?,
            chapter_number: Self::parse_selector(&selectors.chapter_number)?,
            chapter_title: Self::parse_selector(&selectors.chapter_title)?,
            chapter_published: Self::parse_selector(&selectors.chapter_published)?,
            lock_icon: Self::parse_selector(&selectors.lock_icon)?,
            lock_marker: selectors.lock_marker.clone(),
            link_attr: selectors.link_attr.clone(),
            number_pattern: Regex::new(r"\d+").map_err(|e| AppError::config(e.to_string()))?,
        })
    }

    /// Parse a fetched catalog page.
    ///
    /// `page_url` is the catalog URL the document came from; relative links
    /// are resolved against it.
    pub fn parse(&self, novel_id: &NovelId, html: &str, page_url: &Url) -> Result<CatalogSnapshot> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = first_match(root, &self.title).map(text_of).unwrap_or_default();
        let author = first_match(root, &self.author).map(text_of).unwrap_or_default();
        let cover_url = first_match(root, &self.cover)
            .and_then(|img| img.value().attr(&self.cover_attr))
            .map(|src| resolve_url(page_url, src.trim()))
            .unwrap_or_default();

        if title.is_empty() {
            log::warn!("Could not extract novel title for {}", novel_id);
        }

        let (chapters, volume_count) = self.extract_chapters(root, page_url);

        let displayed_latest = match self.extract_intro_latest(root, page_url) {
            Some(latest) => reconcile_with_list(latest, &chapters),
            None => {
                log::debug!(
                    "No latest chapter in header for {}, falling back to chapter list",
                    novel_id
                );
                chapters
                    .last()
                    .cloned()
                    .ok_or_else(|| AppError::missing_latest_chapter(novel_id.as_str()))?
            }
        };

        log::debug!(
            "Parsed catalog for {}: {} chapters in {} volumes, latest '{}'",
            novel_id,
            chapters.len(),
            volume_count,
            displayed_latest.title
        );

        Ok(CatalogSnapshot {
            title,
            author,
            cover_url,
            displayed_latest,
            chapters,
            volume_count,
        })
    }

    /// Header region's highlighted chapter.
    fn extract_intro_latest(&self, root: ElementRef<'_>, page_url: &Url) -> Option<ChapterRef> {
        let container = first_match(root, &self.intro)?;
        let anchor = first_match(container, &self.intro_anchor)?;

        let title = text_of(anchor);
        if title.is_empty() {
            return None;
        }

        let url = anchor
            .value()
            .attr(&self.link_attr)
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| resolve_url(page_url, href))
            .unwrap_or_default();

        let published = first_match(container, &self.intro_published)
            .map(text_of)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        Some(ChapterRef::new(None, title, url).published(published))
    }

    /// Every chapter in document order, volumes flattened.
    fn extract_chapters(&self, root: ElementRef<'_>, page_url: &Url) -> (Vec<ChapterRef>, usize) {
        let volumes = all_matches(root, &self.volume);
        let containers = if volumes.is_empty() {
            vec![root]
        } else {
            volumes
        };

        let mut chapters = Vec::new();
        let mut skipped = 0usize;
        let mut volume_count = 0usize;

        for container in containers {
            let items = all_matches(container, &self.chapter_item);
            if items.is_empty() {
                continue;
            }
            volume_count += 1;

            for item in items {
                match self.parse_chapter_item(item, page_url) {
                    Some(chapter) => chapters.push(chapter),
                    None => skipped += 1,
                }
            }
        }

        if skipped > 0 {
            log::debug!("Skipped {} chapter entries without a link", skipped);
        }

        (chapters, volume_count)
    }

    fn parse_chapter_item(&self, item: ElementRef<'_>, page_url: &Url) -> Option<ChapterRef> {
        let anchor = item.select(&self.chapter_anchor).next()?;
        let href = anchor
            .value()
            .attr(&self.link_attr)
            .map(str::trim)
            .filter(|href| !href.is_empty())?;

        let number = anchor
            .select(&self.chapter_number)
            .next()
            .map(text_of)
            .and_then(|text| self.leading_number(&text));

        let title = anchor
            .select(&self.chapter_title)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| text_of(anchor));

        let published = anchor
            .select(&self.chapter_published)
            .next()
            .map(text_of)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());

        Some(
            ChapterRef::new(number, title, resolve_url(page_url, href))
                .locked(self.is_locked(anchor))
                .published(published),
        )
    }

    /// A lock glyph is an icon reference pointing at the lock symbol.
    fn is_locked(&self, anchor: ElementRef<'_>) -> bool {
        anchor.select(&self.lock_icon).any(|icon| {
            icon.value()
                .attrs()
                .any(|(name, value)| name.ends_with("href") && value.trim() == self.lock_marker)
        })
    }

    fn leading_number(&self, text: &str) -> Option<u32> {
        self.number_pattern
            .find(text)
            .and_then(|m| m.as_str().parse().ok())
    }

    fn parse_chain(chain: &[String]) -> Result<Vec<Selector>> {
        chain.iter().map(|s| Self::parse_selector(s)).collect()
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

/// First element matched by the first selector in the chain that matches at all.
fn first_match<'a>(scope: ElementRef<'a>, chain: &[Selector]) -> Option<ElementRef<'a>> {
    chain.iter().find_map(|sel| scope.select(sel).next())
}

/// All elements of the first selector in the chain that matches at all.
fn all_matches<'a>(scope: ElementRef<'a>, chain: &[Selector]) -> Vec<ElementRef<'a>> {
    chain
        .iter()
        .map(|sel| scope.select(sel).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

fn text_of(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Prefer the chapter list's version of the header chapter.
///
/// The header link rarely carries the numeric index or the lock glyph, so
/// without this the same chapter would compare as two different ones.
fn reconcile_with_list(latest: ChapterRef, chapters: &[ChapterRef]) -> ChapterRef {
    let by_url = (!latest.url.is_empty())
        .then(|| chapters.iter().rev().find(|c| c.url == latest.url))
        .flatten();
    let matched = by_url.or_else(|| chapters.iter().rev().find(|c| c.title == latest.title));

    match matched {
        Some(entry) => entry.clone(),
        None => latest,
    }
}

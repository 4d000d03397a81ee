//! Parsed catalog page.

use super::ChapterRef;

/// Structured view of one fetched catalog page.
///
/// Produced per fetch and never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub title: String,
    pub author: String,
    pub cover_url: String,

    /// Chapter highlighted in the page header
    pub displayed_latest: ChapterRef,

    /// Every chapter in reading order, volumes flattened
    pub chapters: Vec<ChapterRef>,

    /// Number of volume containers the chapters came from
    pub volume_count: usize,
}

impl CatalogSnapshot {
    /// Position of a chapter in reading order, matched by identity.
    pub fn position_of(&self, chapter: &ChapterRef) -> Option<usize> {
        self.chapters.iter().position(|c| c.same_identity(chapter))
    }

    /// Position of a chapter that may have been edited since it was stored.
    ///
    /// Tries full identity, then the URL, then the chapter number.
    pub fn locate(&self, chapter: &ChapterRef) -> Option<usize> {
        self.position_of(chapter)
            .or_else(|| {
                (!chapter.url.is_empty())
                    .then(|| self.chapters.iter().position(|c| c.url == chapter.url))
                    .flatten()
            })
            .or_else(|| {
                let number = chapter.number?;
                self.chapters.iter().position(|c| c.number == Some(number))
            })
    }
}

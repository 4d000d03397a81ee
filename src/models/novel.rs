//! Tracked novel identity and persisted state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ChapterRef;
use crate::error::{AppError, Result};

/// Opaque subscriber identifier owned by the front end.
pub type UserId = String;

/// Canonical numeric novel identifier, used as the primary key everywhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NovelId(String);

impl NovelId {
    /// Accept an already-extracted identifier (digits only).
    pub fn parse_raw(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::invalid_url(raw, "novel id must be numeric"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public book page, `{base}/book/{id}`.
    pub fn canonical_url(&self, base_url: &str) -> String {
        format!("{}/book/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// Catalog page listing every chapter, `{base}/book/{id}/catalog`.
    pub fn catalog_url(&self, base_url: &str) -> String {
        format!("{}/catalog", self.canonical_url(base_url))
    }
}

impl fmt::Display for NovelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for NovelId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse_raw(&value)
    }
}

impl From<NovelId> for String {
    fn from(id: NovelId) -> Self {
        id.0
    }
}

/// Last known state of a tracked novel.
///
/// Written only by that novel's own check; the store never merges records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NovelState {
    pub id: NovelId,
    pub canonical_url: String,

    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub cover_url: String,

    /// Chapter the diff engine last treated as authoritative
    #[serde(default)]
    pub last_effective_chapter: Option<ChapterRef>,

    /// Chapter the site header showed on the last successful check
    #[serde(default)]
    pub displayed_latest: Option<ChapterRef>,

    /// Site shows a newer chapter than the last free one
    #[serde(default)]
    pub has_paid_gap: bool,

    /// Chapters seen on the last successful check
    #[serde(default)]
    pub total_chapters: usize,

    /// Updated on every check attempt, success or failure
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub consecutive_failures: u32,

    pub created_at: DateTime<Utc>,
}

impl NovelState {
    /// Fresh record for a novel that has never been checked.
    pub fn new(id: NovelId, canonical_url: impl Into<String>) -> Self {
        Self {
            id,
            canonical_url: canonical_url.into(),
            title: String::new(),
            author: String::new(),
            cover_url: String::new(),
            last_effective_chapter: None,
            displayed_latest: None,
            has_paid_gap: false,
            total_chapters: 0,
            last_checked_at: None,
            last_success_at: None,
            consecutive_failures: 0,
            created_at: Utc::now(),
        }
    }

    /// True until the first successful check seeds the chapter baseline.
    pub fn is_unseeded(&self) -> bool {
        self.last_effective_chapter.is_none()
    }

    /// Title for display, falling back to the id.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            self.id.as_str()
        } else {
            &self.title
        }
    }
}

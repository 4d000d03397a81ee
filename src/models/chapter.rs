//! Chapter reference value type.

use serde::{Deserialize, Serialize};

/// A single chapter as listed on a catalog page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterRef {
    /// Numeric index shown next to the chapter, when the site provides one
    #[serde(default)]
    pub number: Option<u32>,

    /// Chapter title
    pub title: String,

    /// Absolute URL of the chapter page
    pub url: String,

    /// Whether the chapter sits behind the paywall
    #[serde(default)]
    pub locked: bool,

    /// Free-form publish text ("2 days ago", "Unknown Date", ...)
    #[serde(default)]
    pub published_label: String,
}

impl ChapterRef {
    pub fn new(number: Option<u32>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            url: url.into(),
            locked: false,
            published_label: String::new(),
        }
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn published(mut self, label: impl Into<String>) -> Self {
        self.published_label = label.into();
        self
    }

    /// Identity used for diffing: `(number, title, url)`.
    ///
    /// Lock state and publish label are presentation details and may change
    /// without the chapter becoming a different chapter.
    pub fn same_identity(&self, other: &ChapterRef) -> bool {
        self.number == other.number && self.title == other.title && self.url == other.url
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        match self.number {
            Some(n) => format!("#{} {}", n, self.title),
            None => self.title.clone(),
        }
    }
}

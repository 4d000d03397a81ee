//! Update event handed to the notification collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use super::{ChapterRef, NovelId};

const PAID_NOTE: &str = "Note: this novel has paid chapters; this is the latest free one.";

/// A new effective chapter was detected for a novel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateEvent {
    pub novel_id: NovelId,
    pub novel_title: String,
    #[serde(default)]
    pub novel_author: String,
    pub novel_url: String,
    pub previous_chapter: Option<ChapterRef>,
    pub new_chapter: ChapterRef,
    pub has_paid_gap: bool,
    pub detected_at: DateTime<Utc>,
}

impl UpdateEvent {
    /// Render the event with a template.
    ///
    /// Supported placeholders:
    /// - `{novel_id}`, `{novel_title}`, `{author}`, `{novel_url}`
    /// - `{chapter_title}`, `{chapter_url}`, `{chapter_kind}`, `{published}`
    /// - `{previous_title}`, `{paid_note}`
    ///
    /// The template is scanned once, so braces inside substituted values are
    /// never expanded. Unknown placeholders are kept verbatim. Chapter titles
    /// longer than `max_title_len` graphemes are cut with "...".
    pub fn format(&self, template: &str, max_title_len: usize) -> String {
        let mut out = String::with_capacity(template.len() + 64);
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open..];
            let Some(close) = after.find('}') else {
                break;
            };
            let key = &after[1..close];
            match self.placeholder(key, max_title_len) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&after[..=close]),
            }
            rest = &after[close + 1..];
        }
        // Whatever is left has no complete placeholder
        if let Some(open) = rest.find('{') {
            out.push_str(&rest[open..]);
        } else {
            out.push_str(rest);
        }
        out
    }

    fn placeholder(&self, key: &str, max_title_len: usize) -> Option<String> {
        let value = match key {
            "novel_id" => self.novel_id.to_string(),
            "novel_title" => self.novel_title.clone(),
            "author" => self.novel_author.clone(),
            "novel_url" => self.novel_url.clone(),
            "chapter_title" => truncate(&self.new_chapter.title, max_title_len),
            "chapter_url" => self.new_chapter.url.clone(),
            "chapter_kind" => {
                let kind = if self.new_chapter.locked { "Paid" } else { "Free" };
                kind.to_string()
            }
            "published" => self.new_chapter.published_label.clone(),
            "previous_title" => self
                .previous_chapter
                .as_ref()
                .map(|c| truncate(&c.title, max_title_len))
                .unwrap_or_default(),
            "paid_note" if self.has_paid_gap => PAID_NOTE.to_string(),
            "paid_note" => String::new(),
            _ => return None,
        };
        Some(value)
    }
}

fn truncate(text: &str, max_len: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if max_len < 4 || graphemes.len() <= max_len {
        return text.to_string();
    }
    format!("{}...", graphemes[..max_len - 3].concat())
}

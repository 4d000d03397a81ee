// src/models/selectors.rs

//! CSS selectors for scraping a catalog page.
//!
//! Every field is an ordered fallback chain: the first selector that matches
//! wins. Keeping them as data lets a markup change be handled from the config
//! file instead of code.

use serde::{Deserialize, Serialize};

/// Extraction rules for the catalog page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogSelectors {
    /// Novel title
    pub title: Vec<String>,

    /// Author name
    pub author: Vec<String>,

    /// Cover image element
    pub cover: Vec<String>,

    /// Attribute holding the cover image URL
    pub cover_attr: String,

    /// Header region showing the most recent chapter
    pub intro: Vec<String>,

    /// Link to the latest chapter inside the intro region
    pub intro_anchor: Vec<String>,

    /// Publish label inside the intro region
    pub intro_published: Vec<String>,

    /// Volume containers, in document order
    pub volume: Vec<String>,

    /// Chapter list items within a volume (or the whole page)
    pub chapter_item: Vec<String>,

    /// Link element of a chapter item
    pub chapter_anchor: String,

    /// Numeric index inside the chapter link
    pub chapter_number: String,

    /// Title element inside the chapter link (falls back to the link text)
    pub chapter_title: String,

    /// Publish label inside the chapter link
    pub chapter_published: String,

    /// Icon reference elements inside the chapter link
    pub lock_icon: String,

    /// Icon reference value that marks a locked chapter
    pub lock_marker: String,

    /// HTML attribute name for extracting links (usually "href")
    pub link_attr: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            title: strings(&["h1.auto_height", "h1"]),
            author: strings(&[
                "address .c_primary",
                "[data-test=\"author\"] a",
                ".author a",
                ".author-name",
            ]),
            cover: strings(&["div._sd img", ".book-cover img", ".cover img"]),
            cover_attr: "src".to_string(),
            intro: strings(&[".det-con-intro", ".latest-chapter", ".last-chapter"]),
            intro_anchor: strings(&["a.lst-chapter", "a"]),
            intro_published: strings(&["small.c_s", "small", ".date", ".time"]),
            volume: strings(&[".volume-item"]),
            chapter_item: strings(&[
                "ol.content-list > li",
                ".chapter-list li",
                ".content-list li",
                ".chapter-item",
            ]),
            chapter_anchor: "a".to_string(),
            chapter_number: "._num".to_string(),
            chapter_title: "strong".to_string(),
            chapter_published: "small".to_string(),
            lock_icon: "svg use".to_string(),
            lock_marker: "#i-lock".to_string(),
            link_attr: "href".to_string(),
        }
    }
}

impl CatalogSelectors {
    /// All selector strings, for validation.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.title
            .iter()
            .chain(&self.author)
            .chain(&self.cover)
            .chain(&self.intro)
            .chain(&self.intro_anchor)
            .chain(&self.intro_published)
            .chain(&self.volume)
            .chain(&self.chapter_item)
            .map(String::as_str)
            .chain([
                self.chapter_anchor.as_str(),
                self.chapter_number.as_str(),
                self.chapter_title.as_str(),
                self.chapter_published.as_str(),
                self.lock_icon.as_str(),
            ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let selectors: CatalogSelectors = toml::from_str(r#"title = ["h2.name"]"#).unwrap();
        assert_eq!(selectors.title, vec!["h2.name"]);
        assert_eq!(selectors.lock_marker, "#i-lock");
        assert_eq!(selectors.chapter_item.len(), 4);
    }

    #[test]
    fn test_all_lists_every_selector() {
        let selectors = CatalogSelectors::default();
        assert!(selectors.all().any(|s| s == "ol.content-list > li"));
        assert!(selectors.all().any(|s| s == "svg use"));
    }
}

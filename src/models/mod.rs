// src/models/mod.rs

//! Domain models for the novel watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod catalog;
mod chapter;
mod config;
mod event;
mod novel;
mod selectors;

// Re-export all public types
pub use catalog::CatalogSnapshot;
pub use chapter::ChapterRef;
pub use config::{Config, FetcherConfig, NotifyConfig, SchedulerConfig, StorageConfig};
pub use event::UpdateEvent;
pub use novel::{NovelId, NovelState, UserId};
pub use selectors::CatalogSelectors;

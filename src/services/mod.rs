//! Service layer for the novel watcher.
//!
//! This module contains the collaborators the check pipeline drives:
//! - Catalog fetching (`Fetcher`, `HttpFetcher`)
//! - Catalog parsing (`CatalogParser`)

mod catalog;
mod fetch;

pub use catalog::CatalogParser;
pub use fetch::{Fetcher, HttpFetcher};

//! Effective-latest chapter resolution.
//!
//! Notifications follow the last *free* chapter: announcing a chapter the
//! reader cannot open is worse than staying quiet until it unlocks.

use crate::models::{CatalogSnapshot, ChapterRef};

/// Chapter that drives notifications for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Last free chapter, or the displayed latest when nothing is free
    pub effective: ChapterRef,
    /// Displayed latest is ahead of the last free chapter (or unknown)
    pub has_paid_gap: bool,
    /// Index of `effective` in the snapshot's chapter list
    pub position: Option<usize>,
    /// The chapter list was empty; gap state is unknown
    pub catalog_empty: bool,
}

/// Pick the effective latest chapter of a snapshot.
pub fn resolve_effective_latest(snapshot: &CatalogSnapshot) -> Resolution {
    let displayed = &snapshot.displayed_latest;
    let last_free = snapshot
        .chapters
        .iter()
        .enumerate()
        .rev()
        .find(|(_, chapter)| !chapter.locked);

    match last_free {
        Some((position, chapter)) => Resolution {
            effective: chapter.clone(),
            has_paid_gap: !chapter.same_identity(displayed),
            position: Some(position),
            catalog_empty: false,
        },
        None => Resolution {
            effective: displayed.clone(),
            has_paid_gap: true,
            position: snapshot.position_of(displayed),
            catalog_empty: snapshot.chapters.is_empty(),
        },
    }
}

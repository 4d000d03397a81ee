//! Diff calculation for update notifications.
//!
//! Compares the freshly resolved effective chapter with the last persisted
//! one and decides whether subscribers should hear about it.

use chrono::Utc;

use super::resolve::Resolution;
use crate::models::{CatalogSnapshot, ChapterRef, NovelState, UpdateEvent};

/// Result of comparing a check against the stored baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOutcome {
    /// First successful check; the baseline is recorded without notifying
    Seeded,
    /// Effective chapter identity did not change
    Unchanged,
    /// A new effective chapter appeared
    Advanced(UpdateEvent),
    /// The new effective chapter sits earlier in the catalog than the stored
    /// one; adopted as the new baseline without notifying
    Regressed {
        previous: ChapterRef,
        current: ChapterRef,
    },
    /// The stored chapter is still in the same slot but was retitled,
    /// renumbered or moved to a new URL; adopted without notifying
    Reset {
        previous: ChapterRef,
        current: ChapterRef,
    },
}

/// Compare a resolved snapshot against the stored state of the same novel.
pub fn calculate_diff(
    state: &NovelState,
    snapshot: &CatalogSnapshot,
    resolution: &Resolution,
) -> DiffOutcome {
    let Some(previous) = state.last_effective_chapter.as_ref() else {
        return DiffOutcome::Seeded;
    };

    let current = &resolution.effective;
    if previous.same_identity(current) {
        return DiffOutcome::Unchanged;
    }

    if let (Some(prev_pos), Some(curr_pos)) = (snapshot.locate(previous), resolution.position) {
        let (previous, current) = (previous.clone(), current.clone());
        if curr_pos < prev_pos {
            return DiffOutcome::Regressed { previous, current };
        }
        if curr_pos == prev_pos {
            return DiffOutcome::Reset { previous, current };
        }
    }

    let novel_title = if snapshot.title.is_empty() {
        state.display_title().to_string()
    } else {
        snapshot.title.clone()
    };
    let novel_author = if snapshot.author.is_empty() {
        state.author.clone()
    } else {
        snapshot.author.clone()
    };

    DiffOutcome::Advanced(UpdateEvent {
        novel_id: state.id.clone(),
        novel_title,
        novel_author,
        novel_url: state.canonical_url.clone(),
        previous_chapter: Some(previous.clone()),
        new_chapter: current.clone(),
        has_paid_gap: resolution.has_paid_gap,
        detected_at: Utc::now(),
    })
}

//! Per-novel check: fetch, parse, resolve, diff, persist.
//!
//! A check never returns an error to its caller. Every failure is folded
//! into the [`CheckReport`] so one broken novel cannot abort a tick.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use super::diff::{DiffOutcome, calculate_diff};
use super::resolve::{Resolution, resolve_effective_latest};
use crate::error::{AppError, Result};
use crate::models::{CatalogSnapshot, NovelId, NovelState, UpdateEvent};
use crate::services::{CatalogParser, Fetcher};
use crate::storage::NovelStore;

/// Pipeline phase of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStage {
    Loading,
    Fetching,
    Parsing,
    Resolving,
    Diffing,
    Persisting,
}

impl fmt::Display for CheckStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Resolving => "resolving",
            Self::Diffing => "diffing",
            Self::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// First successful check recorded the baseline
    Seeded,
    Unchanged {
        paid_gap_changed: bool,
    },
    /// A new effective chapter was found; the report carries the event
    Updated,
    /// Effective chapter moved backwards and was adopted silently
    Regressed,
    /// Stored chapter was edited in place and adopted silently
    Reset,
    /// Nobody is subscribed, so nothing was recorded
    Untracked,
    Failed {
        stage: CheckStage,
        error: String,
        transient: bool,
    },
}

/// Result of checking one novel.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub novel_id: NovelId,
    pub outcome: CheckOutcome,
    /// Present only for [`CheckOutcome::Updated`]
    pub event: Option<UpdateEvent>,
    /// State as written back, if it could be loaded
    pub state: Option<NovelState>,
    pub checked_at: DateTime<Utc>,
}

/// Runs single-novel checks against shared collaborators.
pub struct NovelChecker {
    fetcher: Arc<dyn Fetcher>,
    store: Arc<dyn NovelStore>,
    parser: CatalogParser,
    base_url: String,
}

impl NovelChecker {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn NovelStore>,
        parser: CatalogParser,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            store,
            parser,
            base_url: base_url.into(),
        }
    }

    /// Check one novel and persist what was learned.
    ///
    /// Records are only written while the novel has subscribers; checking an
    /// untracked novel reports [`CheckOutcome::Untracked`] and leaves the
    /// store untouched.
    pub async fn check(&self, id: &NovelId) -> CheckReport {
        let checked_at = Utc::now();
        let report = |outcome, event, state| CheckReport {
            novel_id: id.clone(),
            outcome,
            event,
            state,
            checked_at,
        };

        enter(id, CheckStage::Loading);
        let mut state = match self.store.get_novel_state(id).await {
            Ok(Some(state)) => state,
            Ok(None) => NovelState::new(id.clone(), id.canonical_url(&self.base_url)),
            Err(e) => {
                log::error!("[{}] could not load state: {}", id, e);
                return report(failed(CheckStage::Loading, &e), None, None);
            }
        };

        let (snapshot, resolution) = match self.observe(id).await {
            Ok(observed) => observed,
            Err((stage, e)) => {
                if e.is_transient() {
                    log::warn!("[{}] check failed while {}: {}", id, stage, e);
                } else {
                    log::error!("[{}] check failed while {}: {}", id, stage, e);
                }
                state.last_checked_at = Some(checked_at);
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                match self.store.upsert_novel_state(&state).await {
                    Ok(true) => {}
                    Ok(false) => log::debug!("[{}] not tracked, failure not recorded", id),
                    Err(persist_err) => {
                        log::error!("[{}] could not record failure: {}", id, persist_err)
                    }
                }
                return report(failed(stage, &e), None, Some(state));
            }
        };

        enter(id, CheckStage::Diffing);
        let diff = calculate_diff(&state, &snapshot, &resolution);
        let paid_gap_changed = state.has_paid_gap != resolution.has_paid_gap;
        apply_snapshot(&mut state, &snapshot, &resolution, checked_at);

        enter(id, CheckStage::Persisting);
        match self.store.upsert_novel_state(&state).await {
            Ok(true) => {}
            Ok(false) => {
                log::info!("[{}] no subscribers, result not recorded", id);
                return report(CheckOutcome::Untracked, None, Some(state));
            }
            Err(e) => {
                log::error!("[{}] could not persist state, dropping result: {}", id, e);
                return report(failed(CheckStage::Persisting, &e), None, Some(state));
            }
        }

        let (outcome, event) = match diff {
            DiffOutcome::Seeded => {
                log::info!(
                    "[{}] baseline set to '{}'{}",
                    id,
                    resolution.effective.label(),
                    if resolution.has_paid_gap { " (paid gap)" } else { "" }
                );
                (CheckOutcome::Seeded, None)
            }
            DiffOutcome::Unchanged => {
                if paid_gap_changed {
                    log::info!("[{}] paid gap is now {}", id, resolution.has_paid_gap);
                } else {
                    log::debug!("[{}] no change", id);
                }
                (CheckOutcome::Unchanged { paid_gap_changed }, None)
            }
            DiffOutcome::Advanced(event) => {
                log::info!(
                    "[{}] new chapter '{}' (was '{}')",
                    id,
                    event.new_chapter.label(),
                    event
                        .previous_chapter
                        .as_ref()
                        .map(|c| c.label())
                        .unwrap_or_default()
                );
                (CheckOutcome::Updated, Some(event))
            }
            DiffOutcome::Regressed { previous, current } => {
                log::warn!(
                    "[{}] effective chapter went back from '{}' to '{}'; adopting silently",
                    id,
                    previous.label(),
                    current.label()
                );
                (CheckOutcome::Regressed, None)
            }
            DiffOutcome::Reset { previous, current } => {
                log::warn!(
                    "[{}] chapter '{}' now reads '{}'; adopting silently",
                    id,
                    previous.label(),
                    current.label()
                );
                (CheckOutcome::Reset, None)
            }
        };

        report(outcome, event, Some(state))
    }

    async fn observe(
        &self,
        id: &NovelId,
    ) -> std::result::Result<(CatalogSnapshot, Resolution), (CheckStage, AppError)> {
        let catalog_url = id.catalog_url(&self.base_url);

        enter(id, CheckStage::Fetching);
        let html = self
            .fetcher
            .fetch(&catalog_url)
            .await
            .map_err(|e| (CheckStage::Fetching, e))?;

        enter(id, CheckStage::Parsing);
        let snapshot = self
            .parse(id, &html, &catalog_url)
            .map_err(|e| (CheckStage::Parsing, e))?;

        enter(id, CheckStage::Resolving);
        let resolution = resolve_effective_latest(&snapshot);
        if resolution.catalog_empty {
            log::debug!("[{}] chapter list empty, treating gap as unknown", id);
        }
        Ok((snapshot, resolution))
    }

    fn parse(&self, id: &NovelId, html: &str, catalog_url: &str) -> Result<CatalogSnapshot> {
        let page_url = Url::parse(catalog_url)?;
        self.parser.parse(id, html, &page_url)
    }
}

fn enter(id: &NovelId, stage: CheckStage) {
    log::trace!("[{}] {}", id, stage);
}

fn failed(stage: CheckStage, error: &AppError) -> CheckOutcome {
    CheckOutcome::Failed {
        stage,
        error: error.to_string(),
        transient: error.is_transient(),
    }
}

/// Fold a successful observation into the stored record.
fn apply_snapshot(
    state: &mut NovelState,
    snapshot: &CatalogSnapshot,
    resolution: &Resolution,
    checked_at: DateTime<Utc>,
) {
    state.last_effective_chapter = Some(resolution.effective.clone());
    state.displayed_latest = Some(snapshot.displayed_latest.clone());
    state.has_paid_gap = resolution.has_paid_gap;
    state.total_chapters = snapshot.chapters.len();

    // Keep the last known metadata when a page comes back without it
    if !snapshot.title.is_empty() {
        state.title = snapshot.title.clone();
    }
    if !snapshot.author.is_empty() {
        state.author = snapshot.author.clone();
    }
    if !snapshot.cover_url.is_empty() {
        state.cover_url = snapshot.cover_url.clone();
    }

    state.last_checked_at = Some(checked_at);
    state.last_success_at = Some(checked_at);
    state.consecutive_failures = 0;
}

//! Storage abstractions for novel state and subscriptions.
//!
//! The check pipeline only reads and upserts one novel's record at a time,
//! keyed by [`NovelId`]; subscriptions decide which novels are tracked.
//! A novel record only exists while the novel has subscribers.
//!
//! ## Directory Structure (`LocalStorage`)
//!
//! ```text
//! storage/
//! ├── subscriptions.json    # novel id -> subscriber -> Subscription
//! └── novels/
//!     ├── 11022733006234505.json
//!     └── 24578013908265705.json
//! ```

pub mod local;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{ChapterRef, NovelId, NovelState, UserId};

// Re-export for convenience
pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Persistence collaborator.
#[async_trait]
pub trait NovelStore: Send + Sync {
    /// Novels with at least one subscriber.
    async fn list_tracked_novel_ids(&self) -> Result<BTreeSet<NovelId>>;

    async fn get_novel_state(&self, id: &NovelId) -> Result<Option<NovelState>>;

    /// Replace the stored record for `state.id` while the novel still has
    /// subscribers, atomically with respect to subscription changes.
    /// Returns false (and writes nothing) for an untracked novel.
    async fn upsert_novel_state(&self, state: &NovelState) -> Result<bool>;

    async fn list_subscribers(&self, id: &NovelId) -> Result<BTreeSet<UserId>>;

    /// Returns false when the subscription already existed. When the novel
    /// gains its first subscriber any leftover state is discarded, so the
    /// next check seeds silently.
    async fn add_subscription(&self, user: &UserId, id: &NovelId) -> Result<bool>;

    /// Returns false when there was nothing to remove. Dropping the last
    /// subscriber also deletes the novel's state.
    async fn remove_subscription(&self, user: &UserId, id: &NovelId) -> Result<bool>;

    async fn list_user_subscriptions(&self, user: &UserId) -> Result<Vec<NovelId>>;

    async fn get_subscription(&self, user: &UserId, id: &NovelId) -> Result<Option<Subscription>>;

    /// Remember the last chapter successfully sent to `user` for `id`.
    /// A subscription removed in the meantime is left alone.
    async fn record_delivery(
        &self,
        user: &UserId,
        id: &NovelId,
        chapter: &ChapterRef,
    ) -> Result<()>;
}

/// One user's subscription to one novel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub subscribed_at: DateTime<Utc>,
    /// Last chapter delivered to this user
    #[serde(default)]
    pub last_notified: Option<ChapterRef>,
}

/// Subscription index shared by the storage backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionTable {
    #[serde(default)]
    novels: BTreeMap<NovelId, BTreeMap<UserId, Subscription>>,
}

impl SubscriptionTable {
    /// Returns `(added, novel_newly_tracked)`.
    pub fn add(&mut self, user: &UserId, id: &NovelId) -> (bool, bool) {
        let newly_tracked = !self.is_tracked(id);
        let users = self.novels.entry(id.clone()).or_default();
        if users.contains_key(user) {
            return (false, false);
        }
        users.insert(
            user.clone(),
            Subscription {
                subscribed_at: Utc::now(),
                last_notified: None,
            },
        );
        (true, newly_tracked)
    }

    /// Returns `(removed, novel_now_orphaned)`.
    pub fn remove(&mut self, user: &UserId, id: &NovelId) -> (bool, bool) {
        let Some(users) = self.novels.get_mut(id) else {
            return (false, false);
        };
        let removed = users.remove(user).is_some();
        let orphaned = users.is_empty();
        if orphaned {
            self.novels.remove(id);
        }
        (removed, orphaned)
    }

    pub fn is_tracked(&self, id: &NovelId) -> bool {
        self.novels.get(id).is_some_and(|users| !users.is_empty())
    }

    pub fn tracked(&self) -> BTreeSet<NovelId> {
        self.novels
            .iter()
            .filter(|(_, users)| !users.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn subscribers(&self, id: &NovelId) -> BTreeSet<UserId> {
        self.novels
            .get(id)
            .map(|users| users.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn for_user(&self, user: &UserId) -> Vec<NovelId> {
        self.novels
            .iter()
            .filter(|(_, users)| users.contains_key(user))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn get(&self, user: &UserId, id: &NovelId) -> Option<&Subscription> {
        self.novels.get(id)?.get(user)
    }

    /// Returns false when the subscription no longer exists.
    pub fn record_delivery(&mut self, user: &UserId, id: &NovelId, chapter: &ChapterRef) -> bool {
        match self.novels.get_mut(id).and_then(|users| users.get_mut(user)) {
            Some(subscription) => {
                subscription.last_notified = Some(chapter.clone());
                true
            }
            None => false,
        }
    }
}

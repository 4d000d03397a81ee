//! In-memory storage backend.
//!
//! Holds everything behind one mutex; nothing is held across an await.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{ChapterRef, NovelId, NovelState, UserId};
use crate::storage::{NovelStore, Subscription, SubscriptionTable};

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<NovelId, NovelState>,
    subscriptions: SubscriptionTable,
}

/// Process-local store, used by tests and embedders without a disk.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::storage("memory storage lock poisoned"))
    }
}

#[async_trait]
impl NovelStore for MemoryStorage {
    async fn list_tracked_novel_ids(&self) -> Result<BTreeSet<NovelId>> {
        Ok(self.lock()?.subscriptions.tracked())
    }

    async fn get_novel_state(&self, id: &NovelId) -> Result<Option<NovelState>> {
        Ok(self.lock()?.states.get(id).cloned())
    }

    async fn upsert_novel_state(&self, state: &NovelState) -> Result<bool> {
        let mut inner = self.lock()?;
        if !inner.subscriptions.is_tracked(&state.id) {
            return Ok(false);
        }
        inner.states.insert(state.id.clone(), state.clone());
        Ok(true)
    }

    async fn list_subscribers(&self, id: &NovelId) -> Result<BTreeSet<UserId>> {
        Ok(self.lock()?.subscriptions.subscribers(id))
    }

    async fn add_subscription(&self, user: &UserId, id: &NovelId) -> Result<bool> {
        let mut inner = self.lock()?;
        let (added, newly_tracked) = inner.subscriptions.add(user, id);
        if newly_tracked {
            inner.states.remove(id);
        }
        Ok(added)
    }

    async fn remove_subscription(&self, user: &UserId, id: &NovelId) -> Result<bool> {
        let mut inner = self.lock()?;
        let (removed, orphaned) = inner.subscriptions.remove(user, id);
        if orphaned {
            inner.states.remove(id);
        }
        Ok(removed)
    }

    async fn list_user_subscriptions(&self, user: &UserId) -> Result<Vec<NovelId>> {
        Ok(self.lock()?.subscriptions.for_user(user))
    }

    async fn get_subscription(&self, user: &UserId, id: &NovelId) -> Result<Option<Subscription>> {
        Ok(self.lock()?.subscriptions.get(user, id).cloned())
    }

    async fn record_delivery(
        &self,
        user: &UserId,
        id: &NovelId,
        chapter: &ChapterRef,
    ) -> Result<()> {
        self.lock()?.subscriptions.record_delivery(user, id, chapter);
        Ok(())
    }
}

//! Local filesystem storage implementation.
//!
//! One JSON document per novel plus a single subscription index. Every write
//! goes through a temp file and a rename so a crash never leaves a torn
//! record behind.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── subscriptions.json    # Subscription index
//! └── novels/
//!     └── {novel_id}.json   # NovelState
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{ChapterRef, NovelId, NovelState, UserId};
use crate::storage::{NovelStore, Subscription, SubscriptionTable};

const SUBSCRIPTIONS_KEY: &str = "subscriptions.json";
const NOVELS_DIR: &str = "novels";

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    /// Serializes read-modify-write cycles on `subscriptions.json` and
    /// novel writes that depend on it.
    subscriptions_lock: Mutex<()>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            subscriptions_lock: Mutex::new(()),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    fn novel_key(id: &NovelId) -> String {
        format!("{NOVELS_DIR}/{id}.json")
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn load_subscriptions(&self) -> Result<SubscriptionTable> {
        Ok(self.read_json(SUBSCRIPTIONS_KEY).await?.unwrap_or_default())
    }
}

#[async_trait]
impl NovelStore for LocalStorage {
    async fn list_tracked_novel_ids(&self) -> Result<BTreeSet<NovelId>> {
        Ok(self.load_subscriptions().await?.tracked())
    }

    async fn get_novel_state(&self, id: &NovelId) -> Result<Option<NovelState>> {
        self.read_json(&Self::novel_key(id)).await
    }

    async fn upsert_novel_state(&self, state: &NovelState) -> Result<bool> {
        let _guard = self.subscriptions_lock.lock().await;
        if !self.load_subscriptions().await?.is_tracked(&state.id) {
            return Ok(false);
        }
        self.write_json(&Self::novel_key(&state.id), state).await?;
        Ok(true)
    }

    async fn list_subscribers(&self, id: &NovelId) -> Result<BTreeSet<UserId>> {
        Ok(self.load_subscriptions().await?.subscribers(id))
    }

    async fn add_subscription(&self, user: &UserId, id: &NovelId) -> Result<bool> {
        let _guard = self.subscriptions_lock.lock().await;
        let mut table = self.load_subscriptions().await?;
        let (added, newly_tracked) = table.add(user, id);
        if newly_tracked {
            // Leftovers from an earlier tracking period must not act as a baseline
            self.remove(&Self::novel_key(id)).await?;
        }
        if added {
            self.write_json(SUBSCRIPTIONS_KEY, &table).await?;
        }
        Ok(added)
    }

    async fn remove_subscription(&self, user: &UserId, id: &NovelId) -> Result<bool> {
        let _guard = self.subscriptions_lock.lock().await;
        let mut table = self.load_subscriptions().await?;
        let (removed, orphaned) = table.remove(user, id);
        if removed {
            self.write_json(SUBSCRIPTIONS_KEY, &table).await?;
        }
        if orphaned {
            log::info!("Novel {} has no subscribers left; dropping its state", id);
            self.remove(&Self::novel_key(id)).await?;
        }
        Ok(removed)
    }

    async fn list_user_subscriptions(&self, user: &UserId) -> Result<Vec<NovelId>> {
        Ok(self.load_subscriptions().await?.for_user(user))
    }

    async fn get_subscription(&self, user: &UserId, id: &NovelId) -> Result<Option<Subscription>> {
        Ok(self.load_subscriptions().await?.get(user, id).cloned())
    }

    async fn record_delivery(
        &self,
        user: &UserId,
        id: &NovelId,
        chapter: &ChapterRef,
    ) -> Result<()> {
        let _guard = self.subscriptions_lock.lock().await;
        let mut table = self.load_subscriptions().await?;
        if table.record_delivery(user, id, chapter) {
            self.write_json(SUBSCRIPTIONS_KEY, &table).await?;
        }
        Ok(())
    }
}

//! Append-only JSON-lines outbox.
//!
//! Each delivery becomes one line `{"user", "message", "event"}` that a
//! separate sender (chat bot, mailer) can tail and forward.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::Notifier;
use crate::error::Result;
use crate::models::{UpdateEvent, UserId};

#[derive(Serialize)]
struct OutboxEntry<'a> {
    user: &'a str,
    message: String,
    event: &'a UpdateEvent,
}

pub struct OutboxNotifier {
    path: PathBuf,
    template: String,
    max_title_len: usize,
    /// Keeps concurrent deliveries from interleaving partial lines.
    write_lock: Mutex<()>,
}

impl OutboxNotifier {
    pub fn new(path: impl AsRef<Path>, template: impl Into<String>, max_title_len: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            template: template.into(),
            max_title_len,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn notify(&self, user: &UserId, event: &UpdateEvent) -> Result<()> {
        let entry = OutboxEntry {
            user,
            message: event.format(&self.template, self.max_title_len),
            event,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChapterRef, NovelId};
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_appends_one_line_per_delivery() {
        let tmp = TempDir::new().unwrap();
        let notifier = OutboxNotifier::new(
            tmp.path().join("out/outbox.jsonl"),
            "{novel_title}: {chapter_title}",
            100,
        );
        let event = UpdateEvent {
            novel_id: NovelId::parse_raw("7").unwrap(),
            novel_title: "Shadow Slave".into(),
            novel_author: "Guiltythree".into(),
            novel_url: "https://www.webnovel.com/book/7".into(),
            previous_chapter: None,
            new_chapter: ChapterRef::new(Some(3), "Ch3", "https://www.webnovel.com/book/7/3"),
            has_paid_gap: false,
            detected_at: Utc::now(),
        };

        notifier.notify(&"alice".into(), &event).await.unwrap();
        notifier.notify(&"bob".into(), &event).await.unwrap();

        let text = std::fs::read_to_string(notifier.path()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["user"], "alice");
        assert_eq!(lines[1]["user"], "bob");
        assert_eq!(lines[0]["message"], "Shadow Slave: Ch3");
        assert_eq!(lines[0]["event"]["novel_id"], "7");
    }
}

//! Delivery of update events to subscribers.
//!
//! The core hands each [`UpdateEvent`] to a [`Notifier`] once per subscriber.
//! A failed delivery is logged and counted; it never rolls back the check
//! that produced the event.

pub mod log;
pub mod outbox;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NotifyConfig, UpdateEvent, UserId};

pub use self::log::LogNotifier;
pub use self::outbox::OutboxNotifier;

/// Per-event delivery outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers that accepted the event
    pub delivered_to: Vec<UserId>,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.delivered_to.len()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user: &UserId, event: &UpdateEvent) -> Result<()>;

    /// Send one event to every subscriber, isolating failures per user.
    async fn deliver(&self, event: &UpdateEvent, subscribers: &BTreeSet<UserId>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for user in subscribers {
            match self.notify(user, event).await {
                Ok(()) => report.delivered_to.push(user.clone()),
                Err(e) => {
                    ::log::warn!(
                        "[{}] notification to {} failed: {}",
                        event.novel_id,
                        user,
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Outbox file when configured, log lines otherwise.
pub fn build_notifier(config: &NotifyConfig) -> Arc<dyn Notifier> {
    match &config.outbox_file {
        Some(path) => Arc::new(OutboxNotifier::new(
            path,
            config.message_template.clone(),
            config.max_title_len,
        )),
        None => Arc::new(LogNotifier::new(
            config.message_template.clone(),
            config.max_title_len,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ChapterRef, NovelId};
    use chrono::Utc;

    struct RejectUser(&'static str);

    #[async_trait]
    impl Notifier for RejectUser {
        async fn notify(&self, user: &UserId, _event: &UpdateEvent) -> Result<()> {
            if user == self.0 {
                Err(AppError::validation("blocked"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_one_failed_subscriber_does_not_stop_the_rest() {
        let event = UpdateEvent {
            novel_id: NovelId::parse_raw("1").unwrap(),
            novel_title: "N".into(),
            novel_author: "A".into(),
            novel_url: "u".into(),
            previous_chapter: None,
            new_chapter: ChapterRef::new(Some(1), "Ch1", "u1"),
            has_paid_gap: false,
            detected_at: Utc::now(),
        };
        let users: BTreeSet<UserId> = ["alice", "bob", "carol"].map(String::from).into();

        let report = RejectUser("bob").deliver(&event, &users).await;
        assert_eq!(report.delivered_to, ["alice", "carol"]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered(), 2);
    }
}

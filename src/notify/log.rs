// src/notify/log.rs

use async_trait::async_trait;

use super::Notifier;
use crate::error::Result;
use crate::models::{UpdateEvent, UserId};

/// Writes each notification as an info log line.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    template: String,
    max_title_len: usize,
}

impl LogNotifier {
    pub fn new(template: impl Into<String>, max_title_len: usize) -> Self {
        Self {
            template: template.into(),
            max_title_len,
        }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user: &UserId, event: &UpdateEvent) -> Result<()> {
        let message = event.format(&self.template, self.max_title_len);
        log::info!("notify {}: {}", user, message.replace('\n', " | "));
        Ok(())
    }
}

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::CatalogSelectors;
use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Tick cadence and per-tick concurrency
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// HTTP fetching behavior
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Where novel state and subscriptions live
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification rendering and delivery
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Catalog extraction rules
    #[serde(default)]
    pub selectors: CatalogSelectors,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply `CHECK_INTERVAL`, `STORAGE_DIR` and `CORS_PROXY_URL` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("CHECK_INTERVAL") {
            match value.trim().parse::<u64>() {
                Ok(secs) => self.scheduler.check_interval_secs = secs,
                Err(e) => log::warn!("Ignoring CHECK_INTERVAL={:?}: {}", value, e),
            }
        }
        if let Some(dir) = lookup("STORAGE_DIR").filter(|d| !d.trim().is_empty()) {
            self.storage.root_dir = PathBuf::from(dir);
        }
        if let Some(proxy) = lookup("CORS_PROXY_URL") {
            let proxy = proxy.trim().to_string();
            self.fetcher.proxy_prefix = (!proxy.is_empty()).then_some(proxy);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.check_interval_secs == 0 {
            return Err(AppError::validation(
                "scheduler.check_interval_secs must be > 0",
            ));
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(AppError::validation("scheduler.max_concurrent must be > 0"));
        }
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        url::Url::parse(&self.fetcher.base_url)
            .map_err(|e| AppError::validation(format!("fetcher.base_url is invalid: {e}")))?;
        if self.selectors.intro.is_empty() && self.selectors.chapter_item.is_empty() {
            return Err(AppError::validation(
                "selectors.intro and selectors.chapter_item cannot both be empty",
            ));
        }
        if self.notify.message_template.trim().is_empty() {
            return Err(AppError::validation("notify.message_template is empty"));
        }
        Ok(())
    }
}

/// Tick cadence and bounded parallelism.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks
    #[serde(default = "defaults::check_interval")]
    pub check_interval_secs: u64,

    /// Maximum novels checked at the same time within a tick
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Pause after each novel check, in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Run a tick immediately on start instead of waiting one interval
    #[serde(default = "defaults::check_on_start")]
    pub check_on_start: bool,
}

impl SchedulerConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: defaults::check_interval(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
            check_on_start: defaults::check_on_start(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Site root used to build canonical URLs
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Prefix prepended to every fetched URL (CORS-style proxy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_prefix: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            proxy_prefix: None,
        }
    }
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::root_dir")]
    pub root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: defaults::root_dir(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// JSON-lines file the front end reads notifications from; log only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbox_file: Option<PathBuf>,

    /// Message template, see `UpdateEvent::format`
    #[serde(default = "defaults::message_template")]
    pub message_template: String,

    /// Longest chapter title rendered before truncation
    #[serde(default = "defaults::max_title_len")]
    pub max_title_len: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            outbox_file: None,
            message_template: defaults::message_template(),
            max_title_len: defaults::max_title_len(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Scheduler defaults
    pub fn check_interval() -> u64 {
        3600
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn check_on_start() -> bool {
        true
    }

    // Fetcher defaults
    pub fn base_url() -> String {
        "https://www.webnovel.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; novel-notify/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Storage defaults
    pub fn root_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    // Notify defaults
    pub fn message_template() -> String {
        concat!(
            "New chapter available!\n\n",
            "{novel_title}\n",
            "Author: {author}\n",
            "Latest {chapter_kind} chapter: {chapter_title}\n",
            "Published: {published}\n",
            "{novel_url}\n",
            "{paid_note}"
        )
        .into()
    }
    pub fn max_title_len() -> usize {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.check_interval(), Duration::from_secs(3600));
        assert!(config.notify.message_template.contains("Author: {author}"));
        assert_eq!(config.scheduler.max_concurrent, 5);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [scheduler]
            check_interval_secs = 600

            [fetcher]
            proxy_prefix = "https://proxy.example/"
            "#,
        )
        .unwrap();

        assert_eq!(config.scheduler.check_interval_secs, 600);
        assert_eq!(config.scheduler.max_concurrent, 5);
        assert_eq!(
            config.fetcher.proxy_prefix.as_deref(),
            Some("https://proxy.example/")
        );
        assert_eq!(config.fetcher.timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.scheduler.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = Config::default();
        config.fetcher.base_url = "not a url".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "CHECK_INTERVAL" => Some("120".into()),
            "STORAGE_DIR" => Some("/tmp/novels".into()),
            "CORS_PROXY_URL" => Some("".into()),
            _ => None,
        });

        assert_eq!(config.scheduler.check_interval_secs, 120);
        assert_eq!(config.storage.root_dir, PathBuf::from("/tmp/novels"));
        assert!(config.fetcher.proxy_prefix.is_none());
    }

    #[test]
    fn test_bad_interval_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "CHECK_INTERVAL").then(|| "hourly".to_string()));
        assert_eq!(config.scheduler.check_interval_secs, 3600);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/novel-notify.toml");
        assert_eq!(config.scheduler.check_interval_secs, 3600);
    }
}

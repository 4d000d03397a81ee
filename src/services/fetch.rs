// src/services/fetch.rs

//! Catalog page fetching.
//!
//! The core only needs `fetch(url) -> document`; transport, proxying and
//! headers stay behind the [`Fetcher`] trait.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::FetcherConfig;
use crate::utils::http::{create_async_client, proxied_url};

/// Fetch collaborator: returns the raw document or a transient failure.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    proxy_prefix: Option<String>,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            proxy_prefix: config.proxy_prefix.clone(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let target = proxied_url(self.proxy_prefix.as_deref(), url);
        log::debug!("Fetching {}", target);

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?
            .error_for_status()
            .map_err(|e| AppError::fetch(url, e))?;

        response.text().await.map_err(|e| AppError::fetch(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let config = FetcherConfig {
            timeout_secs: 2,
            ..FetcherConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();

        let err = fetcher
            .fetch("http://127.0.0.1:9/book/1/catalog")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
        assert!(err.is_transient());
    }
}

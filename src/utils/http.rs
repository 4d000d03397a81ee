// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::FetcherConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &FetcherConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Apply the optional proxy prefix to a target URL.
///
/// The proxy receives the full target URL appended to its own, e.g.
/// `https://proxy.example/https://www.webnovel.com/book/1/catalog`.
pub fn proxied_url(proxy_prefix: Option<&str>, url: &str) -> String {
    match proxy_prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}{url}"),
        _ => url.to_string(),
    }
}

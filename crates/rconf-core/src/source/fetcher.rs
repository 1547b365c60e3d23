//! Remote script fetching over HTTP.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use url::Url;

/// Fetches the content of a remote script.
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    /// Fetch the full body behind `url`.
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

/// [`ScriptFetcher`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with an optional per-request timeout.
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("rconf/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScriptFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
        if parsed.host_str().is_none_or(str::is_empty) {
            anyhow::bail!("Invalid URL: {} has no host", url);
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!(
                "Cannot GET file content: HTTP {} from {}",
                response.status(),
                url
            );
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;

        Ok(bytes.to_vec())
    }
}

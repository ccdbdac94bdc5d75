//! Source downloads.

use crate::error::{ErrorExt, PipelineError, Result};
use std::time::Duration;
use url::Url;

/// Capability to download a source archive.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    /// Return the full body at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url).await
    }
}

/// Downloads over HTTP(S) with `reqwest`; `file://` URLs are read from disk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::Generic(format!("HTTP client setup failed: {e}")))?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = Url::parse(url)
            .map_err(|e| PipelineError::Generic(format!("invalid source URL `{url}`: {e}")))?;

        if parsed.scheme() == "file" {
            let path = parsed
                .to_file_path()
                .map_err(|()| PipelineError::Generic(format!("invalid file URL `{url}`")))?;
            return tokio::fs::read(&path).await.fs_context("reading source", &path);
        }

        log::info!("Downloading {}", url);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PipelineError::Generic(format!("Download failed: {e}")))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Generic(format!("Failed to read response: {e}")))?;

        Ok(bytes.to_vec())
    }
}

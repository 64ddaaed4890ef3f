use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::ViewerError;

/// Retrieves the raw bytes behind a media address.
pub trait MediaFetcher: Send + Sync {
    fn fetch<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Arc<[u8]>, ViewerError>>;
}

pub fn is_remote(address: &str) -> bool {
    let lower = address.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Fetches `http(s)://` addresses over HTTP and everything else from disk.
pub struct SourceFetcher {
    client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(user_agent)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Arc<[u8]>, ViewerError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ViewerError::NetworkFailure(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ViewerError::NetworkFailure(format!(
                "HTTP status {} for {url}",
                resp.status()
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ViewerError::NetworkFailure(format!("failed to read {url}: {e}")))?;
        debug!(%url, len = bytes.len(), "fetched remote media");
        Ok(Arc::from(bytes.as_ref()))
    }

    async fn fetch_local(&self, address: &str) -> Result<Arc<[u8]>, ViewerError> {
        let path = Path::new(address.strip_prefix("file://").unwrap_or(address));
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ViewerError::NetworkFailure(format!("failed to read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), len = bytes.len(), "read local media");
        Ok(bytes.into())
    }
}

impl MediaFetcher for SourceFetcher {
    fn fetch<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Arc<[u8]>, ViewerError>> {
        Box::pin(async move {
            if is_remote(address) {
                self.fetch_remote(address.trim()).await
            } else {
                self.fetch_local(address.trim()).await
            }
        })
    }
}

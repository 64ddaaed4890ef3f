//! Shareable viewer links.
//!
//! Wraps a media URL into a viewer link (`<base>?url=<media>`) and asks a
//! shortening service for a compact alias. Whatever happens on the network,
//! the caller always ends up with a usable link.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://ulvis.net/api/v1/shorten";
pub const DEFAULT_VIEWER_BASE: &str = "https://stuffzez.github.io/PhoVid360/viewer";
pub const EMPTY_INPUT_MESSAGE: &str = "Please enter a video URL.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("invalid viewer base {base:?}: {detail}")]
    InvalidViewerBase { base: String, detail: String },
    #[error("shortening request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("shortening service response has no shortUrl")]
    MissingShortUrl,
}

/// Builds `<base>?url=<media>` with the media URL percent-encoded.
pub fn viewer_link(base: &str, media_url: &str) -> Result<String, ShortenError> {
    Url::parse_with_params(base, &[("url", media_url)])
        .map(String::from)
        .map_err(|err| ShortenError::InvalidViewerBase {
            base: base.to_string(),
            detail: err.to_string(),
        })
}

#[derive(Serialize)]
struct ShortenRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShortenResponse {
    #[serde(default)]
    short_url: Option<String>,
}

/// Result of [`LinkShortener::share`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareLink {
    Short { short: String, long: String },
    /// The service answered without a short link.
    Unshortened { long: String },
    /// The service could not be reached or answered garbage.
    Failed { long: String },
    /// Nothing to share.
    MissingInput,
}

impl ShareLink {
    /// The link to hand out, if any.
    pub fn link(&self) -> Option<&str> {
        match self {
            Self::Short { short, .. } => Some(short),
            Self::Unshortened { long } | Self::Failed { long } => Some(long),
            Self::MissingInput => None,
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Self::Short { .. })
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short { short, .. } => write!(f, "Your short link: {short}"),
            Self::Unshortened { long } => {
                write!(f, "Failed to shorten the URL. Here is the full link: {long}")
            }
            Self::Failed { long } => {
                write!(f, "Error generating short link. Here is the full link: {long}")
            }
            Self::MissingInput => f.write_str(EMPTY_INPUT_MESSAGE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkShortener {
    client: Client,
    endpoint: String,
    viewer_base: String,
}

impl LinkShortener {
    pub fn new(
        endpoint: impl Into<String>,
        viewer_base: impl Into<String>,
    ) -> Result<Self, ShortenError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("link-shortener/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            viewer_base: viewer_base.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POSTs `{"url": long_url}` and returns the service's `shortUrl`.
    /// The HTTP status is not checked; only the body decides.
    pub async fn shorten(&self, long_url: &str) -> Result<String, ShortenError> {
        let response: ShortenResponse = self
            .client
            .post(&self.endpoint)
            .json(&ShortenRequest { url: long_url })
            .send()
            .await?
            .json()
            .await?;
        response
            .short_url
            .filter(|s| !s.trim().is_empty())
            .ok_or(ShortenError::MissingShortUrl)
    }

    /// Builds the viewer link for `media_url` and tries to shorten it,
    /// falling back to the long link.
    pub async fn share(&self, media_url: &str) -> Result<ShareLink, ShortenError> {
        let media_url = media_url.trim();
        if media_url.is_empty() {
            return Ok(ShareLink::MissingInput);
        }
        let long = viewer_link(&self.viewer_base, media_url)?;
        let link = match self.shorten(&long).await {
            Ok(short) => {
                debug!(%short, "link shortened");
                ShareLink::Short { short, long }
            }
            Err(ShortenError::MissingShortUrl) => {
                warn!(endpoint = %self.endpoint, "no shortUrl in response");
                ShareLink::Unshortened { long }
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, error = %err, "shortening failed");
                ShareLink::Failed { long }
            }
        };
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_link_encodes_the_media_url() {
        let link = viewer_link(DEFAULT_VIEWER_BASE, "https://cdn.example/a b.mp4?x=1&y=2").unwrap();
        assert_eq!(
            link,
            "https://stuffzez.github.io/PhoVid360/viewer?url=https%3A%2F%2Fcdn.example%2Fa+b.mp4%3Fx%3D1%26y%3D2"
        );
    }

    #[test]
    fn viewer_link_rejects_a_relative_base() {
        assert!(matches!(
            viewer_link("viewer", "https://a.example/v.mp4"),
            Err(ShortenError::InvalidViewerBase { .. })
        ));
    }

    #[test]
    fn messages_match_each_outcome() {
        let long = "https://v.example/viewer?url=x".to_string();
        assert_eq!(
            ShareLink::Short { short: "https://s.example/1".into(), long: long.clone() }.to_string(),
            "Your short link: https://s.example/1"
        );
        assert_eq!(
            ShareLink::Unshortened { long: long.clone() }.to_string(),
            format!("Failed to shorten the URL. Here is the full link: {long}")
        );
        assert_eq!(
            ShareLink::Failed { long: long.clone() }.to_string(),
            format!("Error generating short link. Here is the full link: {long}")
        );
        assert_eq!(ShareLink::MissingInput.to_string(), "Please enter a video URL.");
        assert_eq!(ShareLink::MissingInput.link(), None);
    }

    #[tokio::test]
    async fn blank_input_never_hits_the_network() {
        let shortener = LinkShortener::new("http://127.0.0.1:9/", DEFAULT_VIEWER_BASE).unwrap();
        assert_eq!(shortener.share("   ").await.unwrap(), ShareLink::MissingInput);
    }
}

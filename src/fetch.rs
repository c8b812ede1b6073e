//! fetch.rs — retrieval of current content for a source.
//!
//! Isolates network/transport failures from detection logic: everything the
//! detector sees is already normalized text plus a fingerprint.

use std::time::Duration;

use anyhow::Result;

use crate::detect::{fingerprint, normalize_page};
use crate::error::FetchError;

/// Normalized content of one fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Normalized text, one line per text block.
    pub content: String,
    /// SHA-256 hex of `content`.
    pub fingerprint: String,
}

impl FetchedPage {
    /// Normalize a raw body into a page. An empty body after normalization
    /// is a transient-empty response, reported as `MalformedContent` so it
    /// never shows up as a spurious change.
    pub fn from_raw(raw: &str) -> Result<Self, FetchError> {
        let content = normalize_page(raw);
        if content.is_empty() {
            return Err(FetchError::MalformedContent);
        }
        let fingerprint = fingerprint(&content);
        Ok(Self {
            content,
            fingerprint,
        })
    }
}

/// Contract: fetch the current payload for a url, or fail with a typed
/// `FetchError`. No side effects beyond the network call; concurrent fetches
/// share no mutable state.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Production fetcher over reqwest with a bounded per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

fn map_reqwest_err(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}

#[async_trait::async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let body = resp.text().await.map_err(map_reqwest_err)?;
        FetchedPage::from_raw(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_empty_body() {
        assert!(matches!(
            FetchedPage::from_raw(""),
            Err(FetchError::MalformedContent)
        ));
        // markup with no text collapses to empty as well
        assert!(matches!(
            FetchedPage::from_raw("<html><body>  </body></html>"),
            Err(FetchError::MalformedContent)
        ));
    }

    #[test]
    fn from_raw_fingerprints_normalized_content() {
        let a = FetchedPage::from_raw("<p>Hello   world</p>").unwrap();
        let b = FetchedPage::from_raw("Hello world").unwrap();
        assert_eq!(a.content, "Hello world");
        assert_eq!(a.fingerprint, b.fingerprint);
    }
}

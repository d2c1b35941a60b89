//! Page acquisition, either over plain HTTP or through a headless browser.

use async_trait::async_trait;

mod browser;
mod http;

pub use browser::{BrowserFetcher, BrowserOptions};
pub use http::HttpFetcher;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for '{url}'")]
    Status { url: String, status: u16 },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("timed out after {0:?} fetching '{1}'")]
    Timeout(std::time::Duration, String),
}

/// Fetches the HTML of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Releases resources held by the fetcher.
    async fn shutdown(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

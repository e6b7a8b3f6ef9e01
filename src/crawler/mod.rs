//! Page fetching and candidate link discovery.
//!
//! `HttpFetcher` does plain HTTP first and escalates to a rendering
//! browser only when the response looks blocked or script-built.

#[cfg(feature = "browser")]
mod browser;
mod http;
pub mod links;

pub use http::HttpFetcher;
pub use links::{parse_page, score_link};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CrawledPage, DownloadedFile};

/// Errors from fetching and downloading.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Status(reqwest::StatusCode),

    #[error("download of {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },

    #[error("browser rendering failed: {0}")]
    Browser(String),
}

/// Fetches pages and downloads candidate files.
///
/// `fetch_page` is infallible by contract: unrecoverable failures come
/// back as an empty page so an attempt can move on to its remaining
/// candidates. `download` surfaces errors because the pipeline skips
/// individual failed candidates.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> CrawledPage;

    async fn download(&self, url: &str) -> Result<DownloadedFile, CrawlError>;
}

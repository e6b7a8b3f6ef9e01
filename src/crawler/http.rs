//! HTTP fetcher with browser escalation.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{links, CrawlError, Fetcher};
use crate::config::CrawlerConfig;
use crate::models::{CrawledPage, DownloadedFile, FileType};

/// Bodies shorter than this are assumed to be script shells or block
/// pages and trigger the browser fallback.
const MIN_USEFUL_BODY: usize = 512;

/// Real fetcher: reqwest first, chromium rendering as the escalation
/// path for hostile or script-heavy sites.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: CrawlerConfig,
}

impl HttpFetcher {
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client, config })
    }

    /// Plain HTTP fetch. Returns the body only when it looks like real
    /// page content.
    async fn fetch_http(&self, url: &str) -> Result<String, CrawlError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(CrawlError::Status(status));
        }

        let body = response.text().await?;
        Ok(body)
    }

    /// Whether the HTTP response warrants escalating to the browser.
    fn needs_browser(result: &Result<String, CrawlError>) -> bool {
        match result {
            Ok(body) => {
                body.len() < MIN_USEFUL_BODY
                    || (!body.contains("<a ") && !body.contains("<A "))
            }
            Err(CrawlError::Status(status)) => {
                *status == reqwest::StatusCode::FORBIDDEN
                    || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            Err(_) => false,
        }
    }

    #[cfg(feature = "browser")]
    async fn fetch_rendered(&self, url: &str) -> Option<String> {
        if !self.config.browser_fallback {
            return None;
        }
        match super::browser::render(&self.config, url).await {
            Ok(html) => Some(html),
            Err(e) => {
                warn!("Browser rendering failed for {}: {}", url, e);
                None
            }
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn fetch_rendered(&self, _url: &str) -> Option<String> {
        None
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> CrawledPage {
        if self.config.fetch_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.fetch_delay_ms)).await;
        }

        debug!("Fetching {}", url);
        let result = self.fetch_http(url).await;

        if Self::needs_browser(&result) {
            debug!("Escalating to browser for {}", url);
            if let Some(html) = self.fetch_rendered(url).await {
                return links::parse_page(url, &html);
            }
        }

        match result {
            Ok(body) => links::parse_page(url, &body),
            Err(e) => {
                warn!("Fetch failed for {}: {}", url, e);
                CrawledPage::empty(url)
            }
        }
    }

    async fn download(&self, url: &str) -> Result<DownloadedFile, CrawlError> {
        if self.config.fetch_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.fetch_delay_ms)).await;
        }

        debug!("Downloading {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::Status(status));
        }

        if let Some(length) = response.content_length() {
            if length > self.config.max_download_bytes {
                return Err(CrawlError::TooLarge {
                    url: url.to_string(),
                    limit: self.config.max_download_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let content = response.bytes().await?.to_vec();
        if content.len() as u64 > self.config.max_download_bytes {
            return Err(CrawlError::TooLarge {
                url: url.to_string(),
                limit: self.config.max_download_bytes,
            });
        }

        let file_type = FileType::from_url(url)
            .or_else(|| content_type.as_deref().and_then(FileType::from_content_type));

        Ok(DownloadedFile {
            url: url.to_string(),
            content,
            file_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_bodies_need_browser() {
        let result: Result<String, CrawlError> = Ok("<html></html>".to_string());
        assert!(HttpFetcher::needs_browser(&result));
    }

    #[test]
    fn linkful_bodies_do_not_need_browser() {
        let body = format!(
            "<html><body>{}<a href=\"/prices\">Prices</a></body></html>",
            "x".repeat(600)
        );
        let result: Result<String, CrawlError> = Ok(body);
        assert!(!HttpFetcher::needs_browser(&result));
    }

    #[test]
    fn forbidden_needs_browser() {
        let result: Result<String, CrawlError> =
            Err(CrawlError::Status(reqwest::StatusCode::FORBIDDEN));
        assert!(HttpFetcher::needs_browser(&result));

        let not_found: Result<String, CrawlError> =
            Err(CrawlError::Status(reqwest::StatusCode::NOT_FOUND));
        assert!(!HttpFetcher::needs_browser(&not_found));
    }
}

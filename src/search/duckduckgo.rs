//! DuckDuckGo HTML search, the keyless fallback provider.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;

use super::{SearchError, SearchProvider};
use crate::models::SearchHit;

const DDG_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Search provider scraping DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
    max_results: usize,
}

impl DuckDuckGoProvider {
    pub fn new(max_results: usize) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            max_results,
        })
    }

    /// Parse search results from the HTML response.
    fn parse_results(&self, html: &str) -> Result<Vec<SearchHit>, SearchError> {
        let document = Html::parse_document(html);

        // Results are <a class="result__a">, snippets <a class="result__snippet">
        let result_selector = Selector::parse("div.result").map_err(selector_error)?;
        let link_selector = Selector::parse("a.result__a").map_err(selector_error)?;
        let snippet_selector = Selector::parse("a.result__snippet").map_err(selector_error)?;

        let mut hits = Vec::new();

        for block in document.select(&result_selector) {
            let Some(anchor) = block.select(&link_selector).next() else {
                continue;
            };
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(url) = extract_url(href) else {
                continue;
            };

            let title = Some(anchor.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty());
            let snippet = block
                .select(&snippet_selector)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty());

            hits.push(SearchHit {
                position: hits.len() + 1,
                title,
                url,
                snippet,
            });

            if hits.len() >= self.max_results {
                break;
            }
        }

        debug!("Parsed {} results from DuckDuckGo", hits.len());
        Ok(hits)
    }
}

fn selector_error(e: scraper::error::SelectorErrorKind<'_>) -> SearchError {
    SearchError::Parse(format!("failed to parse selector: {e:?}"))
}

/// Unwrap DuckDuckGo's redirect URL to the real target.
fn extract_url(href: &str) -> Option<String> {
    if href.starts_with("//duckduckgo.com/l/") || href.starts_with("/l/") {
        // Redirect form: //duckduckgo.com/l/?uddg=<encoded_url>&...
        let uddg_start = href.find("uddg=")?;
        let encoded = &href[uddg_start + 5..];
        let end = encoded.find('&').unwrap_or(encoded.len());
        urlencoding::decode(&encoded[..end])
            .ok()
            .map(|s| s.into_owned())
    } else if href.starts_with("http://") || href.starts_with("https://") {
        Some(href.to_string())
    } else if href.starts_with("//") {
        Some(format!("https:{href}"))
    } else {
        None
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        debug!("DuckDuckGo search: {}", query);

        let response = self
            .client
            .post(DDG_SEARCH_URL)
            .form(&[("q", query), ("kl", "us-en")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Unavailable(format!(
                "DuckDuckGo returned {}",
                response.status()
            )));
        }

        let html = response.text().await?;
        self.parse_results(&html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_direct_url() {
        assert_eq!(
            extract_url("https://example.org/charges.csv"),
            Some("https://example.org/charges.csv".to_string())
        );
    }

    #[test]
    fn extract_protocol_relative_url() {
        assert_eq!(
            extract_url("//example.org/charges.csv"),
            Some("https://example.org/charges.csv".to_string())
        );
    }

    #[test]
    fn extract_redirect_url() {
        let href = "//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.org%2Fprices&rut=abc";
        assert_eq!(
            extract_url(href),
            Some("https://example.org/prices".to_string())
        );
    }

    #[test]
    fn reject_relative_url() {
        assert_eq!(extract_url("/settings"), None);
    }

    #[test]
    fn parse_results_from_html() {
        let provider = DuckDuckGoProvider::new(10).unwrap();
        let html = r#"
            <div class="result">
              <a class="result__a" href="https://example.org/price-transparency">Price Transparency | Example Hospital</a>
              <a class="result__snippet" href="https://example.org/price-transparency">View our standard charges.</a>
            </div>
            <div class="result">
              <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fother.org%2Fcdm">Chargemaster</a>
            </div>
        "#;

        let hits = provider.parse_results(html).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://example.org/price-transparency");
        assert_eq!(hits[0].snippet.as_deref(), Some("View our standard charges."));
        assert_eq!(hits[1].url, "https://other.org/cdm");
        assert_eq!(hits[1].position, 2);
    }
}

//! Google search via the SerpAPI JSON endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{SearchError, SearchProvider};
use crate::models::SearchHit;

const SERPAPI_URL: &str = "https://serpapi.com/search.json";

/// SerpAPI-backed Google search.
pub struct SerpApiProvider {
    client: reqwest::Client,
    api_key: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    related_questions: Vec<RelatedQuestion>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    position: Option<usize>,
    title: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelatedQuestion {
    question: Option<String>,
    link: Option<String>,
    snippet: Option<String>,
}

impl SerpApiProvider {
    pub fn new(api_key: String, max_results: usize) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_key,
            max_results,
        })
    }
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        debug!("SerpAPI search: {}", query);

        let num = self.max_results.to_string();
        let response = self
            .client
            .get(SERPAPI_URL)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("num", &num),
                ("api_key", &self.api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Unavailable(format!(
                "SerpAPI returned {}",
                response.status()
            )));
        }

        let body: SerpApiResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(SearchError::Unavailable(error));
        }

        let mut hits = Vec::new();
        for (i, result) in body.organic_results.into_iter().enumerate() {
            let Some(url) = result.link else { continue };
            hits.push(SearchHit {
                position: result.position.unwrap_or(i + 1),
                title: result.title,
                url,
                snippet: result.snippet,
            });
        }

        // Related questions often surface the disclosure page directly;
        // fold them in after the organic results.
        for (i, question) in body.related_questions.into_iter().enumerate() {
            let Some(url) = question.link else { continue };
            hits.push(SearchHit {
                position: 100 + i + 1,
                title: question.question,
                url,
                snippet: question.snippet,
            });
        }

        hits.truncate(self.max_results);
        debug!("SerpAPI returned {} hits", hits.len());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_organic_and_related_results() {
        let raw = r#"{
            "organic_results": [
                {"position": 1, "title": "Price Transparency", "link": "https://example.org/prices", "snippet": "Standard charges"}
            ],
            "related_questions": [
                {"question": "Where is the machine readable file?", "link": "https://example.org/mrf"}
            ]
        }"#;

        let body: SerpApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.organic_results.len(), 1);
        assert_eq!(body.related_questions.len(), 1);
        assert_eq!(
            body.organic_results[0].link.as_deref(),
            Some("https://example.org/prices")
        );
    }

    #[test]
    fn parses_error_body() {
        let raw = r#"{"error": "Invalid API key"}"#;
        let body: SerpApiResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.error.as_deref(), Some("Invalid API key"));
        assert!(body.organic_results.is_empty());
    }
}

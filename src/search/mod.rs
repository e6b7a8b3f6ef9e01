//! Web search providers.
//!
//! Both providers speak the same `SearchProvider` trait so the pipeline
//! never branches on which engine is behind it.

mod duckduckgo;
mod query;
mod serpapi;

pub use duckduckgo::DuckDuckGoProvider;
pub use query::{hospital_queries, QueryBuilder};
pub use serpapi::SerpApiProvider;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SearchConfig;
use crate::models::SearchHit;

/// Errors from a search provider.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search engine unavailable: {0}")]
    Unavailable(String),

    #[error("failed to parse results: {0}")]
    Parse(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),
}

/// A web search engine.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name, for logs.
    fn name(&self) -> &str;

    /// Run one query, returning hits in ranked order.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

/// Build the configured provider. SerpAPI requires an API key; without
/// one the keyless DuckDuckGo scraper is the fallback.
pub fn build_provider(config: &SearchConfig) -> Result<Arc<dyn SearchProvider>, SearchError> {
    match config.provider.as_str() {
        "serpapi" => {
            let key = config.serpapi_key.clone().ok_or_else(|| {
                SearchError::MissingCredentials(
                    "SERPAPI_KEY is not set but provider is serpapi".to_string(),
                )
            })?;
            Ok(Arc::new(SerpApiProvider::new(key, config.max_results)?))
        }
        "duckduckgo" => Ok(Arc::new(DuckDuckGoProvider::new(config.max_results)?)),
        other => Err(SearchError::Unavailable(format!(
            "unknown search provider: {other}"
        ))),
    }
}

//! Runtime configuration.
//!
//! Settings load from an optional TOML file; every field has a serde
//! default so an empty or missing file yields a working configuration.
//! Credentials come from the environment only (`SERPAPI_KEY`), never
//! from the file or the source tree.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub database_url: Option<String>,
    pub search: SearchConfig,
    pub crawler: CrawlerConfig,
    pub validator: ValidatorConfig,
    pub matcher: MatcherConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

impl Settings {
    /// Load settings from a TOML file, or defaults when `path` is None.
    /// `SERPAPI_KEY` from the environment fills in the search key.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str(&raw)?
            }
            None => Self::default(),
        };

        if settings.search.serpapi_key.is_none() {
            settings.search.serpapi_key = std::env::var("SERPAPI_KEY").ok();
        }

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// "serpapi" or "duckduckgo".
    pub provider: String,
    /// Never set in a config file that gets committed; the environment
    /// variable `SERPAPI_KEY` is the usual source.
    pub serpapi_key: Option<String>,
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: "duckduckgo".to_string(),
            serpapi_key: None,
            max_results: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Pause between fetches against the same host.
    pub fetch_delay_ms: u64,
    /// Downloads larger than this are abandoned.
    pub max_download_bytes: u64,
    /// Whether the browser fallback may be used at all.
    pub browser_fallback: bool,
    /// How long the browser waits for the network to go idle.
    pub browser_wait_ms: u64,
    /// Bounded scroll passes to trigger lazy-loaded content.
    pub max_scrolls: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            timeout_secs: 30,
            fetch_delay_ms: 500,
            max_download_bytes: 100 * 1024 * 1024,
            browser_fallback: true,
            browser_wait_ms: 3000,
            max_scrolls: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Files larger than this are rejected outright.
    pub max_file_bytes: u64,
    /// Minimum data rows for a delimited file to stand on its own.
    pub min_rows: usize,
    /// Rows sampled when probing cells for currency values.
    pub sample_rows: usize,
    /// Minimum size for a binary/spreadsheet file to be plausible.
    pub min_binary_bytes: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 100 * 1024 * 1024,
            min_rows: 10,
            sample_rows: 100,
            min_binary_bytes: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Similarity ratio for a long name variant to count as present.
    pub similarity_threshold: f64,
    /// Deterministic confidence at or below which the semantic judge
    /// is consulted.
    pub semantic_review_threshold: f32,
    /// Semantic confidence required to override a deterministic verdict.
    pub override_threshold: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
            semantic_review_threshold: 0.9,
            override_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// How much of the file sample is sent to the model.
    pub sample_chars: usize,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            sample_chars: 3000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Search result pages crawled per hospital.
    pub top_pages: usize,
    /// Candidate links considered per crawled page.
    pub max_candidates_per_page: usize,
    /// Files downloaded per hospital before giving up.
    pub max_downloads: usize,
    /// Match confidence above which the pipeline stops early.
    pub high_confidence: f32,
    /// Token overlap for facility-name prioritization of candidates.
    pub facility_overlap: f64,
    /// Concurrent hospitals in a batch run.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_pages: 3,
            max_candidates_per_page: 10,
            max_downloads: 5,
            high_confidence: 0.9,
            facility_overlap: 0.4,
            concurrency: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.search.provider, "duckduckgo");
        assert_eq!(settings.validator.min_rows, 10);
        assert_eq!(settings.pipeline.concurrency, 5);
    }

    #[test]
    fn partial_override() {
        let settings: Settings = toml::from_str(
            r#"
            [search]
            provider = "serpapi"
            max_results = 20

            [validator]
            min_rows = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.search.provider, "serpapi");
        assert_eq!(settings.search.max_results, 20);
        assert_eq!(settings.validator.min_rows, 5);
        // Untouched sections keep defaults.
        assert_eq!(settings.validator.sample_rows, 100);
        assert!(settings.crawler.browser_fallback);
    }
}

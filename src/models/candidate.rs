//! Ephemeral types produced during one discovery attempt.
//!
//! None of these are persisted; only the resulting `PriceFile`
//! survives an attempt.

use chrono::{DateTime, Utc};

use super::FileType;

/// One ranked result from a search provider.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Rank within the provider's response (1-based).
    pub position: usize,
    pub title: Option<String>,
    pub url: String,
    pub snippet: Option<String>,
}

/// A link found on a crawled page, scored for price-file likelihood.
#[derive(Debug, Clone)]
pub struct CandidateLink {
    /// Absolute, normalized URL.
    pub url: String,
    /// Anchor text.
    pub text: String,
    /// Inferred file type, when the URL path ends in a data extension.
    pub file_type: Option<FileType>,
    /// Relevance score in [0, 1].
    pub score: f32,
    /// Facility name this link was listed under, when found inside a
    /// facility-specific disclosure list.
    pub facility_name: Option<String>,
}

impl CandidateLink {
    pub fn is_file(&self) -> bool {
        self.file_type.is_some()
    }
}

/// A fetched and parsed page.
#[derive(Debug, Clone)]
pub struct CrawledPage {
    pub url: String,
    /// Raw HTML as fetched.
    pub content: String,
    /// Plain text with scripts/navigation stripped.
    pub text_content: String,
    /// Candidate links sorted by score descending, deduplicated by URL.
    pub links: Vec<CandidateLink>,
    pub crawled_at: DateTime<Utc>,
}

impl CrawledPage {
    /// An empty page for unrecoverable fetch failures, so callers can
    /// continue with their remaining candidates.
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: String::new(),
            text_content: String::new(),
            links: Vec::new(),
            crawled_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.links.is_empty()
    }
}

/// A downloaded candidate file, held in memory until validation and
/// matching decisions are recorded.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub url: String,
    pub content: Vec<u8>,
    pub file_type: Option<FileType>,
}

impl DownloadedFile {
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

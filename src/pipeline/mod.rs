//! The discovery pipeline: search, crawl, download, validate, match.

mod batch;

pub use batch::{batch_process, BatchSummary};

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::crawler::Fetcher;
use crate::llm::SemanticJudge;
use crate::matcher::{token_overlap, HospitalMatcher, MatchVerdict};
use crate::models::{CandidateLink, Hospital, PriceFile, SearchStatus};
use crate::search::{hospital_queries, SearchProvider};
use crate::tracker::{StatusTracker, TrackerError};
use crate::validator::{FileValidator, Validation};

/// How much of a file is handed to the matcher as text.
const MATCH_SAMPLE_BYTES: usize = 100 * 1024;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("all search queries failed: {0}")]
    SearchFailed(String),
}

/// Outcome of one discovery attempt.
enum Discovery {
    Confirmed(PriceFile),
    /// Every query ran but produced no usable hits.
    NoResults,
    /// Candidates existed but none validated and matched.
    NoMatch,
}

/// A candidate that survived validation and matching.
struct ConfirmedFile {
    url: String,
    file_type: String,
    file_size: i64,
    validation: Validation,
    verdict: MatchVerdict,
}

/// One discovery pipeline wired to its external seams.
pub struct Pipeline {
    provider: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn Fetcher>,
    validator: FileValidator,
    matcher: HospitalMatcher,
    judge: Option<Arc<dyn SemanticJudge>>,
    tracker: StatusTracker,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn Fetcher>,
        validator: FileValidator,
        matcher: HospitalMatcher,
        judge: Option<Arc<dyn SemanticJudge>>,
        tracker: StatusTracker,
        config: PipelineConfig,
    ) -> Self {
        Self {
            provider,
            fetcher,
            validator,
            matcher,
            judge,
            tracker,
            config,
        }
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Run one full attempt for a hospital, recording every transition.
    pub async fn process(&self, hospital: &Hospital) -> Result<SearchStatus, TrackerError> {
        info!("Searching for price file: {} ({})", hospital.name, hospital.state);
        self.tracker.begin_attempt(&hospital.id).await?;

        match self.discover(hospital).await {
            Ok(Discovery::Confirmed(file)) => {
                info!(
                    "Found price file for {}: {} (confidence {:.2})",
                    hospital.name, file.url, file.validation_score
                );
                self.tracker.mark_success(&file).await?;
                Ok(SearchStatus::Found)
            }
            Ok(Discovery::NoResults) => {
                info!("No search results for {}", hospital.name);
                self.tracker
                    .mark_failure(&hospital.id, "no search results")
                    .await?;
                Ok(SearchStatus::NotFound)
            }
            Ok(Discovery::NoMatch) => {
                info!("No price file found for {}", hospital.name);
                self.tracker
                    .mark_failure(&hospital.id, "no validated candidate matched")
                    .await?;
                Ok(SearchStatus::NotFound)
            }
            Err(e) => {
                warn!("Search errored for {}: {}", hospital.name, e);
                self.tracker.mark_error(&hospital.id, &e.to_string()).await?;
                Ok(SearchStatus::Error)
            }
        }
    }

    /// Discovery for one hospital: best confirmed file, if any.
    pub async fn find_price_file(
        &self,
        hospital: &Hospital,
    ) -> Result<Option<PriceFile>, PipelineError> {
        Ok(match self.discover(hospital).await? {
            Discovery::Confirmed(file) => Some(file),
            Discovery::NoResults | Discovery::NoMatch => None,
        })
    }

    async fn discover(&self, hospital: &Hospital) -> Result<Discovery, PipelineError> {
        let (page_urls, direct_files) = self.run_searches(hospital).await?;

        if page_urls.is_empty() && direct_files.is_empty() {
            return Ok(Discovery::NoResults);
        }

        let mut best: Option<ConfirmedFile> = None;
        let mut downloads = 0usize;
        let mut tried: HashSet<String> = HashSet::new();

        // Direct file hits from the search engine skip the crawl.
        for url in direct_files {
            if downloads >= self.config.max_downloads {
                break;
            }
            let candidate = CandidateLink {
                url: url.clone(),
                text: String::new(),
                file_type: crate::models::FileType::from_url(&url),
                score: 0.5,
                facility_name: None,
            };
            if tried.insert(url) {
                downloads += 1;
                self.try_candidate(hospital, &candidate, &mut best).await;
                if self.is_decisive(&best) {
                    return Ok(self.conclude(hospital, best));
                }
            }
        }

        let mut queue: Vec<String> = page_urls;
        let mut visited = 0usize;
        let max_pages = self.config.top_pages + 3;

        while let Some(page_url) = queue.first().cloned() {
            queue.remove(0);
            if visited >= max_pages || downloads >= self.config.max_downloads {
                break;
            }
            visited += 1;

            let page = self.fetcher.fetch_page(&page_url).await;
            if page.is_empty() {
                continue;
            }

            let candidates = self.prioritize(hospital, page.links);

            for candidate in candidates.iter().take(self.config.max_candidates_per_page) {
                if candidate.is_file() {
                    if downloads >= self.config.max_downloads
                        || !tried.insert(candidate.url.clone())
                    {
                        continue;
                    }
                    downloads += 1;
                    self.try_candidate(hospital, candidate, &mut best).await;
                    if self.is_decisive(&best) {
                        return Ok(self.conclude(hospital, best));
                    }
                } else if candidate.score > 0.0
                    && queue.len() + visited < max_pages
                    && !tried.contains(&candidate.url)
                {
                    // Keyword-bearing directory link, worth one hop.
                    queue.push(candidate.url.clone());
                }
            }
        }

        Ok(self.conclude(hospital, best))
    }

    fn conclude(&self, hospital: &Hospital, best: Option<ConfirmedFile>) -> Discovery {
        match best {
            Some(confirmed) => Discovery::Confirmed(self.to_price_file(hospital, confirmed)),
            None => Discovery::NoMatch,
        }
    }

    /// Run the hospital's queries, splitting hits into pages to crawl
    /// and direct file URLs.
    async fn run_searches(
        &self,
        hospital: &Hospital,
    ) -> Result<(Vec<String>, Vec<String>), PipelineError> {
        let mut pages: Vec<String> = Vec::new();
        let mut files: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut last_error: Option<String> = None;
        let mut any_success = false;

        for query in hospital_queries(hospital) {
            match self.provider.search(&query).await {
                Ok(hits) => {
                    any_success = true;
                    for hit in hits {
                        if !seen.insert(hit.url.clone()) {
                            continue;
                        }
                        if crate::models::FileType::from_url(&hit.url).is_some() {
                            files.push(hit.url);
                        } else {
                            pages.push(hit.url);
                        }
                    }
                }
                Err(e) => {
                    warn!("Query '{}' failed: {}", query, e);
                    last_error = Some(e.to_string());
                }
            }
            if pages.len() >= self.config.top_pages {
                break;
            }
        }

        if !any_success {
            return Err(PipelineError::SearchFailed(
                last_error.unwrap_or_else(|| "no queries ran".to_string()),
            ));
        }

        pages.truncate(self.config.top_pages);
        Ok((pages, files))
    }

    /// Order candidates: facility-name overlap with this hospital
    /// first, then score.
    fn prioritize(&self, hospital: &Hospital, mut links: Vec<CandidateLink>) -> Vec<CandidateLink> {
        links.sort_by(|a, b| {
            let a_facility = self.facility_matches(hospital, a);
            let b_facility = self.facility_matches(hospital, b);
            b_facility
                .cmp(&a_facility)
                .then(b.score.total_cmp(&a.score))
        });
        links
    }

    fn facility_matches(&self, hospital: &Hospital, link: &CandidateLink) -> bool {
        link.facility_name
            .as_deref()
            .map(|f| token_overlap(f, &hospital.name) >= self.config.facility_overlap)
            .unwrap_or(false)
    }

    /// Download, validate and match one candidate, folding it into the
    /// best-of accumulator. Failures only cost the attempt.
    async fn try_candidate(
        &self,
        hospital: &Hospital,
        candidate: &CandidateLink,
        best: &mut Option<ConfirmedFile>,
    ) {
        let file = match self.fetcher.download(&candidate.url).await {
            Ok(file) => file,
            Err(e) => {
                debug!("Download failed for {}: {}", candidate.url, e);
                return;
            }
        };

        let validation = self.validator.validate(&file.content, file.file_type);
        if !validation.valid {
            debug!("Rejected {}: {}", candidate.url, validation.notes);
            return;
        }

        let sample = match_sample(&file.content, candidate.facility_name.as_deref());
        let verdict = self
            .matcher
            .validate(&sample, hospital, self.judge.as_deref())
            .await;
        if !verdict.is_match {
            debug!("No identity match for {}: {}", candidate.url, verdict.reasoning);
            return;
        }

        let confirmed = ConfirmedFile {
            url: file.url.clone(),
            file_type: file
                .file_type
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| "csv".to_string()),
            file_size: file.size() as i64,
            validation,
            verdict,
        };

        let better = best
            .as_ref()
            .map_or(true, |b| confirmed.verdict.confidence > b.verdict.confidence);
        if better {
            *best = Some(confirmed);
        }
    }

    fn is_decisive(&self, best: &Option<ConfirmedFile>) -> bool {
        best.as_ref()
            .map(|b| b.verdict.confidence > self.config.high_confidence)
            .unwrap_or(false)
    }

    fn to_price_file(&self, hospital: &Hospital, confirmed: ConfirmedFile) -> PriceFile {
        let mut file = PriceFile::new(&hospital.id, &confirmed.url, crate::models::FileType::Csv);
        file.file_type = confirmed.file_type;
        file.validated = true;
        file.validation_score = confirmed.verdict.confidence;
        file.validation_notes = Some(format!(
            "{}; {}",
            confirmed.validation.notes, confirmed.verdict.reasoning
        ));
        file.file_size = Some(confirmed.file_size);
        file.contains_prices = confirmed.validation.contains_prices;
        file.contains_hospital_name =
            confirmed.verdict.is_match && confirmed.verdict.confidence >= 0.8;
        file
    }
}

/// Text sample for identity matching. The facility name the link was
/// listed under counts as evidence too.
fn match_sample(content: &[u8], facility_name: Option<&str>) -> String {
    let body = String::from_utf8_lossy(&content[..content.len().min(MATCH_SAMPLE_BYTES)]);
    match facility_name {
        Some(facility) => format!("{facility}\n{body}"),
        None => body.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_includes_facility_name() {
        let sample = match_sample(b"code,charge\n1,2\n", Some("Mercy Hospital South"));
        assert!(sample.starts_with("Mercy Hospital South\n"));
        assert!(sample.contains("code,charge"));
    }

    #[test]
    fn sample_is_bounded() {
        let content = vec![b'a'; MATCH_SAMPLE_BYTES * 2];
        let sample = match_sample(&content, None);
        assert_eq!(sample.len(), MATCH_SAMPLE_BYTES);
    }
}

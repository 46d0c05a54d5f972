//! Care research orchestrator
//!
//! Collects `min_sources` validated care sources for one species.
//!
//! Query templates are tried in order, most specific first. For every search
//! hit the document text is fetched (falling back to the search snippet when
//! the page yields too little), run through the structured extractor and
//! checked by the source validator. Research stops as soon as the quorum is
//! reached; exhausting every template below quorum is a terminal failure.
//!
//! Per-document problems (fetch timeout, extractor error, rejected source) are
//! logged and skipped. Once a URL is accepted, or rejected on its content, later
//! templates skip it, so a page returned by several templates never counts
//! twice. A URL that only failed transiently is tried again if it reappears.

use crate::extractors::html_to_text;
use crate::models::{CareSourceRecord, ResearchConfig};
use crate::types::{
    CareExtractor, ContentFetcher, PipelineError, SearchHit, SearchProvider, SpeciesRef,
};
use crate::validators::SourceValidator;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Receives each source as soon as it is accepted
///
/// An error aborts research; the session driver uses this to stop when the
/// session disappears mid-run.
#[async_trait]
pub trait ResearchObserver: Send {
    async fn source_accepted(&mut self, source: &CareSourceRecord) -> Result<(), PipelineError>;
}

/// Observer that ignores progress
pub struct NoopObserver;

#[async_trait]
impl ResearchObserver for NoopObserver {
    async fn source_accepted(&mut self, _source: &CareSourceRecord) -> Result<(), PipelineError> {
        Ok(())
    }
}

/// What became of one search hit
enum HitOutcome {
    Accepted(CareSourceRecord),
    /// Content was read and is unusable; not worth another attempt
    Rejected,
    /// Fetch timeout, empty fetch or extractor error
    Transient,
}

/// Care research orchestrator
pub struct ResearchOrchestrator {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn ContentFetcher>,
    extractor: Arc<dyn CareExtractor>,
    validator: SourceValidator,
    config: ResearchConfig,
}

impl ResearchOrchestrator {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn ContentFetcher>,
        extractor: Arc<dyn CareExtractor>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            search,
            fetcher,
            extractor,
            validator: SourceValidator::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Research `species` until the source quorum is met
    ///
    /// Returns exactly `min_sources` records in acceptance order.
    ///
    /// # Errors
    /// - `InsufficientSources` when every template is exhausted below quorum
    /// - any error returned by `observer`
    pub async fn research(
        &self,
        species: &SpeciesRef,
        observer: &mut dyn ResearchObserver,
    ) -> Result<Vec<CareSourceRecord>, PipelineError> {
        let required = self.config.min_sources;
        let mut accepted: Vec<CareSourceRecord> = Vec::with_capacity(required);
        let mut settled: HashSet<String> = HashSet::new();

        for (index, template) in self.config.query_templates.iter().enumerate() {
            let query = render_query(template, species);
            info!(
                species = %species.scientific_name,
                strategy = index + 1,
                query = %query,
                "Searching for care sources"
            );

            let hits = match self
                .search
                .search(&query, self.config.max_results_per_query)
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed, trying next strategy");
                    continue;
                }
            };

            for hit in hits.into_iter().take(self.config.max_results_per_query) {
                let key = normalize_url(&hit.url);
                if settled.contains(&key) {
                    debug!(url = %hit.url, "Skipping already evaluated URL");
                    continue;
                }

                let record = match self.evaluate(&hit, species).await {
                    HitOutcome::Accepted(record) => record,
                    HitOutcome::Rejected => {
                        settled.insert(key);
                        continue;
                    }
                    HitOutcome::Transient => continue,
                };
                settled.insert(key);

                observer.source_accepted(&record).await?;
                accepted.push(record);
                info!(
                    url = %hit.url,
                    accepted = accepted.len(),
                    required,
                    "Care source accepted"
                );

                if accepted.len() >= required {
                    return Ok(accepted);
                }
            }
        }

        warn!(
            species = %species.scientific_name,
            found = accepted.len(),
            required,
            "Research exhausted all strategies below quorum"
        );
        Err(PipelineError::InsufficientSources {
            found: accepted.len(),
            required,
        })
    }

    /// Fetch, extract and validate one hit
    async fn evaluate(&self, hit: &SearchHit, species: &SpeciesRef) -> HitOutcome {
        let text = match self.document_text(hit).await {
            Ok(text) => text,
            Err(outcome) => return outcome,
        };

        let extraction = match self.extractor.extract(&text, species).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!(url = %hit.url, error = %e, "Care extraction failed");
                return HitOutcome::Transient;
            }
        };

        let verdict = self.validator.validate(&extraction);
        if !verdict.passed() {
            debug!(url = %hit.url, issues = ?verdict.issues, "Care source rejected");
            return HitOutcome::Rejected;
        }

        HitOutcome::Accepted(CareSourceRecord::from_extraction(
            source_name(hit),
            Some(hit.url.clone()),
            extraction,
        ))
    }

    /// Page text, or the snippet when the page is unusable
    ///
    /// When neither is usable the error tells whether the page was read
    /// (`Rejected`) or never arrived (`Transient`).
    async fn document_text(&self, hit: &SearchHit) -> Result<String, HitOutcome> {
        let text = match tokio::time::timeout(
            self.config.fetch_timeout(),
            self.fetcher.fetch_text(&hit.url),
        )
        .await
        {
            Ok(text) => text,
            Err(_) => {
                warn!(
                    url = %hit.url,
                    timeout_secs = self.config.fetch_timeout_secs,
                    "Document fetch timed out"
                );
                String::new()
            }
        };

        let text = if text.trim().chars().count() >= self.config.min_text_length {
            text
        } else {
            let snippet = html_to_text(&hit.snippet);
            if snippet.chars().count() < self.config.min_snippet_length {
                debug!(url = %hit.url, "Document and snippet too short, skipping");
                return Err(if text.trim().is_empty() {
                    HitOutcome::Transient
                } else {
                    HitOutcome::Rejected
                });
            }
            debug!(url = %hit.url, "Using search snippet in place of document text");
            snippet
        };

        Ok(truncate_chars(text, self.config.max_text_length))
    }
}

/// Substitute `{species}` and `{scientific_name}` into a query template
pub fn render_query(template: &str, species: &SpeciesRef) -> String {
    template
        .replace("{species}", species.common_name.trim())
        .replace("{scientific_name}", species.scientific_name.trim())
}

/// URL identity for duplicate suppression: no fragment, no trailing slash
pub fn normalize_url(url: &str) -> String {
    let without_fragment = url.trim().split('#').next().unwrap_or_default();
    without_fragment.trim_end_matches('/').to_string()
}

/// Human-readable source name: the host without `www.`, else the page title
fn source_name(hit: &SearchHit) -> String {
    reqwest::Url::parse(&hit.url)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| hit.title.trim().to_string())
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text,
    }
}

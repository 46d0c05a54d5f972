//! Capability clients
//!
//! Concrete implementations of the capability traits in `types`:
//! 1. **vision_classifier** - OpenAI-compatible vision model → species vote
//! 2. **care_extractor** - OpenAI-compatible text model → typed care record
//! 3. **web_search** - Brave web search → ranked hits
//! 4. **content_fetcher** - HTTP GET + HTML to text
//!
//! # Parallel Classification
//! All classifiers run concurrently for each photo. A failing provider does not
//! block the others; its error is logged and reported alongside the votes.

pub mod care_extractor;
pub mod content_fetcher;
pub mod openai_client;
pub mod vision_classifier;
pub mod web_search;

pub use care_extractor::OpenAiCareExtractor;
pub use content_fetcher::{html_to_text, HttpContentFetcher};
pub use openai_client::ChatCompletionsClient;
pub use vision_classifier::OpenAiVisionClassifier;
pub use web_search::BraveSearchClient;

use crate::types::{CapabilityError, Classifier, IdentificationVote, ImageRef};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of asking one provider
#[derive(Debug)]
pub struct ClassificationOutcome {
    pub provider: String,
    pub result: Result<IdentificationVote, CapabilityError>,
}

/// Parallel classifier executor
///
/// Fans the same photo out to every configured provider and waits for all of
/// them. Results come back in provider order.
///
/// # Example
/// ```rust,ignore
/// use pcare_ai::extractors::ParallelClassifier;
///
/// let classifiers: Vec<Arc<dyn Classifier>> = vec![
///     Arc::new(OpenAiVisionClassifier::new(client_a)),
///     Arc::new(OpenAiVisionClassifier::new(client_b)),
/// ];
///
/// let executor = ParallelClassifier::new(classifiers);
/// let votes = executor.collect_votes(&ImageRef::new(url)).await;
/// ```
#[derive(Clone)]
pub struct ParallelClassifier {
    classifiers: Vec<Arc<dyn Classifier>>,
}

impl ParallelClassifier {
    pub fn new(classifiers: Vec<Arc<dyn Classifier>>) -> Self {
        Self { classifiers }
    }

    /// Query all providers concurrently, keeping per-provider results
    pub async fn classify_all(&self, image: &ImageRef) -> Vec<ClassificationOutcome> {
        let futures = self.classifiers.iter().map(|classifier| {
            let classifier = Arc::clone(classifier);
            async move {
                let provider = classifier.name().to_string();
                let result = classifier.classify(image).await;
                match &result {
                    Ok(vote) => debug!(
                        provider = %provider,
                        species = %vote.common_name,
                        confidence = vote.confidence,
                        "Classification successful"
                    ),
                    Err(e) => warn!(
                        provider = %provider,
                        error = %e,
                        "Classification failed"
                    ),
                }
                ClassificationOutcome { provider, result }
            }
        });

        join_all(futures).await
    }

    /// Query all providers and keep only the votes
    pub async fn collect_votes(&self, image: &ImageRef) -> Vec<IdentificationVote> {
        self.classify_all(image)
            .await
            .into_iter()
            .filter_map(|outcome| outcome.result.ok())
            .collect()
    }

    /// Get classifier count
    pub fn count(&self) -> usize {
        self.classifiers.len()
    }
}

// ============================================================================
// Mock Classifier for Testing
// ============================================================================


// ============================================================================
// Tests
// ============================================================================

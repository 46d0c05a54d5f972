//! Core Types and Capability Traits for pcare-ai
//!
//! Defines the typed boundary between the pipeline and its external collaborators:
//! - **Classification:** `Classifier` (one instance per provider)
//! - **Research:** `SearchProvider`, `ContentFetcher`, `CareExtractor`
//! - **Persistence:** `PlantStore` (finished-record creator)
//!
//! Every capability returns a typed value or a typed `CapabilityError`. Raw model
//! output is parsed inside the capability client, never by the orchestrators.

use crate::models::SunlightLevel;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Common Types
// ============================================================================

/// Reference to the photo being identified
///
/// `url` may be an `http(s)://` URL, a `data:` URL, or a local file path
/// (optionally prefixed with `file://`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Species being researched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesRef {
    pub common_name: String,
    pub scientific_name: String,
}

impl SpeciesRef {
    pub fn new(common_name: impl Into<String>, scientific_name: impl Into<String>) -> Self {
        Self {
            common_name: common_name.into(),
            scientific_name: scientific_name.into(),
        }
    }
}

// ============================================================================
// Classification Capability
// ============================================================================

/// One provider's species guess
///
/// Providers report "Unknown Plant" with confidence 0 when the photo does not
/// show a plant; that is a vote, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationVote {
    /// Provider that produced this vote
    pub provider: String,
    pub common_name: String,
    pub scientific_name: String,
    /// Confidence score (0.0-1.0)
    pub confidence: f64,
    pub reasoning: String,
}

impl IdentificationVote {
    /// Create a vote with confidence clamped to 0.0-1.0
    pub fn new(
        provider: impl Into<String>,
        common_name: impl Into<String>,
        scientific_name: impl Into<String>,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            common_name: common_name.into(),
            scientific_name: scientific_name.into(),
            confidence: if confidence.is_nan() {
                0.0
            } else {
                confidence.clamp(0.0, 1.0)
            },
            reasoning: reasoning.into(),
        }
    }
}

/// Image classification backend
///
/// Several independent classifiers are queried concurrently per session; see
/// `extractors::ParallelClassifier`.
#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    /// Provider name for vote provenance
    fn name(&self) -> &str;

    /// Classify the plant in the image
    async fn classify(&self, image: &ImageRef) -> Result<IdentificationVote, CapabilityError>;
}

// ============================================================================
// Research Capabilities
// ============================================================================

/// Ranked web search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Web search backend
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Run a query, returning at most `limit` ranked hits (possibly none)
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CapabilityError>;
}

/// Document text retrieval
///
/// Returns cleaned plain text, or an empty string when the document could not
/// be fetched or converted. Failures are logged by the implementation.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> String;
}

/// One care field as reported by the structured extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField<T> {
    pub value: T,
    /// Whether the document states this field explicitly
    pub present: bool,
    /// Extractor confidence for this field (0.0-1.0)
    pub confidence: f64,
}

impl<T> ExtractedField<T> {
    pub fn new(value: T, present: bool, confidence: f64) -> Self {
        Self {
            value,
            present,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Typed care recommendation extracted from one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareExtraction {
    pub watering_days: ExtractedField<u32>,
    pub fertilizing_days: ExtractedField<u32>,
    pub sunlight_level: ExtractedField<SunlightLevel>,
    pub humidity: ExtractedField<String>,
    pub temperature_range: ExtractedField<String>,
    pub care_notes: String,
    /// Overall confidence that this document describes the target species
    pub confidence: f64,
}

impl CareExtraction {
    /// Number of the five trackable fields marked present
    pub fn fields_present(&self) -> usize {
        [
            self.watering_days.present,
            self.fertilizing_days.present,
            self.sunlight_level.present,
            self.humidity.present,
            self.temperature_range.present,
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// Structured care extraction backend
#[async_trait::async_trait]
pub trait CareExtractor: Send + Sync {
    /// Extract care parameters for `species` from free text
    async fn extract(
        &self,
        text: &str,
        species: &SpeciesRef,
    ) -> Result<CareExtraction, CapabilityError>;
}

// ============================================================================
// Finished-Record Creator
// ============================================================================

/// Fields of a finished plant record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPlant {
    pub session_id: Uuid,
    pub common_name: String,
    pub scientific_name: String,
    pub identification_confidence: Option<f64>,
    pub image_url: String,
    pub profile: crate::models::CareProfile,
}

/// Store that turns a confirmed care profile into a permanent record
#[async_trait::async_trait]
pub trait PlantStore: Send + Sync {
    /// Create the record and return its identifier
    async fn create_plant(&self, plant: NewPlant) -> pcare_common::Result<Uuid>;
}

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single capability call
///
/// Always recoverable at the pipeline level: the caller skips the provider or
/// document and continues.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Call exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// External API returned an error status
    #[error("API error: {0}")]
    Api(String),

    /// Response did not match the expected schema
    #[error("Parse error: {0}")]
    Parse(String),

    /// Capability is missing required configuration (e.g. API key)
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// Local I/O failure (e.g. reading an image file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for CapabilityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CapabilityError::Timeout(err.to_string())
        } else if err.is_decode() {
            CapabilityError::Parse(err.to_string())
        } else {
            CapabilityError::Network(err.to_string())
        }
    }
}

/// Fusion error
#[derive(Debug, Error)]
pub enum FusionError {
    /// Insufficient data to perform fusion
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

/// Terminal pipeline failure
///
/// The `Display` text of the first three variants is stored on the session as
/// its user-facing `error_message`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every provider reported a non-plant result
    #[error("No plant detected in the photo. Please upload a clearer photo of a plant.")]
    NoPlantDetected,

    /// No provider produced a vote
    #[error("All identification providers failed")]
    AllProvidersFailed,

    /// Research exhausted every query template below quorum
    #[error("Insufficient reliable sources: found {found}, required {required}")]
    InsufficientSources { found: usize, required: usize },

    /// Consolidation had nothing to work with
    #[error(transparent)]
    Fusion(#[from] FusionError),

    /// Session store failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// State machine rejected a step
    #[error(transparent)]
    InvalidTransition(#[from] crate::models::TransitionError),

    /// Session row vanished (deleted) while the pipeline was running
    #[error("Session no longer exists")]
    SessionGone,
}

impl From<pcare_common::Error> for PipelineError {
    fn from(err: pcare_common::Error) -> Self {
        PipelineError::Persistence(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

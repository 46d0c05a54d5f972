//! Pipeline configuration
//!
//! Thresholds for the consensus resolver and the research orchestrator. The
//! defaults below are defaults only; `config::pipeline_config_from_toml` applies
//! per-deployment overrides before the structs reach the constructors.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Consensus resolver acceptance gates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Minimum mean confidence of the winning species (default: 0.6)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Maximum population standard deviation of vote confidences (default: 0.35)
    #[serde(default = "default_variance_threshold")]
    pub variance_threshold: f64,

    /// Minimum share of votes for the winning species (default: 0.67)
    #[serde(default = "default_agreement_threshold")]
    pub agreement_threshold: f64,
}

/// Research orchestrator limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Validated sources required before consolidation (default: 3)
    #[serde(default = "default_min_sources")]
    pub min_sources: usize,

    /// Minimum overall extraction confidence per source (default: 0.5)
    #[serde(default = "default_min_source_confidence")]
    pub min_source_confidence: f64,

    /// Minimum trackable fields marked present per source (default: 2 of 5)
    #[serde(default = "default_min_fields_present")]
    pub min_fields_present: usize,

    /// Per-document fetch timeout in seconds (default: 8)
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Fetched text shorter than this falls back to the search snippet (default: 200)
    #[serde(default = "default_min_text_length")]
    pub min_text_length: usize,

    /// Snippets shorter than this are skipped (default: 50)
    #[serde(default = "default_min_snippet_length")]
    pub min_snippet_length: usize,

    /// Text handed to the extractor is cut to this many characters (default: 12000)
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Search hits considered per query (default: 8)
    #[serde(default = "default_max_results_per_query")]
    pub max_results_per_query: usize,

    /// Query templates, most specific first. `{species}` and
    /// `{scientific_name}` are substituted.
    #[serde(default = "default_query_templates")]
    pub query_templates: Vec<String>,
}

/// What happens once a care profile is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationPolicy {
    /// Stop at `confirming` until the user confirms
    #[default]
    Manual,
    /// Create the plant record immediately
    Automatic,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub research: ResearchConfig,
    #[serde(default)]
    pub confirmation: ConfirmationPolicy,
}

fn default_confidence_threshold() -> f64 {
    0.6
}

fn default_variance_threshold() -> f64 {
    0.35
}

fn default_agreement_threshold() -> f64 {
    0.67
}

fn default_min_sources() -> usize {
    3
}

fn default_min_source_confidence() -> f64 {
    0.5
}

fn default_min_fields_present() -> usize {
    2
}

fn default_fetch_timeout_secs() -> u64 {
    8
}

fn default_min_text_length() -> usize {
    200
}

fn default_min_snippet_length() -> usize {
    50
}

fn default_max_text_length() -> usize {
    12_000
}

fn default_max_results_per_query() -> usize {
    8
}

fn default_query_templates() -> Vec<String> {
    vec![
        "{species} {scientific_name} care watering fertilizing light".to_string(),
        "{scientific_name} plant care guide".to_string(),
        "{species} houseplant watering schedule humidity temperature".to_string(),
        "how to care for {species}".to_string(),
    ]
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            variance_threshold: default_variance_threshold(),
            agreement_threshold: default_agreement_threshold(),
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            min_sources: default_min_sources(),
            min_source_confidence: default_min_source_confidence(),
            min_fields_present: default_min_fields_present(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            min_text_length: default_min_text_length(),
            min_snippet_length: default_min_snippet_length(),
            max_text_length: default_max_text_length(),
            max_results_per_query: default_max_results_per_query(),
            query_templates: default_query_templates(),
        }
    }
}

impl ResearchConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl ConsensusConfig {
    /// Check that every threshold lies in 0.0-1.0
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("variance_threshold", self.variance_threshold),
            ("agreement_threshold", self.agreement_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be within 0.0-1.0, got {}", name, value));
            }
        }
        Ok(())
    }
}

impl ResearchConfig {
    /// Reject configurations the orchestrator cannot satisfy
    pub fn validate(&self) -> Result<(), String> {
        if self.min_sources == 0 {
            return Err("min_sources must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_source_confidence) {
            return Err(format!(
                "min_source_confidence must be within 0.0-1.0, got {}",
                self.min_source_confidence
            ));
        }
        if self.min_fields_present > 5 {
            return Err("min_fields_present cannot exceed the 5 trackable fields".to_string());
        }
        if self.query_templates.is_empty() {
            return Err("at least one query template is required".to_string());
        }
        Ok(())
    }
}

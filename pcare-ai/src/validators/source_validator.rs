//! Source Validator
//!
//! Decides whether one extracted care document is reliable enough to count
//! toward the research quorum.
//!
//! # Checks
//! 1. **Overall confidence**: extractor's confidence that the document is
//!    about the target species must reach `min_source_confidence`
//! 2. **Field coverage**: at least `min_fields_present` of the five trackable
//!    fields (watering, fertilizing, sunlight, humidity, temperature) must be
//!    stated explicitly in the document
//!
//! A source failing either check is rejected outright; there is no partial
//! acceptance.

use crate::models::ResearchConfig;
use crate::types::CareExtraction;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of care fields tracked per source
pub const TRACKABLE_FIELDS: usize = 5;

/// Validation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Counts toward quorum
    Pass,
    /// Rejected
    Fail,
}

/// Validation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    /// Share of trackable fields present (0.0-1.0)
    pub coverage: f64,
    /// Reasons for rejection (empty on pass)
    pub issues: Vec<String>,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.status == ValidationStatus::Pass
    }
}

/// Source Validator
#[derive(Debug, Clone)]
pub struct SourceValidator {
    min_confidence: f64,
    min_fields_present: usize,
}

impl SourceValidator {
    pub fn new(min_confidence: f64, min_fields_present: usize) -> Self {
        Self {
            min_confidence: min_confidence.clamp(0.0, 1.0),
            min_fields_present: min_fields_present.min(TRACKABLE_FIELDS),
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Self {
        Self::new(config.min_source_confidence, config.min_fields_present)
    }

    pub fn validate(&self, extraction: &CareExtraction) -> ValidationResult {
        let present = extraction.fields_present();
        let mut issues = Vec::new();

        if extraction.confidence < self.min_confidence {
            issues.push(format!(
                "confidence {:.2} below minimum {:.2}",
                extraction.confidence, self.min_confidence
            ));
        }

        if present < self.min_fields_present {
            issues.push(format!(
                "only {} of {} care fields stated (need {})",
                present, TRACKABLE_FIELDS, self.min_fields_present
            ));
        }

        let status = if issues.is_empty() {
            ValidationStatus::Pass
        } else {
            ValidationStatus::Fail
        };

        debug!(
            status = ?status,
            confidence = extraction.confidence,
            fields_present = present,
            "Source validation"
        );

        ValidationResult {
            status,
            coverage: present as f64 / TRACKABLE_FIELDS as f64,
            issues,
        }
    }
}

impl Default for SourceValidator {
    fn default() -> Self {
        Self::from_config(&ResearchConfig::default())
    }
}

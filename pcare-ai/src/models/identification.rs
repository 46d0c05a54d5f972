//! Identification consensus outcome

use serde::{Deserialize, Serialize};

/// Ranked alternative offered to the user when consensus fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub common_name: String,
    pub scientific_name: String,
    /// Mean confidence of the votes for this species
    pub confidence: f64,
    pub votes: usize,
}

/// Confident identification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedIdentification {
    pub common_name: String,
    pub scientific_name: String,
    pub confidence: f64,
    pub agreement_ratio: f64,
    pub models_agreed: usize,
    pub total_models: usize,
}

/// Disambiguation request
///
/// `suggestions` is non-empty and ordered by (votes desc, mean confidence desc).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub suggestions: Vec<Suggestion>,
    pub agreement_ratio: f64,
    pub models_agreed: usize,
    pub total_models: usize,
}

/// Outcome of reconciling provider votes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsensusResult {
    Resolved(ResolvedIdentification),
    NeedsSelection(SelectionRequest),
}

impl ConsensusResult {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ConsensusResult::Resolved(_))
    }
}

//! Consensus Resolver
//!
//! Reconciles species votes from several classifiers into a single
//! identification, or into a ranked list for the user to choose from.
//!
//! # Algorithm
//! 1. If every vote is a non-plant vote ("Unknown Plant", "Unknown Species",
//!    confidence 0), the photo shows no plant.
//! 2. Compute mean and population standard deviation over all confidences,
//!    non-plant votes included.
//! 3. Tally plant votes by normalized scientific name and rank groups by
//!    (votes desc, mean confidence desc). Ties keep first-seen order.
//!    The agreement ratio divides the leader's votes by all votes cast.
//! 4. Accept the leading group only if all three gates pass:
//!    - std deviation ≤ `variance_threshold`
//!    - group mean confidence ≥ `confidence_threshold`
//!    - agreement ratio (rounded to 2 decimals) ≥ `agreement_threshold`
//! 5. Otherwise offer the top three groups as suggestions.
//!
//! # Example
//! ```text
//! votes: Pothos 0.8, Pothos 0.8, Philodendron 0.9
//! std dev ≈ 0.047, mean(Pothos) = 0.8, ratio = 2/3 → 0.67
//! → Resolved(Pothos)
//! ```

use crate::models::{
    ConsensusConfig, ConsensusResult, ResolvedIdentification, SelectionRequest, Suggestion,
};
use crate::types::{IdentificationVote, PipelineError};
use tracing::{debug, info};

/// Maximum suggestions offered when consensus fails
const MAX_SUGGESTIONS: usize = 3;

/// Common names providers use to say "this is not a plant"
const NON_PLANT_NAMES: [&str; 2] = ["unknown plant", "unknown species"];

/// Votes for one scientific name
#[derive(Debug)]
struct SpeciesGroup {
    common_name: String,
    scientific_name: String,
    count: usize,
    confidence_sum: f64,
}

impl SpeciesGroup {
    fn mean_confidence(&self) -> f64 {
        self.confidence_sum / self.count as f64
    }

    fn to_suggestion(&self) -> Suggestion {
        Suggestion {
            common_name: self.common_name.clone(),
            scientific_name: self.scientific_name.clone(),
            confidence: self.mean_confidence(),
            votes: self.count,
        }
    }
}

/// Consensus Resolver
///
/// Stateless apart from its thresholds; safe to share between sessions.
#[derive(Debug, Clone, Default)]
pub struct ConsensusResolver {
    config: ConsensusConfig,
}

impl ConsensusResolver {
    pub fn new(config: ConsensusConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Resolve one session's votes
    ///
    /// # Errors
    /// - `AllProvidersFailed` when `votes` is empty
    /// - `NoPlantDetected` when every vote is a non-plant vote
    pub fn resolve(&self, votes: &[IdentificationVote]) -> Result<ConsensusResult, PipelineError> {
        if votes.is_empty() {
            return Err(PipelineError::AllProvidersFailed);
        }

        let plant_votes: Vec<&IdentificationVote> =
            votes.iter().filter(|v| !is_non_plant(v)).collect();

        if plant_votes.is_empty() {
            info!(votes = votes.len(), "All providers reported no plant");
            return Err(PipelineError::NoPlantDetected);
        }

        let confidences: Vec<f64> = votes.iter().map(|v| v.confidence).collect();
        let (mean, std_dev) = mean_and_std_dev(&confidences);

        // Non-plant votes never lead, but they still count against agreement
        let groups = tally(&plant_votes);
        let total_models = votes.len();

        // Non-empty: at least one plant vote was tallied
        let leader = &groups[0];
        let agreement_ratio = round_ratio(leader.count as f64 / total_models as f64);
        let leader_mean = leader.mean_confidence();

        debug!(
            total_models,
            groups = groups.len(),
            mean,
            std_dev,
            leader = %leader.scientific_name,
            leader_mean,
            agreement_ratio,
            "Consensus inputs"
        );

        let variance_ok = std_dev <= self.config.variance_threshold;
        let confidence_ok = leader_mean >= self.config.confidence_threshold;
        let agreement_ok = agreement_ratio >= self.config.agreement_threshold;

        if variance_ok && confidence_ok && agreement_ok {
            info!(
                species = %leader.common_name,
                scientific_name = %leader.scientific_name,
                models_agreed = leader.count,
                total_models,
                "Identification resolved"
            );
            return Ok(ConsensusResult::Resolved(ResolvedIdentification {
                common_name: leader.common_name.clone(),
                scientific_name: leader.scientific_name.clone(),
                confidence: leader_mean,
                agreement_ratio,
                models_agreed: leader.count,
                total_models,
            }));
        }

        info!(
            variance_ok,
            confidence_ok,
            agreement_ok,
            candidates = groups.len(),
            "Identification ambiguous, requesting user selection"
        );

        Ok(ConsensusResult::NeedsSelection(SelectionRequest {
            suggestions: groups
                .iter()
                .take(MAX_SUGGESTIONS)
                .map(SpeciesGroup::to_suggestion)
                .collect(),
            agreement_ratio,
            models_agreed: leader.count,
            total_models,
        }))
    }
}

fn is_non_plant(vote: &IdentificationVote) -> bool {
    let name = vote.common_name.trim().to_lowercase();
    vote.confidence == 0.0 || NON_PLANT_NAMES.contains(&name.as_str())
}

fn normalize_key(scientific_name: &str) -> String {
    scientific_name.trim().to_lowercase()
}

/// Group votes by scientific name, ranked by (count desc, mean desc)
///
/// Groups are built in first-seen order and sorted stably, so full ties keep
/// the order in which providers reported them.
fn tally(votes: &[&IdentificationVote]) -> Vec<SpeciesGroup> {
    let mut groups: Vec<(String, SpeciesGroup)> = Vec::new();

    for vote in votes {
        let key = normalize_key(&vote.scientific_name);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => {
                group.count += 1;
                group.confidence_sum += vote.confidence;
            }
            None => groups.push((
                key,
                SpeciesGroup {
                    common_name: vote.common_name.trim().to_string(),
                    scientific_name: vote.scientific_name.trim().to_string(),
                    count: 1,
                    confidence_sum: vote.confidence,
                },
            )),
        }
    }

    let mut groups: Vec<SpeciesGroup> = groups.into_iter().map(|(_, g)| g).collect();
    groups.sort_by(|a, b| {
        b.count.cmp(&a.count).then_with(|| {
            b.mean_confidence()
                .partial_cmp(&a.mean_confidence())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    groups
}

/// Mean and population standard deviation
fn mean_and_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Round to two decimals, the precision the agreement threshold is stated in
fn round_ratio(ratio: f64) -> f64 {
    (ratio * 100.0).round() / 100.0
}

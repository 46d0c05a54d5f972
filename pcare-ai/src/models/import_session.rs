//! Import session state machine
//!
//! A session progresses:
//! UPLOADING → IDENTIFYING → RESEARCHING → COMPARING → CONFIRMING → COMPLETED
//!
//! IDENTIFYING may branch to NEEDS_SELECTION, which re-enters at RESEARCHING
//! once the user picks a species. FAILED is reachable from any non-terminal
//! state.
//!
//! Every transition consumes the current session and returns the next one, so
//! each step can be exercised without a store. The caller persists the result
//! as one row update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use super::{CareProfile, CareSourceRecord, ResolvedIdentification, SelectionRequest, Suggestion};
use crate::types::SpeciesRef;

/// Session status as persisted and reported to polling clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Photo received, pipeline not started yet
    Uploading,
    /// Classification providers running
    Identifying,
    /// Searching for care sources
    Researching,
    /// At least one source accepted, collecting more
    Comparing,
    /// Care profile computed, awaiting confirmation
    Confirming,
    /// Plant record created
    Completed,
    /// Terminal failure, see `error_message`
    Failed,
    /// Providers disagreed, waiting for the user to pick a species
    NeedsSelection,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Uploading => "uploading",
            SessionStatus::Identifying => "identifying",
            SessionStatus::Researching => "researching",
            SessionStatus::Comparing => "comparing",
            SessionStatus::Confirming => "confirming",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::NeedsSelection => "needs_selection",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// States in which a background task is actively driving the session
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SessionStatus::Uploading
                | SessionStatus::Identifying
                | SessionStatus::Researching
                | SessionStatus::Comparing
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(SessionStatus::Uploading),
            "identifying" => Ok(SessionStatus::Identifying),
            "researching" => Ok(SessionStatus::Researching),
            "comparing" => Ok(SessionStatus::Comparing),
            "confirming" => Ok(SessionStatus::Confirming),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            "needs_selection" => Ok(SessionStatus::NeedsSelection),
            other => Err(format!("Unknown session status: {}", other)),
        }
    }
}

/// Rejected state transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {action} while session is {from}")]
pub struct TransitionError {
    pub from: SessionStatus,
    pub action: &'static str,
}

/// Identification-and-research session (aggregate root)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSession {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub image_url: String,
    pub identified_species: Option<String>,
    pub scientific_name: Option<String>,
    pub confidence: Option<f64>,
    pub suggestions: Option<Vec<Suggestion>>,
    pub care_sources: Vec<CareSourceRecord>,
    pub care_profile: Option<CareProfile>,
    pub error_message: Option<String>,
    pub plant_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportSession {
    /// Create a session for a freshly uploaded photo
    pub fn new(image_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            status: SessionStatus::Uploading,
            image_url: image_url.into(),
            identified_species: None,
            scientific_name: None,
            confidence: None,
            suggestions: None,
            care_sources: Vec::new(),
            care_profile: None,
            error_message: None,
            plant_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Species under research, if one has been settled
    pub fn species(&self) -> Option<SpeciesRef> {
        match (&self.identified_species, &self.scientific_name) {
            (Some(common), Some(scientific)) => Some(SpeciesRef::new(common, scientific)),
            _ => None,
        }
    }

    fn require(
        &self,
        allowed: &[SessionStatus],
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(TransitionError {
                from: self.status,
                action,
            })
        }
    }

    fn moved_to(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }

    /// UPLOADING → IDENTIFYING
    pub fn begin_identification(self) -> Result<Self, TransitionError> {
        self.require(&[SessionStatus::Uploading], "begin identification")?;
        Ok(self.moved_to(SessionStatus::Identifying))
    }

    /// IDENTIFYING → RESEARCHING with the consensus species
    pub fn resolve_identification(
        mut self,
        resolved: &ResolvedIdentification,
    ) -> Result<Self, TransitionError> {
        self.require(&[SessionStatus::Identifying], "accept identification")?;
        self.identified_species = Some(resolved.common_name.clone());
        self.scientific_name = Some(resolved.scientific_name.clone());
        self.confidence = Some(resolved.confidence);
        self.suggestions = None;
        Ok(self.moved_to(SessionStatus::Researching))
    }

    /// IDENTIFYING → NEEDS_SELECTION with ranked suggestions
    pub fn request_selection(mut self, request: SelectionRequest) -> Result<Self, TransitionError> {
        self.require(&[SessionStatus::Identifying], "request species selection")?;
        self.suggestions = Some(request.suggestions);
        Ok(self.moved_to(SessionStatus::NeedsSelection))
    }

    /// NEEDS_SELECTION → RESEARCHING with the user's chosen species
    ///
    /// The confidence of a matching suggestion is kept; a species typed in by
    /// the user carries no model confidence.
    pub fn select_species(mut self, species: &SpeciesRef) -> Result<Self, TransitionError> {
        self.require(&[SessionStatus::NeedsSelection], "select a species")?;
        let key = species.scientific_name.trim().to_lowercase();
        self.confidence = self
            .suggestions
            .as_ref()
            .and_then(|suggestions| {
                suggestions
                    .iter()
                    .find(|s| s.scientific_name.trim().to_lowercase() == key)
            })
            .map(|s| s.confidence);
        self.identified_species = Some(species.common_name.trim().to_string());
        self.scientific_name = Some(species.scientific_name.trim().to_string());
        self.care_sources.clear();
        Ok(self.moved_to(SessionStatus::Researching))
    }

    /// RESEARCHING | COMPARING → COMPARING, appending one accepted source
    pub fn accept_source(mut self, source: CareSourceRecord) -> Result<Self, TransitionError> {
        self.require(
            &[SessionStatus::Researching, SessionStatus::Comparing],
            "accept a care source",
        )?;
        self.care_sources.push(source);
        Ok(self.moved_to(SessionStatus::Comparing))
    }

    /// COMPARING → CONFIRMING with the consolidated profile
    pub fn await_confirmation(mut self, profile: CareProfile) -> Result<Self, TransitionError> {
        self.require(&[SessionStatus::Comparing], "store the care profile")?;
        self.care_profile = Some(profile);
        Ok(self.moved_to(SessionStatus::Confirming))
    }

    /// CONFIRMING → COMPLETED referencing the created plant record
    pub fn complete(mut self, plant_id: Uuid) -> Result<Self, TransitionError> {
        self.require(&[SessionStatus::Confirming], "complete")?;
        self.plant_id = Some(plant_id);
        Ok(self.moved_to(SessionStatus::Completed))
    }

    /// Any non-terminal state → FAILED
    pub fn fail(mut self, message: impl Into<String>) -> Result<Self, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError {
                from: self.status,
                action: "fail",
            });
        }
        self.error_message = Some(message.into());
        Ok(self.moved_to(SessionStatus::Failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SunlightLevel;

    fn resolved() -> ResolvedIdentification {
        ResolvedIdentification {
            common_name: "Snake Plant".to_string(),
            scientific_name: "Dracaena trifasciata".to_string(),
            confidence: 0.88,
            agreement_ratio: 1.0,
            models_agreed: 3,
            total_models: 3,
        }
    }

    fn source(watering: u32) -> CareSourceRecord {
        CareSourceRecord {
            source_name: "example.org".to_string(),
            source_url: None,
            watering_days: watering,
            fertilizing_days: 30,
            sunlight_level: SunlightLevel::Low,
            humidity: "low".to_string(),
            temperature_range: "15-29°C".to_string(),
            care_notes: String::new(),
            confidence: Some(0.8),
        }
    }

    fn profile() -> CareProfile {
        CareProfile {
            watering_days: 8,
            fertilizing_days: 35,
            sunlight_level: SunlightLevel::Low,
            humidity: "low".to_string(),
            temperature_range: "15-29°C".to_string(),
            care_notes: String::new(),
        }
    }

    #[test]
    fn test_status_strings_roundtrip() {
        for status in [
            SessionStatus::Uploading,
            SessionStatus::Identifying,
            SessionStatus::Researching,
            SessionStatus::Comparing,
            SessionStatus::Confirming,
            SessionStatus::Completed,
            SessionStatus::Failed,
            SessionStatus::NeedsSelection,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>(), Ok(status));
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
    }

    #[test]
    fn test_happy_path_transitions() {
        let session = ImportSession::new("https://img.example/plant.jpg")
            .begin_identification()
            .unwrap()
            .resolve_identification(&resolved())
            .unwrap();
        assert_eq!(session.status, SessionStatus::Researching);
        assert_eq!(session.identified_species.as_deref(), Some("Snake Plant"));

        let session = session
            .accept_source(source(7))
            .unwrap()
            .accept_source(source(10))
            .unwrap()
            .accept_source(source(7))
            .unwrap();
        assert_eq!(session.status, SessionStatus::Comparing);
        assert_eq!(session.care_sources.len(), 3);

        let plant_id = Uuid::new_v4();
        let session = session
            .await_confirmation(profile())
            .unwrap()
            .complete(plant_id)
            .unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.plant_id, Some(plant_id));
        assert!(session.is_terminal());
    }

    #[test]
    fn test_selection_branch() {
        let request = SelectionRequest {
            suggestions: vec![
                Suggestion {
                    common_name: "Pothos".to_string(),
                    scientific_name: "Epipremnum aureum".to_string(),
                    confidence: 0.7,
                    votes: 1,
                },
                Suggestion {
                    common_name: "Heartleaf Philodendron".to_string(),
                    scientific_name: "Philodendron hederaceum".to_string(),
                    confidence: 0.65,
                    votes: 1,
                },
            ],
            agreement_ratio: 0.5,
            models_agreed: 1,
            total_models: 2,
        };

        let session = ImportSession::new("img")
            .begin_identification()
            .unwrap()
            .request_selection(request)
            .unwrap();
        assert_eq!(session.status, SessionStatus::NeedsSelection);
        assert_eq!(session.suggestions.as_ref().map(Vec::len), Some(2));

        let session = session
            .select_species(&SpeciesRef::new("Heartleaf Philodendron", "philodendron hederaceum"))
            .unwrap();
        assert_eq!(session.status, SessionStatus::Researching);
        assert_eq!(session.confidence, Some(0.65));
        assert_eq!(
            session.species(),
            Some(SpeciesRef::new("Heartleaf Philodendron", "philodendron hederaceum"))
        );
    }

    #[test]
    fn test_needs_selection_only_reachable_from_identifying() {
        let request = SelectionRequest {
            suggestions: vec![],
            agreement_ratio: 0.0,
            models_agreed: 0,
            total_models: 0,
        };
        let err = ImportSession::new("img").request_selection(request).unwrap_err();
        assert_eq!(err.from, SessionStatus::Uploading);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let session = ImportSession::new("img");
        assert!(session.clone().complete(Uuid::new_v4()).is_err());
        assert!(session.clone().accept_source(source(7)).is_err());
        assert!(session
            .clone()
            .select_species(&SpeciesRef::new("a", "b"))
            .is_err());

        // Profile cannot be stored before any source was accepted
        let researching = session
            .begin_identification()
            .unwrap()
            .resolve_identification(&resolved())
            .unwrap();
        let err = researching.await_confirmation(profile()).unwrap_err();
        assert_eq!(err.from, SessionStatus::Researching);
        assert!(err.to_string().contains("researching"));
    }

    #[test]
    fn test_fail_from_any_non_terminal_state() {
        let failed = ImportSession::new("img")
            .begin_identification()
            .unwrap()
            .fail("All identification providers failed")
            .unwrap();
        assert_eq!(failed.status, SessionStatus::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("All identification providers failed")
        );

        // Terminal sessions stay terminal
        assert!(failed.fail("again").is_err());
    }

    #[test]
    fn test_in_flight_states() {
        assert!(SessionStatus::Comparing.is_in_flight());
        assert!(!SessionStatus::NeedsSelection.is_in_flight());
        assert!(!SessionStatus::Confirming.is_in_flight());
        assert!(!SessionStatus::Failed.is_in_flight());
    }
}

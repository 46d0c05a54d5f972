//! Import session orchestrator
//!
//! Drives one session through the state machine:
//! UPLOADING → IDENTIFYING → RESEARCHING → COMPARING → CONFIRMING → COMPLETED
//!
//! Every step is a pure transition on `ImportSession` followed by one guarded
//! row update. If the update matches no row the session was deleted while the
//! pipeline ran; the orchestrator stops quietly and never re-creates it.
//!
//! Long-running work (`run_pipeline`, `run_research`) is meant to be spawned
//! on the runtime; clients follow progress by polling the session row.

use crate::db::sessions;
use crate::extractors::ParallelClassifier;
use crate::fusion::{CareConsolidator, ConsensusResolver};
use crate::models::{
    ConfirmationPolicy, ConsensusResult, ImportSession, SessionStatus, TransitionError,
};
use crate::services::research_orchestrator::{ResearchObserver, ResearchOrchestrator};
use crate::types::{ImageRef, NewPlant, PipelineError, PlantStore, SpeciesRef};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Session orchestrator
pub struct SessionOrchestrator {
    db: SqlitePool,
    classifier: ParallelClassifier,
    resolver: ConsensusResolver,
    research: ResearchOrchestrator,
    consolidator: CareConsolidator,
    plant_store: Arc<dyn PlantStore>,
    confirmation: ConfirmationPolicy,
    /// Most recent pipeline failure, surfaced by the health endpoint
    last_error: Arc<RwLock<Option<String>>>,
}

impl SessionOrchestrator {
    pub fn new(
        db: SqlitePool,
        classifier: ParallelClassifier,
        resolver: ConsensusResolver,
        research: ResearchOrchestrator,
        plant_store: Arc<dyn PlantStore>,
        confirmation: ConfirmationPolicy,
    ) -> Self {
        Self {
            db,
            classifier,
            resolver,
            research,
            consolidator: CareConsolidator::new(),
            plant_store,
            confirmation,
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        self.confirmation
    }

    /// Shared handle to the last pipeline error
    pub fn last_error(&self) -> Arc<RwLock<Option<String>>> {
        Arc::clone(&self.last_error)
    }

    /// Create and persist a session for an uploaded photo
    pub async fn create(&self, image_url: &str) -> Result<ImportSession, PipelineError> {
        let session = ImportSession::new(image_url);
        sessions::create_session(&self.db, &session).await?;
        info!(session_id = %session.session_id, "Import session created");
        Ok(session)
    }

    /// Run identification and, if it resolves, research through to the end
    ///
    /// Failures are recorded on the session; nothing is returned to the caller.
    pub async fn run_pipeline(&self, session: ImportSession) {
        let session_id = session.session_id;
        if let Err(e) = self.identify(session).await {
            self.handle_failure(session_id, &e).await;
        }
    }

    /// Record a user's species choice for a session awaiting selection
    ///
    /// Persisted before returning, so the caller can spawn `run_research`
    /// with the returned session.
    pub async fn select(
        &self,
        session_id: Uuid,
        species: &SpeciesRef,
    ) -> Result<ImportSession, PipelineError> {
        let session = self.load(session_id).await?;
        let session = self.advance(session, |s| s.select_species(species)).await?;
        info!(
            session_id = %session_id,
            species = %species.common_name,
            "User selected species"
        );
        Ok(session)
    }

    /// Research and consolidate a session already in `researching`
    pub async fn run_research(&self, session: ImportSession) {
        let session_id = session.session_id;
        if let Err(e) = self.research_and_consolidate(session).await {
            self.handle_failure(session_id, &e).await;
        }
    }

    /// Confirm the care profile of a session in `confirming`
    ///
    /// State errors are returned untouched. Any other failure also moves the
    /// session to `failed` before it is returned.
    pub async fn confirm(&self, session_id: Uuid) -> Result<ImportSession, PipelineError> {
        let session = self.load(session_id).await?;
        match self.complete(session).await {
            Ok(session) => Ok(session),
            Err(e @ (PipelineError::SessionGone | PipelineError::InvalidTransition(_))) => Err(e),
            Err(e) => {
                self.handle_failure(session_id, &e).await;
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Pipeline stages
    // ------------------------------------------------------------------------

    async fn identify(&self, session: ImportSession) -> Result<ImportSession, PipelineError> {
        let session = self.advance(session, ImportSession::begin_identification).await?;
        let image = ImageRef::new(session.image_url.clone());

        let votes = self.classifier.collect_votes(&image).await;
        info!(
            session_id = %session.session_id,
            votes = votes.len(),
            providers = self.classifier.count(),
            "Classification finished"
        );

        match self.resolver.resolve(&votes)? {
            ConsensusResult::Resolved(resolved) => {
                let session = self
                    .advance(session, |s| s.resolve_identification(&resolved))
                    .await?;
                self.research_and_consolidate(session).await
            }
            ConsensusResult::NeedsSelection(request) => {
                let session = self.advance(session, |s| s.request_selection(request)).await?;
                info!(session_id = %session.session_id, "Waiting for species selection");
                Ok(session)
            }
        }
    }

    async fn research_and_consolidate(
        &self,
        session: ImportSession,
    ) -> Result<ImportSession, PipelineError> {
        let species = session.species().ok_or(TransitionError {
            from: session.status,
            action: "research without an identified species",
        })?;

        let mut progress = SessionProgress {
            orchestrator: self,
            session: Some(session),
        };
        self.research.research(&species, &mut progress).await?;

        let session = progress.session.take().ok_or(PipelineError::SessionGone)?;
        let profile = self.consolidator.consolidate(&session.care_sources)?;
        let session = self
            .advance(session, |s| s.await_confirmation(profile))
            .await?;
        info!(session_id = %session.session_id, "Care profile ready for confirmation");

        match self.confirmation {
            ConfirmationPolicy::Automatic => self.complete(session).await,
            ConfirmationPolicy::Manual => Ok(session),
        }
    }

    /// Create the plant record and complete the session
    async fn complete(&self, session: ImportSession) -> Result<ImportSession, PipelineError> {
        if session.status != SessionStatus::Confirming {
            return Err(TransitionError {
                from: session.status,
                action: "complete",
            }
            .into());
        }

        let (Some(common_name), Some(scientific_name), Some(profile)) = (
            session.identified_species.clone(),
            session.scientific_name.clone(),
            session.care_profile.clone(),
        ) else {
            return Err(TransitionError {
                from: session.status,
                action: "complete without a species and care profile",
            }
            .into());
        };

        // The row may have been deleted since it was loaded
        self.load(session.session_id).await?;

        let created = self
            .plant_store
            .create_plant(NewPlant {
                session_id: session.session_id,
                common_name,
                scientific_name,
                identification_confidence: session.confidence,
                image_url: session.image_url.clone(),
                profile,
            })
            .await;

        let plant_id = match created {
            Ok(plant_id) => plant_id,
            // A concurrent confirmation already wrote the record
            Err(pcare_common::Error::Conflict(reason)) => {
                warn!(session_id = %session.session_id, reason = %reason, "Plant record already exists");
                return Err(TransitionError {
                    from: SessionStatus::Confirming,
                    action: "complete twice",
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        let session = self.advance(session, |s| s.complete(plant_id)).await?;
        info!(
            session_id = %session.session_id,
            plant_id = %plant_id,
            "Import session completed"
        );
        Ok(session)
    }

    // ------------------------------------------------------------------------
    // Persistence helpers
    // ------------------------------------------------------------------------

    async fn load(&self, session_id: Uuid) -> Result<ImportSession, PipelineError> {
        sessions::load_session(&self.db, session_id)
            .await?
            .ok_or(PipelineError::SessionGone)
    }

    /// Apply one transition and persist it against the previous status
    async fn advance<F>(&self, session: ImportSession, step: F) -> Result<ImportSession, PipelineError>
    where
        F: FnOnce(ImportSession) -> Result<ImportSession, TransitionError>,
    {
        let previous = session.status;
        let next = step(session)?;

        if !sessions::save_session(&self.db, &next, previous).await? {
            warn!(
                session_id = %next.session_id,
                from = %previous,
                to = %next.status,
                "Session no longer in expected state, stopping"
            );
            return Err(PipelineError::SessionGone);
        }

        Ok(next)
    }

    /// Move the session to `failed`, unless it is gone or already terminal
    async fn handle_failure(&self, session_id: Uuid, err: &PipelineError) {
        if matches!(err, PipelineError::SessionGone) {
            info!(session_id = %session_id, "Session removed during processing, abandoning");
            return;
        }

        error!(session_id = %session_id, error = %err, "Import session failed");
        *self.last_error.write().await = Some(err.to_string());

        let session = match sessions::load_session(&self.db, session_id).await {
            Ok(Some(session)) if !session.is_terminal() => session,
            Ok(_) => return,
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to load session to record failure");
                return;
            }
        };

        let message = err.to_string();
        if let Err(e) = self.advance(session, |s| s.fail(message)).await {
            warn!(session_id = %session_id, error = %e, "Failed to record session failure");
        }
    }
}

/// Persists each accepted source as a `comparing` transition
struct SessionProgress<'a> {
    orchestrator: &'a SessionOrchestrator,
    session: Option<ImportSession>,
}

#[async_trait]
impl ResearchObserver for SessionProgress<'_> {
    async fn source_accepted(
        &mut self,
        source: &crate::models::CareSourceRecord,
    ) -> Result<(), PipelineError> {
        let session = self.session.take().ok_or(PipelineError::SessionGone)?;
        let record = source.clone();
        let session = self
            .orchestrator
            .advance(session, |s| s.accept_source(record))
            .await?;
        self.session = Some(session);
        Ok(())
    }
}

//! Shared test helpers for pcare-ai integration tests
//!
//! Scripted capability implementations plus an orchestrator wired to an
//! in-memory database.

#![allow(dead_code)]

use async_trait::async_trait;
use pcare_ai::db::plants::SqlitePlantStore;
use pcare_ai::extractors::ParallelClassifier;
use pcare_ai::fusion::ConsensusResolver;
use pcare_ai::models::{
    ConfirmationPolicy, ConsensusConfig, ImportSession, ResearchConfig, SessionStatus,
    SunlightLevel,
};
use pcare_ai::services::{ResearchOrchestrator, SessionOrchestrator};
use pcare_ai::types::{
    CapabilityError, CareExtraction, CareExtractor, Classifier, ContentFetcher, ExtractedField,
    IdentificationVote, ImageRef, NewPlant, PlantStore, SearchHit, SearchProvider, SpeciesRef,
};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Classification
// ============================================================================

/// Classifier returning a fixed vote, or failing
pub struct ScriptedClassifier {
    name: String,
    vote: Option<(String, String, f64)>,
}

impl ScriptedClassifier {
    pub fn voting(name: &str, common: &str, scientific: &str, confidence: f64) -> Arc<dyn Classifier> {
        Arc::new(Self {
            name: name.to_string(),
            vote: Some((common.to_string(), scientific.to_string(), confidence)),
        })
    }

    pub fn failing(name: &str) -> Arc<dyn Classifier> {
        Arc::new(Self {
            name: name.to_string(),
            vote: None,
        })
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(&self, _image: &ImageRef) -> Result<IdentificationVote, CapabilityError> {
        match &self.vote {
            Some((common, scientific, confidence)) => Ok(IdentificationVote::new(
                &self.name,
                common,
                scientific,
                *confidence,
                "scripted",
            )),
            None => Err(CapabilityError::Timeout(format!("{} did not answer", self.name))),
        }
    }
}

/// Three providers agreeing on Snake Plant at 0.85 / 0.9 / 0.88
pub fn snake_plant_classifiers() -> Vec<Arc<dyn Classifier>> {
    vec![
        ScriptedClassifier::voting("vision-a", "Snake Plant", "Dracaena trifasciata", 0.85),
        ScriptedClassifier::voting("vision-b", "Snake Plant", "Dracaena trifasciata", 0.9),
        ScriptedClassifier::voting("vision-c", "Snake Plant", "Dracaena trifasciata", 0.88),
    ]
}

// ============================================================================
// Research
// ============================================================================

/// One scripted care page: where it lives and what the extractor reads from it
#[derive(Clone)]
pub struct CarePage {
    pub url: String,
    pub title: String,
    pub marker: String,
    pub extraction: CareExtraction,
}

impl CarePage {
    /// Page whose body text is long enough to skip the snippet fallback
    pub fn body_text(&self) -> String {
        format!(
            "{} {}",
            self.marker,
            "This guide covers watering, feeding, light and humidity for common houseplants. "
                .repeat(4)
        )
    }
}

/// Care page with all five fields present
pub fn care_page(
    n: usize,
    watering_days: u32,
    fertilizing_days: u32,
    sunlight: SunlightLevel,
    confidence: f64,
) -> CarePage {
    CarePage {
        url: format!("https://care{}.example/snake-plant", n),
        title: format!("Care guide {}", n),
        marker: format!("[care-page-{}]", n),
        extraction: CareExtraction {
            watering_days: ExtractedField::new(watering_days, true, 0.9),
            fertilizing_days: ExtractedField::new(fertilizing_days, true, 0.8),
            sunlight_level: ExtractedField::new(sunlight, true, 0.85),
            humidity: ExtractedField::new(format!("humidity-{}", n), true, 0.6),
            temperature_range: ExtractedField::new(format!("temp-{}", n), true, 0.6),
            care_notes: format!("Notes from page {}.", n),
            confidence,
        },
    }
}

/// Search provider returning the same ranked hits for every query
pub struct ScriptedSearch {
    hits: Vec<SearchHit>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new(pages: &[CarePage]) -> Arc<Self> {
        Arc::new(Self {
            hits: pages
                .iter()
                .map(|page| SearchHit {
                    title: page.title.clone(),
                    url: page.url.clone(),
                    snippet: String::new(),
                })
                .collect(),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CapabilityError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// Fetcher serving page bodies by URL; unknown URLs fail with empty text
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    delay: Duration,
}

impl ScriptedFetcher {
    pub fn new(pages: &[CarePage]) -> Arc<Self> {
        Self::with_delay(pages, Duration::ZERO)
    }

    /// Every fetch sleeps for `delay` first, leaving room to act mid-research
    pub fn with_delay(pages: &[CarePage], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            pages: pages
                .iter()
                .map(|page| (page.url.clone(), page.body_text()))
                .collect(),
            delay,
        })
    }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch_text(&self, url: &str) -> String {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.pages.get(url).cloned().unwrap_or_default()
    }
}

/// Extractor recognising pages by their marker text
pub struct ScriptedExtractor {
    pages: Vec<CarePage>,
    species_seen: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new(pages: &[CarePage]) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.to_vec(),
            species_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn species_seen(&self) -> Vec<String> {
        self.species_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CareExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        text: &str,
        species: &SpeciesRef,
    ) -> Result<CareExtraction, CapabilityError> {
        self.species_seen
            .lock()
            .unwrap()
            .push(species.scientific_name.clone());

        self.pages
            .iter()
            .find(|page| text.contains(&page.marker))
            .map(|page| page.extraction.clone())
            .ok_or_else(|| CapabilityError::Parse("no care data in text".to_string()))
    }
}

/// The three Snake Plant sources: watering [7,10,7], fertilizing [30,30,45],
/// sunlight [low,medium,low]
pub fn snake_plant_pages() -> Vec<CarePage> {
    vec![
        care_page(1, 7, 30, SunlightLevel::Low, 0.9),
        care_page(2, 10, 30, SunlightLevel::Medium, 0.8),
        care_page(3, 7, 45, SunlightLevel::Low, 0.85),
    ]
}

// ============================================================================
// Plant store
// ============================================================================

/// Plant store whose writes always fail with `message`
pub struct FailingPlantStore {
    message: String,
}

impl FailingPlantStore {
    pub fn new(message: &str) -> Arc<dyn PlantStore> {
        Arc::new(Self {
            message: message.to_string(),
        })
    }
}

#[async_trait]
impl PlantStore for FailingPlantStore {
    async fn create_plant(&self, _plant: NewPlant) -> pcare_common::Result<Uuid> {
        Err(pcare_common::Error::Internal(self.message.clone()))
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Scripted dependencies for one orchestrator
pub struct TestPipeline {
    pub classifiers: Vec<Arc<dyn Classifier>>,
    pub pages: Vec<CarePage>,
    pub fetch_delay: Duration,
    pub confirmation: ConfirmationPolicy,
    /// Replaces the SQLite plant store when set
    pub plant_store: Option<Arc<dyn PlantStore>>,
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self {
            classifiers: snake_plant_classifiers(),
            pages: snake_plant_pages(),
            fetch_delay: Duration::ZERO,
            confirmation: ConfirmationPolicy::Manual,
            plant_store: None,
        }
    }
}

/// Built orchestrator plus handles for assertions
pub struct TestHarness {
    pub db: SqlitePool,
    pub orchestrator: SessionOrchestrator,
    pub search: Arc<ScriptedSearch>,
    pub extractor: Arc<ScriptedExtractor>,
}

impl TestPipeline {
    pub async fn build(self) -> TestHarness {
        let db = pcare_ai::db::init_in_memory_pool()
            .await
            .expect("in-memory database");
        self.build_with_db(db)
    }

    pub fn build_with_db(self, db: SqlitePool) -> TestHarness {
        let search = ScriptedSearch::new(&self.pages);
        let fetcher = ScriptedFetcher::with_delay(&self.pages, self.fetch_delay);
        let extractor = ScriptedExtractor::new(&self.pages);

        let research = ResearchOrchestrator::new(
            search.clone(),
            fetcher,
            extractor.clone(),
            ResearchConfig::default(),
        );

        let plant_store = self
            .plant_store
            .unwrap_or_else(|| Arc::new(SqlitePlantStore::new(db.clone())));

        let orchestrator = SessionOrchestrator::new(
            db.clone(),
            ParallelClassifier::new(self.classifiers),
            ConsensusResolver::new(ConsensusConfig::default()),
            research,
            plant_store,
            self.confirmation,
        );

        TestHarness {
            db,
            orchestrator,
            search,
            extractor,
        }
    }
}

// ============================================================================
// Polling
// ============================================================================

/// Poll the session row until `done` holds or 5 seconds pass
///
/// Returns the last observed session (`None` once deleted).
pub async fn wait_for_session<F>(db: &SqlitePool, session_id: Uuid, done: F) -> Option<ImportSession>
where
    F: Fn(Option<&ImportSession>) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let session = pcare_ai::db::sessions::load_session(db, session_id)
            .await
            .expect("load session");
        if done(session.as_ref()) || tokio::time::Instant::now() >= deadline {
            return session;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll until the session reaches `status`
pub async fn wait_for_status(
    db: &SqlitePool,
    session_id: Uuid,
    status: SessionStatus,
) -> ImportSession {
    wait_for_session(db, session_id, |s| s.map(|s| s.status) == Some(status))
        .await
        .expect("session exists")
}

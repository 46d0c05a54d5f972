//! Configuration resolution for pcare-ai
//!
//! Provides multi-tier API key resolution with Database → ENV → TOML priority,
//! and assembles the identification and research pipeline from the TOML file.

use pcare_common::config::{ProviderConfig, TomlConfig};
use pcare_common::{Error, Result};
use sqlx::{Pool, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::plants::SqlitePlantStore;
use crate::extractors::{
    BraveSearchClient, ChatCompletionsClient, HttpContentFetcher, OpenAiCareExtractor,
    OpenAiVisionClassifier, ParallelClassifier,
};
use crate::fusion::ConsensusResolver;
use crate::models::{ConfirmationPolicy, PipelineConfig};
use crate::services::{ResearchOrchestrator, SessionOrchestrator};
use crate::types::{CapabilityError, Classifier};

/// Default OpenAI-compatible endpoint for care extraction
pub const DEFAULT_EXTRACTION_BASE_URL: &str = "https://api.openai.com/v1";

/// Default care extraction model
pub const DEFAULT_EXTRACTION_MODEL: &str = "gpt-4o-mini";

/// Default environment variable for the extraction API key
pub const DEFAULT_EXTRACTION_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable for the web search API key
pub const SEARCH_KEY_ENV: &str = "PCARE_BRAVE_API_KEY";

/// Settings-table provider name for the web search key
pub const SEARCH_PROVIDER: &str = "brave";

/// Settings-table provider name for the care extraction key
pub const EXTRACTION_PROVIDER: &str = "extraction";

/// Resolve an API key from 3-tier configuration
///
/// **Priority:** Database (`{provider}_api_key` setting) → ENV (`env_var`) → TOML
pub async fn resolve_api_key(
    db: &Pool<Sqlite>,
    provider: &str,
    env_var: Option<&str>,
    toml_key: Option<&str>,
) -> Result<String> {
    let mut sources = Vec::new();

    // Tier 1: Database (authoritative)
    let db_key = crate::db::settings::get_api_key(db, provider).await?;
    if let Some(key) = &db_key {
        if is_valid_key(key) {
            sources.push("database");
        }
    }

    // Tier 2: Environment variable
    let env_key = env_var.and_then(|name| std::env::var(name).ok());
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    // Tier 3: TOML config
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    if sources.len() > 1 {
        warn!(
            provider = %provider,
            "API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key.filter(|k| is_valid_key(k)) {
        info!(provider = %provider, "API key loaded from database");
        return Ok(key);
    }

    if let Some(key) = env_key.filter(|k| is_valid_key(k)) {
        info!(provider = %provider, "API key loaded from environment variable");
        return Ok(key);
    }

    if let Some(key) = toml_key.filter(|k| is_valid_key(k)) {
        info!(provider = %provider, "API key loaded from TOML config");
        return Ok(key.to_string());
    }

    let env_hint = env_var.unwrap_or("<api_key_env>");
    Err(Error::Config(format!(
        "API key for '{}' not configured. Please configure using one of:\n\
         1. Database setting: {}\n\
         2. Environment: {}=your-key-here\n\
         3. TOML config: ~/.config/pcare/pcare-ai.toml",
        provider,
        crate::db::settings::api_key_setting(provider),
        env_hint
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Parse the `confirmation` setting ("manual" or "automatic")
pub fn parse_confirmation(value: Option<&str>) -> Result<ConfirmationPolicy> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("manual") => Ok(ConfirmationPolicy::Manual),
        Some("automatic") => Ok(ConfirmationPolicy::Automatic),
        Some(other) => Err(Error::Config(format!(
            "Invalid confirmation policy '{}': expected \"manual\" or \"automatic\"",
            other
        ))),
    }
}

/// Apply TOML overrides on top of compiled defaults and validate the result
pub fn pipeline_config_from_toml(toml_config: &TomlConfig) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::default();

    let consensus = &toml_config.consensus;
    if let Some(v) = consensus.confidence_threshold {
        config.consensus.confidence_threshold = v;
    }
    if let Some(v) = consensus.variance_threshold {
        config.consensus.variance_threshold = v;
    }
    if let Some(v) = consensus.agreement_threshold {
        config.consensus.agreement_threshold = v;
    }

    let research = &toml_config.research;
    if let Some(v) = research.min_sources {
        config.research.min_sources = v;
    }
    if let Some(v) = research.min_source_confidence {
        config.research.min_source_confidence = v;
    }
    if let Some(v) = research.fetch_timeout_secs {
        config.research.fetch_timeout_secs = v;
    }
    if let Some(v) = research.min_text_length {
        config.research.min_text_length = v;
    }
    if let Some(v) = research.max_results_per_query {
        config.research.max_results_per_query = v;
    }

    config.confirmation = parse_confirmation(toml_config.confirmation.as_deref())?;

    config
        .consensus
        .validate()
        .map_err(|e| Error::Config(format!("[consensus] {}", e)))?;
    config
        .research
        .validate()
        .map_err(|e| Error::Config(format!("[research] {}", e)))?;

    Ok(config)
}

fn capability_config_error(context: &str, e: CapabilityError) -> Error {
    Error::Config(format!("{}: {}", context, e))
}

async fn build_classifier(db: &SqlitePool, provider: &ProviderConfig) -> Result<Arc<dyn Classifier>> {
    let key = resolve_api_key(
        db,
        &provider.name,
        provider.api_key_env.as_deref(),
        provider.api_key.as_deref(),
    )
    .await?;

    let client = ChatCompletionsClient::new(&provider.base_url, &provider.model, key)
        .map_err(|e| capability_config_error(&provider.name, e))?;

    info!(
        provider = %provider.name,
        model = %provider.model,
        "Classification provider configured"
    );
    Ok(Arc::new(OpenAiVisionClassifier::new(&provider.name, client)))
}

/// Assemble the session orchestrator from TOML configuration
///
/// Every configured provider must resolve an API key; a provider without one
/// is a configuration error rather than a silently missing vote.
pub async fn build_orchestrator(
    db: &SqlitePool,
    toml_config: &TomlConfig,
) -> Result<SessionOrchestrator> {
    let pipeline = pipeline_config_from_toml(toml_config)?;

    if toml_config.providers.is_empty() {
        return Err(Error::Config(
            "No identification providers configured: add at least one [[providers]] entry"
                .to_string(),
        ));
    }

    let mut classifiers = Vec::with_capacity(toml_config.providers.len());
    for provider in &toml_config.providers {
        classifiers.push(build_classifier(db, provider).await?);
    }

    // Care extraction
    let extraction = &toml_config.extraction;
    let extraction_key = resolve_api_key(
        db,
        EXTRACTION_PROVIDER,
        Some(
            extraction
                .api_key_env
                .as_deref()
                .unwrap_or(DEFAULT_EXTRACTION_KEY_ENV),
        ),
        extraction.api_key.as_deref(),
    )
    .await?;
    let extraction_client = ChatCompletionsClient::new(
        extraction
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_EXTRACTION_BASE_URL),
        extraction.model.as_deref().unwrap_or(DEFAULT_EXTRACTION_MODEL),
        extraction_key,
    )
    .map_err(|e| capability_config_error("extraction", e))?;

    // Web search
    let search = &toml_config.search;
    let search_key = resolve_api_key(
        db,
        SEARCH_PROVIDER,
        Some(SEARCH_KEY_ENV),
        search.api_key.as_deref(),
    )
    .await?;
    let search_client = BraveSearchClient::new(
        search
            .base_url
            .as_deref()
            .unwrap_or(crate::extractors::web_search::BRAVE_SEARCH_URL),
        search_key,
        search.requests_per_second.unwrap_or(1),
    )
    .map_err(|e| capability_config_error("search", e))?;

    let fetcher = HttpContentFetcher::new(pipeline.research.fetch_timeout())
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

    let research = ResearchOrchestrator::new(
        Arc::new(search_client),
        Arc::new(fetcher),
        Arc::new(OpenAiCareExtractor::new(extraction_client)),
        pipeline.research,
    );

    info!(
        providers = classifiers.len(),
        confirmation = ?pipeline.confirmation,
        "Pipeline configured"
    );

    Ok(SessionOrchestrator::new(
        db.clone(),
        ParallelClassifier::new(classifiers),
        ConsensusResolver::new(pipeline.consensus),
        research,
        Arc::new(SqlitePlantStore::new(db.clone())),
        pipeline.confirmation,
    ))
}

//! Brave Search Client
//!
//! Web search capability for care research.
//!
//! # API Reference
//! - Endpoint: https://api.search.brave.com/res/v1/web/search
//! - Auth: `X-Subscription-Token` header
//! - Rate limit: plan-dependent (free plan: 1 request/second)

use crate::types::{CapabilityError, SearchHit, SearchProvider};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Brave web search endpoint
pub const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";

/// Brave caps `count` at 20
const MAX_COUNT: usize = 20;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
}

/// Brave Search client
pub struct BraveSearchClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl BraveSearchClient {
    /// Create client limited to `requests_per_second` (minimum 1)
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        requests_per_second: u32,
    ) -> Result<Self, CapabilityError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CapabilityError::NotConfigured(
                "Brave Search API key is empty".to_string(),
            ));
        }

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| CapabilityError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }
}

#[async_trait]
impl SearchProvider for BraveSearchClient {
    fn name(&self) -> &str {
        "brave"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, CapabilityError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.rate_limiter.until_ready().await;

        let count = limit.min(MAX_COUNT).to_string();
        let response = self
            .client
            .get(&self.base_url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", count.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::Api(format!("HTTP {} from Brave Search", status)));
        }

        let body: BraveResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Parse(format!("Failed to parse search response: {}", e)))?;

        let hits = into_hits(body, limit);
        debug!(query, hits = hits.len(), "Search complete");
        Ok(hits)
    }
}

fn into_hits(body: BraveResponse, limit: usize) -> Vec<SearchHit> {
    body.web
        .map(|web| web.results)
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.starts_with("http"))
        .take(limit)
        .map(|r| SearchHit {
            title: r.title,
            url: r.url,
            snippet: r.description,
        })
        .collect()
}

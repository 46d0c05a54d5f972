//! HTTP Content Fetcher
//!
//! Downloads a document and reduces it to plain text for the care extractor.
//! Never fails: any problem is logged and reported as an empty string, which
//! the research orchestrator treats like a too-short document.

use crate::types::ContentFetcher;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Identify ourselves to sites that block anonymous clients
const USER_AGENT: &str = concat!("pcare/", env!("CARGO_PKG_VERSION"), " (plant care research)");

/// Line width used when rendering HTML to text
const TEXT_WIDTH: usize = 100;

/// HTTP content fetcher
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    /// Create fetcher with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();

        let body = response.text().await?;

        if content_type.contains("html") {
            Ok(html_to_text(&body))
        } else if content_type.starts_with("text/") {
            Ok(body)
        } else {
            debug!(url, content_type = %content_type, "Skipping non-text document");
            Ok(String::new())
        }
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_text(&self, url: &str) -> String {
        match self.fetch(url).await {
            Ok(text) => {
                debug!(url, chars = text.len(), "Fetched document");
                text
            }
            Err(e) => {
                warn!(url, error = %e, "Failed to fetch document");
                String::new()
            }
        }
    }
}

/// Convert HTML to clean text
///
/// Also used on search snippets, which may carry inline markup.
pub fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), TEXT_WIDTH);

    // Clean up excessive whitespace
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

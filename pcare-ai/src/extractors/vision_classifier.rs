//! Vision Classifier
//!
//! Asks an OpenAI-compatible vision model which plant species a photo shows.
//! One instance per configured provider; the consensus resolver reconciles
//! their answers.
//!
//! # Non-plant photos
//! The prompt instructs the model to answer "Unknown Plant" with confidence 0
//! when no plant is visible. That answer is returned as an ordinary vote.
//!
//! # Image transport
//! - `http(s)://` and `data:` URLs are passed through
//! - local paths (optionally `file://`) are read and sent as base64 data URLs

use super::openai_client::ChatCompletionsClient;
use crate::types::{CapabilityError, Classifier, IdentificationVote, ImageRef};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are an expert botanist. Identify the plant species in the photo. \
Respond with the most common English name, the accepted scientific (binomial) name, \
a confidence between 0 and 1, and one or two sentences of reasoning. \
If the photo does not show a plant, respond with common_name \"Unknown Plant\", \
scientific_name \"Unknown\" and confidence 0.";

/// Structured reply of the vision model
#[derive(Debug, Deserialize)]
struct SpeciesReply {
    common_name: String,
    scientific_name: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

fn species_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "common_name": {"type": "string"},
            "scientific_name": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1},
            "reasoning": {"type": "string"}
        },
        "required": ["common_name", "scientific_name", "confidence", "reasoning"],
        "additionalProperties": false
    })
}

/// OpenAI-compatible vision classifier
pub struct OpenAiVisionClassifier {
    name: String,
    client: ChatCompletionsClient,
}

impl OpenAiVisionClassifier {
    pub fn new(name: impl Into<String>, client: ChatCompletionsClient) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl Classifier for OpenAiVisionClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn classify(&self, image: &ImageRef) -> Result<IdentificationVote, CapabilityError> {
        let image_url = image_url_for_request(&image.url).await?;

        let messages = vec![
            json!({"role": "system", "content": SYSTEM_PROMPT}),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "Identify this plant."},
                    {"type": "image_url", "image_url": {"url": image_url}}
                ]
            }),
        ];

        let reply: SpeciesReply = self
            .client
            .complete_json(messages, "plant_identification", species_schema())
            .await?;

        debug!(
            provider = %self.name,
            species = %reply.common_name,
            confidence = reply.confidence,
            "Vision model replied"
        );

        Ok(IdentificationVote::new(
            &self.name,
            reply.common_name.trim(),
            reply.scientific_name.trim(),
            reply.confidence,
            reply.reasoning,
        ))
    }
}

/// Resolve the image reference into something the API accepts
async fn image_url_for_request(url: &str) -> Result<String, CapabilityError> {
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("data:") {
        return Ok(url.to_string());
    }

    let path = url.strip_prefix("file://").unwrap_or(url);
    let bytes = tokio::fs::read(path).await?;
    Ok(format!(
        "data:{};base64,{}",
        mime_for_path(Path::new(path)),
        STANDARD.encode(bytes)
    ))
}

fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

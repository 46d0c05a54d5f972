//! OpenAI-compatible chat completions client
//!
//! Shared transport for the vision classifier and the care extractor. Every
//! request asks for a strict JSON schema response, so the reply is parsed
//! straight into the caller's typed struct.
//!
//! # API Reference
//! - Endpoint: `{base_url}/chat/completions`
//! - `response_format: {"type": "json_schema", "json_schema": {...}}`

use crate::types::CapabilityError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Default timeout for model requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Chat completions client bound to one model
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

impl ChatCompletionsClient {
    /// Create client for `model` at `base_url` (e.g. `https://api.openai.com/v1`)
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, CapabilityError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CapabilityError::NotConfigured("API key is empty".to_string()));
        }

        let http_client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| CapabilityError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `messages` and parse the structured reply into `T`
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        messages: Vec<Value>,
        schema_name: &str,
        schema: Value,
    ) -> Result<T, CapabilityError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.2,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name,
                    "strict": true,
                    "schema": schema,
                },
            },
        });

        debug!(model = %self.model, schema = schema_name, "Sending chat completion request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Api(format!(
                "HTTP {} from {}: {}",
                status,
                self.model,
                truncate_for_log(&detail)
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Parse(format!("Failed to parse completion: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::Parse("Completion has no content".to_string()))?;

        parse_content(&content)
    }
}

/// Parse model output, tolerating a Markdown code fence around the JSON
pub(crate) fn parse_content<T: DeserializeOwned>(content: &str) -> Result<T, CapabilityError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim()).map_err(|e| {
        CapabilityError::Parse(format!(
            "Model output does not match schema: {} ({})",
            e,
            truncate_for_log(unfenced)
        ))
    })
}

fn truncate_for_log(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        name: String,
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = ChatCompletionsClient::new("https://api.openai.com/v1", "gpt-4o", "  ");
        assert!(matches!(result, Err(CapabilityError::NotConfigured(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ChatCompletionsClient::new("http://localhost:8080/v1/", "m", "key").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert_eq!(client.model(), "m");
    }

    #[test]
    fn test_parse_plain_and_fenced_content() {
        let plain: Reply = parse_content(r#"{"name": "Pothos"}"#).unwrap();
        assert_eq!(plain.name, "Pothos");

        let fenced: Reply = parse_content("```json\n{\"name\": \"Pothos\"}\n```").unwrap();
        assert_eq!(fenced, plain);
    }

    #[test]
    fn test_parse_mismatched_content() {
        let result: Result<Reply, _> = parse_content("I think it's a pothos");
        assert!(matches!(result, Err(CapabilityError::Parse(_))));
    }
}

//! Care Extractor
//!
//! Turns free document text into a typed care record using an
//! OpenAI-compatible model with a strict JSON schema.
//!
//! Each trackable field carries a `present` flag and its own confidence. The
//! model is told to mark a field absent rather than guess, so the source
//! validator can count how much the document actually states.

use super::openai_client::ChatCompletionsClient;
use crate::models::SunlightLevel;
use crate::types::{CapabilityError, CareExtraction, CareExtractor, ExtractedField, SpeciesRef};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

const SYSTEM_PROMPT: &str = "You extract houseplant care instructions from a web document. \
Only report values the document states explicitly for the named species. \
For every field set present=true only when the document states it; otherwise set present=false, \
confidence 0, and a neutral placeholder value. Never invent numbers. \
watering_days and fertilizing_days are intervals in days (convert 'weekly' to 7, 'monthly' to 30). \
sunlight_level is one of low, medium, bright, direct. \
care_notes is at most two sentences of species-specific tips from the document. \
confidence is how sure you are that the document describes this species.";

fn field_schema(value: Value) -> Value {
    json!({
        "type": "object",
        "properties": {
            "value": value,
            "present": {"type": "boolean"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1}
        },
        "required": ["value", "present", "confidence"],
        "additionalProperties": false
    })
}

fn care_schema() -> Value {
    let levels: Vec<&str> = SunlightLevel::ALL.iter().map(|l| l.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "watering_days": field_schema(json!({"type": "integer", "minimum": 0})),
            "fertilizing_days": field_schema(json!({"type": "integer", "minimum": 0})),
            "sunlight_level": field_schema(json!({"type": "string", "enum": levels})),
            "humidity": field_schema(json!({"type": "string"})),
            "temperature_range": field_schema(json!({"type": "string"})),
            "care_notes": {"type": "string"},
            "confidence": {"type": "number", "minimum": 0, "maximum": 1}
        },
        "required": [
            "watering_days", "fertilizing_days", "sunlight_level",
            "humidity", "temperature_range", "care_notes", "confidence"
        ],
        "additionalProperties": false
    })
}

/// OpenAI-compatible structured care extractor
pub struct OpenAiCareExtractor {
    client: ChatCompletionsClient,
}

impl OpenAiCareExtractor {
    pub fn new(client: ChatCompletionsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CareExtractor for OpenAiCareExtractor {
    async fn extract(
        &self,
        text: &str,
        species: &SpeciesRef,
    ) -> Result<CareExtraction, CapabilityError> {
        let messages = vec![
            json!({"role": "system", "content": SYSTEM_PROMPT}),
            json!({
                "role": "user",
                "content": format!(
                    "Species: {} ({})\n\nDocument:\n{}",
                    species.common_name, species.scientific_name, text
                )
            }),
        ];

        let raw: CareExtraction = self
            .client
            .complete_json(messages, "care_extraction", care_schema())
            .await?;
        let extraction = normalize(raw);

        debug!(
            species = %species.scientific_name,
            fields_present = extraction.fields_present(),
            confidence = extraction.confidence,
            "Care extraction complete"
        );

        Ok(extraction)
    }
}

/// Clamp confidences and drop claims that cannot be real
///
/// A zero-day interval or a blank text field is treated as not stated.
fn normalize(raw: CareExtraction) -> CareExtraction {
    fn days(field: ExtractedField<u32>) -> ExtractedField<u32> {
        let present = field.present && field.value > 0;
        ExtractedField::new(field.value, present, field.confidence)
    }

    fn text(field: ExtractedField<String>) -> ExtractedField<String> {
        let value = field.value.trim().to_string();
        let present = field.present && !value.is_empty();
        ExtractedField::new(value, present, field.confidence)
    }

    CareExtraction {
        watering_days: days(raw.watering_days),
        fertilizing_days: days(raw.fertilizing_days),
        sunlight_level: ExtractedField::new(
            raw.sunlight_level.value,
            raw.sunlight_level.present,
            raw.sunlight_level.confidence,
        ),
        humidity: text(raw.humidity),
        temperature_range: text(raw.temperature_range),
        care_notes: raw.care_notes.trim().to_string(),
        confidence: raw.confidence.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::openai_client::parse_content;

    const REPLY: &str = r#"{
        "watering_days": {"value": 10, "present": true, "confidence": 0.9},
        "fertilizing_days": {"value": 0, "present": true, "confidence": 0.4},
        "sunlight_level": {"value": "low", "present": true, "confidence": 1.3},
        "humidity": {"value": "  ", "present": true, "confidence": 0.5},
        "temperature_range": {"value": "15-29°C", "present": true, "confidence": 0.7},
        "care_notes": " Tolerates neglect. ",
        "confidence": 0.85
    }"#;

    #[test]
    fn test_reply_normalized() {
        let raw: CareExtraction = parse_content(REPLY).unwrap();
        let extraction = normalize(raw);

        assert_eq!(extraction.watering_days.value, 10);
        assert!(extraction.watering_days.present);
        assert!(!extraction.fertilizing_days.present);
        assert!(!extraction.humidity.present);
        assert_eq!(extraction.sunlight_level.confidence, 1.0);
        assert_eq!(extraction.care_notes, "Tolerates neglect.");
        assert_eq!(extraction.fields_present(), 3);
    }

    #[test]
    fn test_schema_lists_every_sunlight_level() {
        let schema = care_schema();
        let levels = &schema["properties"]["sunlight_level"]["properties"]["value"]["enum"];
        assert_eq!(levels, &json!(["low", "medium", "bright", "direct"]));
    }

    #[test]
    fn test_unknown_sunlight_level_is_parse_error() {
        let bad = REPLY.replace("\"low\"", "\"partial\"");
        let result: Result<CareExtraction, _> = parse_content(&bad);
        assert!(matches!(result, Err(CapabilityError::Parse(_))));
    }
}

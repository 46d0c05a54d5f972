//! Care source and consolidated care profile models

use crate::types::{CareExtraction, ExtractedField};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Light requirement category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SunlightLevel {
    Low,
    Medium,
    Bright,
    Direct,
}

impl SunlightLevel {
    pub const ALL: [SunlightLevel; 4] = [
        SunlightLevel::Low,
        SunlightLevel::Medium,
        SunlightLevel::Bright,
        SunlightLevel::Direct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SunlightLevel::Low => "low",
            SunlightLevel::Medium => "medium",
            SunlightLevel::Bright => "bright",
            SunlightLevel::Direct => "direct",
        }
    }
}

impl fmt::Display for SunlightLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SunlightLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(SunlightLevel::Low),
            "medium" => Ok(SunlightLevel::Medium),
            "bright" => Ok(SunlightLevel::Bright),
            "direct" => Ok(SunlightLevel::Direct),
            other => Err(format!("Unknown sunlight level: {}", other)),
        }
    }
}

/// Care claims of one validated source document
///
/// Immutable once accepted by the research orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareSourceRecord {
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// 0 when the source does not state an interval
    pub watering_days: u32,
    pub fertilizing_days: u32,
    pub sunlight_level: SunlightLevel,
    pub humidity: String,
    pub temperature_range: String,
    pub care_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl CareSourceRecord {
    /// Build an accepted record from a validated extraction
    pub fn from_extraction(
        source_name: impl Into<String>,
        source_url: Option<String>,
        extraction: CareExtraction,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            source_url,
            watering_days: stated_interval(&extraction.watering_days),
            fertilizing_days: stated_interval(&extraction.fertilizing_days),
            sunlight_level: extraction.sunlight_level.value,
            humidity: extraction.humidity.value,
            temperature_range: extraction.temperature_range.value,
            care_notes: extraction.care_notes,
            confidence: Some(extraction.confidence),
        }
    }
}

fn stated_interval(field: &ExtractedField<u32>) -> u32 {
    if field.present {
        field.value
    } else {
        0
    }
}

/// Consolidated care profile
///
/// Derived deterministically from the accepted sources; a new research run
/// produces a new profile rather than mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareProfile {
    pub watering_days: u32,
    pub fertilizing_days: u32,
    pub sunlight_level: SunlightLevel,
    pub humidity: String,
    pub temperature_range: String,
    pub care_notes: String,
}

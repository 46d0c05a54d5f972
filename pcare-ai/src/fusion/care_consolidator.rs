//! Care Consolidator
//!
//! Merges the care claims of several validated sources into one profile.
//!
//! # Fusion Strategy
//! - **watering_days / fertilizing_days**: arithmetic mean over the sources
//!   that state the interval, rounded half away from zero; 0 when none do
//! - **sunlight_level**: mode; on a tie, the level that reaches the winning
//!   count first in a left-to-right scan of the sources
//! - **humidity / temperature_range**: taken verbatim from the first source
//! - **care_notes**: non-empty notes joined with a space, capped at 200
//!   characters with `...` appended when cut
//!
//! Output depends only on the ordered input, so repeated runs are identical.

use crate::models::{CareProfile, CareSourceRecord, SunlightLevel};
use crate::types::FusionError;
use tracing::debug;

/// Maximum length of consolidated care notes, in characters
pub const MAX_CARE_NOTES_CHARS: usize = 200;

/// Care Consolidator
#[derive(Debug, Clone, Default)]
pub struct CareConsolidator;

impl CareConsolidator {
    pub fn new() -> Self {
        Self
    }

    /// Consolidate at least one source into a care profile
    pub fn consolidate(&self, sources: &[CareSourceRecord]) -> Result<CareProfile, FusionError> {
        let first = sources.first().ok_or_else(|| {
            FusionError::InsufficientData("no care sources to consolidate".to_string())
        })?;

        let watering_days = rounded_mean(sources.iter().map(|s| s.watering_days));
        let fertilizing_days = rounded_mean(sources.iter().map(|s| s.fertilizing_days));
        let sunlight_level = sunlight_mode(sources);

        // Humidity and temperature are free text with no common scale, so the
        // first (highest-ranked) source wins.
        let humidity = first.humidity.clone();
        let temperature_range = first.temperature_range.clone();

        let care_notes = merge_notes(sources);

        debug!(
            sources = sources.len(),
            watering_days,
            fertilizing_days,
            sunlight = %sunlight_level,
            "Consolidated care profile"
        );

        Ok(CareProfile {
            watering_days,
            fertilizing_days,
            sunlight_level,
            humidity,
            temperature_range,
            care_notes,
        })
    }
}

/// Mean of the non-zero values; 0 marks an interval the source left out
fn rounded_mean(values: impl Iterator<Item = u32>) -> u32 {
    let (sum, count) = values
        .filter(|v| *v > 0)
        .fold((0u64, 0u64), |(sum, count), v| (sum + v as u64, count + 1));
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u32
}

/// Most frequent sunlight level, tie broken by whichever reaches the top count first
fn sunlight_mode(sources: &[CareSourceRecord]) -> SunlightLevel {
    let count_of = |level: SunlightLevel| sources.iter().filter(|s| s.sunlight_level == level).count();
    let max_count = SunlightLevel::ALL
        .iter()
        .map(|level| count_of(*level))
        .max()
        .unwrap_or(0);

    let mut running = [0usize; 4];
    for source in sources {
        let slot = SunlightLevel::ALL
            .iter()
            .position(|level| *level == source.sunlight_level)
            .unwrap_or(0);
        running[slot] += 1;
        if running[slot] == max_count {
            return source.sunlight_level;
        }
    }

    // Unreachable for non-empty input
    SunlightLevel::Medium
}

fn merge_notes(sources: &[CareSourceRecord]) -> String {
    let joined = sources
        .iter()
        .map(|s| s.care_notes.trim())
        .filter(|notes| !notes.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.chars().count() <= MAX_CARE_NOTES_CHARS {
        return joined;
    }

    let mut truncated: String = joined.chars().take(MAX_CARE_NOTES_CHARS).collect();
    truncated.push_str("...");
    truncated
}

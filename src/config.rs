//! Pipeline configuration
//!
//! All windows are in milliseconds. Defaults match the 2 minute merge gap and
//! 24 hour cohort/return windows used for the training data.

use crate::error::FeatureError;
use crate::types::Millis;
use serde::{Deserialize, Serialize};

pub const MINUTE_MS: Millis = 60 * 1000;
pub const HOUR_MS: Millis = 60 * MINUTE_MS;

/// Sessions closer than this are merged
pub const DEFAULT_MERGE_GAP_MS: Millis = 2 * MINUTE_MS;

/// Users active more recently than this are left out of the cohort
pub const DEFAULT_COHORT_WINDOW_MS: Millis = 24 * HOUR_MS;

/// A new session within this window counts as a return
pub const DEFAULT_RETURN_WINDOW_MS: Millis = 24 * HOUR_MS;

/// Convert a whole number of hours to milliseconds, rejecting overflow
pub fn hours_to_ms(hours: i64) -> Result<Millis, FeatureError> {
    hours
        .checked_mul(HOUR_MS)
        .ok_or_else(|| FeatureError::InvalidConfig(format!("{hours} hours is out of range")))
}

/// Tunable windows for reconstruction, cohort selection and labelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub merge_gap_ms: Millis,
    pub cohort_window_ms: Millis,
    pub return_window_ms: Millis,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            merge_gap_ms: DEFAULT_MERGE_GAP_MS,
            cohort_window_ms: DEFAULT_COHORT_WINDOW_MS,
            return_window_ms: DEFAULT_RETURN_WINDOW_MS,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from JSON, filling unspecified fields with defaults
    pub fn from_json(json: &str) -> Result<Self, FeatureError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON for persistence
    pub fn to_json(&self) -> Result<String, FeatureError> {
        serde_json::to_string_pretty(self).map_err(FeatureError::JsonError)
    }

    /// All windows must be non-negative
    pub fn validate(&self) -> Result<(), FeatureError> {
        for (name, value) in [
            ("merge_gap_ms", self.merge_gap_ms),
            ("cohort_window_ms", self.cohort_window_ms),
            ("return_window_ms", self.return_window_ms),
        ] {
            if value < 0 {
                return Err(FeatureError::InvalidConfig(format!(
                    "{name} must not be negative (got {value})"
                )));
            }
        }
        Ok(())
    }
}

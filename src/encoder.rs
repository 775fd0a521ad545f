//! Matrix encoder
//!
//! Serializes feature vectors for training:
//! - headerless CSV, one row per cohort user, columns
//!   `length,spins,winRatio,winStreak,loseStreak,result`; missing spin statistics
//!   are written as `-1`
//! - a JSON report with producer metadata and the same rows keyed by user id
//! - a JSON dump of the reconstructed cohort sessions

use crate::error::FeatureError;
use crate::types::{FeatureMatrix, FeatureReport, FeatureVector, ReportProducer, UserMap};
use crate::{PRODUCER_NAME, VERSION};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Column order of matrix rows
pub const MATRIX_COLUMNS: [&str; 6] = [
    "length",
    "spins",
    "winRatio",
    "winStreak",
    "loseStreak",
    "result",
];

/// Placeholder written for statistics that do not exist
const ABSENT: &str = "-1";

/// Feature matrix encoder
pub struct MatrixEncoder {
    instance_id: String,
}

impl Default for MatrixEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MatrixEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Encode one feature vector as a CSV row without the trailing newline
    pub fn encode_row(features: &FeatureVector) -> String {
        let (ratio, win_streak, lose_streak) = match &features.stats {
            Some(stats) => (
                stats.win_ratio.to_string(),
                stats.win_streak.to_string(),
                stats.lose_streak.to_string(),
            ),
            None => (ABSENT.to_string(), ABSENT.to_string(), ABSENT.to_string()),
        };

        format!(
            "{},{},{},{},{},{}",
            features.length,
            features.spins,
            ratio,
            win_streak,
            lose_streak,
            features.result()
        )
    }

    /// Encode the whole matrix; every row is newline-terminated
    pub fn encode_csv(&self, matrix: &FeatureMatrix) -> String {
        matrix
            .values()
            .map(|features| Self::encode_row(features) + "\n")
            .collect()
    }

    /// Build a JSON report for the matrix
    pub fn encode(&self, matrix: &FeatureMatrix, now: DateTime<Utc>) -> FeatureReport {
        FeatureReport {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            now_utc: now.to_rfc3339(),
            computed_at_utc: Utc::now().to_rfc3339(),
            columns: MATRIX_COLUMNS.iter().map(|c| c.to_string()).collect(),
            cohort_size: matrix.len(),
            features: matrix.clone(),
        }
    }

    /// Encode the JSON report to a string
    pub fn encode_to_json(
        &self,
        matrix: &FeatureMatrix,
        now: DateTime<Utc>,
    ) -> Result<String, FeatureError> {
        let report = self.encode(matrix, now);
        serde_json::to_string_pretty(&report).map_err(FeatureError::JsonError)
    }

    /// Dump reconstructed users and their sessions
    pub fn encode_sessions_json(&self, users: &UserMap) -> Result<String, FeatureError> {
        serde_json::to_string(users)
            .map_err(|e| FeatureError::EncodingError(format!("Failed to encode sessions: {e}")))
    }
}

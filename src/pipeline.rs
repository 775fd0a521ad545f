//! Pipeline orchestration
//!
//! Log store → session reconstruction → cohort selection → feature extraction
//! → matrix encoding. The whole batch is processed in one deterministic pass;
//! any record that cannot be decoded aborts the batch.

use crate::cohort::CohortSelector;
use crate::config::PipelineConfig;
use crate::encoder::MatrixEncoder;
use crate::error::FeatureError;
use crate::features::FeatureExtractor;
use crate::schema::{LogStore, RawRecord};
use crate::session::SessionReconstructor;
use crate::types::{FeatureMatrix, UserMap};
use chrono::{DateTime, Utc};

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Number of users seen in the batch before cohort filtering
    pub users_seen: usize,
    /// Reconstructed sessions of the cohort users
    pub cohort: UserMap,
    /// Feature vectors keyed by user id
    pub features: FeatureMatrix,
}

/// Convert a batch of raw records to a CSV feature matrix (stateless, one-shot).
///
/// Uses the default windows: 2 minute merge gap, 24 hour cohort and return
/// windows.
///
/// # Example
/// ```ignore
/// let csv = records_to_matrix(records, Utc::now())?;
/// ```
pub fn records_to_matrix<I>(records: I, now: DateTime<Utc>) -> Result<String, FeatureError>
where
    I: IntoIterator<Item = RawRecord>,
{
    let processor = RetentionProcessor::new();
    let output = processor.process(records, now)?;
    Ok(processor.encoder().encode_csv(&output.features))
}

/// Configured pipeline processor
pub struct RetentionProcessor {
    config: PipelineConfig,
    reconstructor: SessionReconstructor,
    selector: CohortSelector,
    extractor: FeatureExtractor,
    encoder: MatrixEncoder,
}

impl Default for RetentionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl RetentionProcessor {
    /// Create a processor with the default windows
    pub fn new() -> Self {
        Self::build(PipelineConfig::default())
    }

    /// Create a processor with custom windows
    pub fn with_config(config: PipelineConfig) -> Result<Self, FeatureError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PipelineConfig) -> Self {
        Self {
            config,
            reconstructor: SessionReconstructor::new(config.merge_gap_ms),
            selector: CohortSelector::new(config.cohort_window_ms),
            extractor: FeatureExtractor::new(config.return_window_ms),
            encoder: MatrixEncoder::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn encoder(&self) -> &MatrixEncoder {
        &self.encoder
    }

    /// Reconstruct sessions for every user in the batch
    pub fn reconstruct<I>(&self, records: I) -> Result<UserMap, FeatureError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        self.reconstructor.reconstruct(records)
    }

    /// Reconstruct sessions and keep only the cohort users
    pub fn cohort<I>(&self, records: I, now: DateTime<Utc>) -> Result<UserMap, FeatureError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let users = self.reconstruct(records)?;
        Ok(self.selector.select(users, now))
    }

    /// Run the full pipeline over a batch of records
    pub fn process<I>(
        &self,
        records: I,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutput, FeatureError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let users = self.reconstruct(records)?;
        let users_seen = users.len();
        let cohort = self.selector.select(users, now);
        let features = self.extractor.extract_all(&cohort);

        tracing::info!(
            "Extracted features for {} cohort users ({} users seen)",
            features.len(),
            users_seen
        );

        Ok(PipelineOutput {
            users_seen,
            cohort,
            features,
        })
    }

    /// Load a batch from a log store and run the full pipeline
    pub fn process_store(
        &self,
        store: &dyn LogStore,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutput, FeatureError> {
        let records = store.load()?;
        tracing::debug!("Loaded {} records", records.len());
        self.process(records, now)
    }
}

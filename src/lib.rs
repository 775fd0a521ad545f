//! slot-retention - Retention training data from voice slot-machine logs
//!
//! Turns per-turn request/response logs into a feature matrix with a binary
//! "returned within 24 hours" label through a deterministic pipeline:
//! log store → session reconstruction → cohort selection → feature extraction
//! → matrix encoding.
//!
//! ## Modules
//!
//! - **schema**: raw turn records and the log stores that load them
//! - **session**: grouping records into merged, ordered sessions per user
//! - **cohort**: keeping users whose observation window has closed
//! - **features**: per-user features from the first session plus the label
//! - **encoder**: CSV matrix and JSON report output

pub mod cohort;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod types;

pub use cohort::CohortSelector;
pub use config::PipelineConfig;
pub use encoder::MatrixEncoder;
pub use error::FeatureError;
pub use features::FeatureExtractor;
pub use pipeline::{records_to_matrix, PipelineOutput, RetentionProcessor};
pub use session::SessionReconstructor;

// Schema exports
pub use schema::{DirectoryLogStore, LogStore, NdjsonLogStore, RawRecord};

// Type exports
pub use types::{FeatureMatrix, FeatureVector, Record, Session, SpinStats, User, UserMap};

/// Crate version embedded in JSON reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for JSON reports
pub const PRODUCER_NAME: &str = "slot-retention";

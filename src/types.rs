//! Core data types flowing through the retention pipeline
//!
//! Records are decoded once from the log store and never change afterwards.
//! Sessions and users are built by the reconstructor and are read-only once
//! reconstruction finishes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Epoch milliseconds
pub type Millis = i64;

/// Users keyed by user id, iterated in id order
pub type UserMap = BTreeMap<String, User>;

/// Feature vectors keyed by user id, iterated in id order
pub type FeatureMatrix = BTreeMap<String, FeatureVector>;

/// Outcome of a single spin, determined from the bankroll before and after a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpinOutcome {
    Win,
    Loss,
}

/// One user turn (request/response pair)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Request timestamp in epoch milliseconds
    pub timestamp: Millis,
    /// Bankroll carried in the request's session attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bankroll_before: Option<f64>,
    /// Bankroll carried in the response's session attributes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bankroll_after: Option<f64>,
    /// Full decoded record body
    pub body: serde_json::Value,
}

impl Record {
    /// Win/loss signal for this turn.
    ///
    /// `None` when either bankroll is missing or the bankroll did not move.
    pub fn outcome(&self) -> Option<SpinOutcome> {
        let (before, after) = (self.bankroll_before?, self.bankroll_after?);
        if after > before {
            Some(SpinOutcome::Win)
        } else if after < before {
            Some(SpinOutcome::Loss)
        } else {
            None
        }
    }
}

/// A reconstructed play session for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier from the log store
    pub id: String,
    /// Earliest record timestamp seen while grouping
    pub start: Millis,
    /// Latest record timestamp seen while grouping
    pub end: Millis,
    /// Records, newest first once reconstruction finishes
    pub contents: Vec<Record>,
    /// Ids of sessions whose records were merged into this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub absorbed: Vec<String>,
}

impl Session {
    /// Start a session from its first record
    pub fn new(id: impl Into<String>, record: Record) -> Self {
        Self {
            id: id.into(),
            start: record.timestamp,
            end: record.timestamp,
            contents: vec![record],
            absorbed: Vec::new(),
        }
    }

    /// Add a record, widening the session span to cover it
    pub fn absorb(&mut self, record: Record) {
        self.start = self.start.min(record.timestamp);
        self.end = self.end.max(record.timestamp);
        self.contents.push(record);
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// A user and their reconstructed sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User identifier from the log store
    pub id: String,
    /// Sessions ordered by start, most recent first
    pub sessions: Vec<Session>,
}

impl User {
    /// The most recent session
    pub fn latest_session(&self) -> Option<&Session> {
        self.sessions.first()
    }

    /// The chronologically first session, the source of all features
    pub fn reference_session(&self) -> Option<&Session> {
        self.sessions.last()
    }

    /// The session that started right after the reference session.
    ///
    /// `None` for a user with a single session.
    pub fn second_oldest_session(&self) -> Option<&Session> {
        self.sessions.iter().rev().nth(1)
    }
}

/// Win/loss statistics over the spins of a session.
///
/// Only present when the session had at least one spin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpinStats {
    /// Fraction of spins that were wins
    pub win_ratio: f64,
    /// Longest run of consecutive wins
    pub win_streak: usize,
    /// Longest run of consecutive losses
    pub lose_streak: usize,
}

/// Features and retention label for one cohort user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Number of records in the reference session
    pub length: usize,
    /// Number of records with a determinable bankroll change
    pub spins: usize,
    /// Spin statistics, absent when `spins == 0`
    pub stats: Option<SpinStats>,
    /// Whether the user started another session within the return window
    pub returned: bool,
}

impl FeatureVector {
    /// Numeric label column (1 = returned)
    pub fn result(&self) -> u8 {
        u8::from(self.returned)
    }
}

/// Producer metadata attached to JSON reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique instance identifier (UUID)
    pub instance_id: String,
}

/// JSON feature report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureReport {
    pub producer: ReportProducer,
    /// Processing time used for cohort selection (RFC3339)
    pub now_utc: String,
    /// When this report was computed (RFC3339)
    pub computed_at_utc: String,
    /// Column order of the matrix rows
    pub columns: Vec<String>,
    /// Number of users in the cohort
    pub cohort_size: usize,
    /// Feature vectors keyed by user id
    pub features: FeatureMatrix,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(timestamp: Millis, before: Option<f64>, after: Option<f64>) -> Record {
        Record {
            timestamp,
            bankroll_before: before,
            bankroll_after: after,
            body: json!({}),
        }
    }

    #[test]
    fn test_outcome_from_bankroll() {
        assert_eq!(record(0, Some(10.0), Some(15.0)).outcome(), Some(SpinOutcome::Win));
        assert_eq!(record(0, Some(10.0), Some(5.0)).outcome(), Some(SpinOutcome::Loss));
        assert_eq!(record(0, Some(10.0), Some(10.0)).outcome(), None);
        assert_eq!(record(0, None, Some(10.0)).outcome(), None);
        assert_eq!(record(0, Some(10.0), None).outcome(), None);
    }

    #[test]
    fn test_session_absorb_widens_span() {
        let mut session = Session::new("s1", record(5_000, None, None));
        assert_eq!((session.start, session.end), (5_000, 5_000));

        session.absorb(record(9_000, None, None));
        session.absorb(record(1_000, None, None));

        assert_eq!(session.start, 1_000);
        assert_eq!(session.end, 9_000);
        assert_eq!(session.len(), 3);
    }

    #[test]
    fn test_user_session_accessors() {
        let user = User {
            id: "u".to_string(),
            sessions: vec![
                Session::new("newest", record(3_000, None, None)),
                Session::new("middle", record(2_000, None, None)),
                Session::new("oldest", record(1_000, None, None)),
            ],
        };

        assert_eq!(user.latest_session().unwrap().id, "newest");
        assert_eq!(user.reference_session().unwrap().id, "oldest");
        assert_eq!(user.second_oldest_session().unwrap().id, "middle");
    }

    #[test]
    fn test_single_session_has_no_second_oldest() {
        let user = User {
            id: "u".to_string(),
            sessions: vec![Session::new("only", record(1_000, None, None))],
        };

        assert!(user.second_oldest_session().is_none());
        assert_eq!(user.reference_session().unwrap().id, "only");
    }

    #[test]
    fn test_feature_vector_result_column() {
        let fv = FeatureVector {
            length: 1,
            spins: 0,
            stats: None,
            returned: true,
        };
        assert_eq!(fv.result(), 1);
        assert_eq!(FeatureVector { returned: false, ..fv }.result(), 0);
    }
}

//! Raw turn records as produced by the skill's request/response logger
//!
//! Each logged turn is a JSON document of the form
//!
//! ```json
//! {
//!   "request": {
//!     "session": { "attributes": { "bankroll": 5000 } },
//!     "request": { "timestamp": "2018-03-01T18:22:05Z" }
//!   },
//!   "response": { "sessionAttributes": { "bankroll": 4900 } }
//! }
//! ```
//!
//! Only the request timestamp is required. Bankroll fields are read best-effort.

use crate::error::FeatureError;
use crate::types::{Millis, Record};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON pointer to the request timestamp
pub const TIMESTAMP_POINTER: &str = "/request/request/timestamp";

/// JSON pointer to the bankroll before the turn
pub const BANKROLL_BEFORE_POINTER: &str = "/request/session/attributes/bankroll";

/// JSON pointer to the bankroll after the turn
pub const BANKROLL_AFTER_POINTER: &str = "/response/sessionAttributes/bankroll";

/// A decoded log entry tagged with its owning user and session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Owning user identifier
    pub user_id: String,
    /// Owning session identifier
    pub session_id: String,
    /// Decoded record body
    pub body: Value,
}

impl RawRecord {
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>, body: Value) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            body,
        }
    }

    /// Decode the request timestamp without building a [`Record`].
    ///
    /// Fails when the timestamp is missing or unparseable; there is no
    /// sensible default that would not corrupt session boundaries.
    pub fn timestamp(&self) -> Result<Millis, FeatureError> {
        body_timestamp(&self.body)
    }
}

fn body_timestamp(body: &Value) -> Result<Millis, FeatureError> {
    body.pointer(TIMESTAMP_POINTER)
        .ok_or_else(|| FeatureError::MissingField("request.request.timestamp".to_string()))
        .and_then(parse_timestamp)
}

impl Record {
    /// Build a record from a decoded turn body
    pub fn from_body(body: Value) -> Result<Self, FeatureError> {
        let timestamp = body_timestamp(&body)?;

        let bankroll_before = body.pointer(BANKROLL_BEFORE_POINTER).and_then(Value::as_f64);
        let bankroll_after = body.pointer(BANKROLL_AFTER_POINTER).and_then(Value::as_f64);

        Ok(Record {
            timestamp,
            bankroll_before,
            bankroll_after,
            body,
        })
    }
}

/// Parse a timestamp value to epoch milliseconds.
///
/// Accepts an RFC3339 string or an integer count of epoch milliseconds within
/// the range chrono can represent.
pub fn parse_timestamp(value: &Value) -> Result<Millis, FeatureError> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| FeatureError::DateParseError(format!("{s:?}: {e}"))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(|dt| dt.timestamp_millis())
            .ok_or_else(|| {
                FeatureError::DateParseError(format!(
                    "{n} is not a valid epoch millisecond timestamp"
                ))
            }),
        other => Err(FeatureError::DateParseError(format!(
            "unsupported timestamp value {other}"
        ))),
    }
}

//! Log stores
//!
//! A log store yields every raw record of a batch tagged with its user and
//! session. Two layouts are supported:
//!
//! - a directory tree `<root>/<user id>/<session id>/.../<turn>.json`, one
//!   record body per file, as exported by the skill's logger
//! - NDJSON, one `{"user_id", "session_id", "body"}` envelope per line

use crate::error::FeatureError;
use crate::schema::raw_record::RawRecord;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of raw records for one batch
pub trait LogStore {
    /// Load every record of the batch.
    ///
    /// Any record that cannot be decoded fails the whole batch.
    fn load(&self) -> Result<Vec<RawRecord>, FeatureError>;
}

/// Log store backed by a directory tree of per-turn JSON files
#[derive(Debug, Clone)]
pub struct DirectoryLogStore {
    root: PathBuf,
}

impl DirectoryLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), FeatureError> {
        let mut entries = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();

        for path in entries {
            let hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'));
            if hidden {
                tracing::trace!("Skipping hidden entry {}", path.display());
                continue;
            }

            if path.is_dir() {
                Self::collect_files(&path, files)?;
            } else {
                files.push(path);
            }
        }
        Ok(())
    }

    fn read_record(&self, path: &Path) -> Result<RawRecord, FeatureError> {
        let relative = path.strip_prefix(&self.root).map_err(|e| {
            FeatureError::ParseError(format!("{} is outside the log root: {e}", path.display()))
        })?;

        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        // user / session / ... / file
        if components.len() < 3 {
            return Err(FeatureError::ParseError(format!(
                "{} is not inside a <user>/<session> directory",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)?;
        let body = serde_json::from_str(&content).map_err(|e| {
            FeatureError::ParseError(format!("Failed to parse {}: {e}", path.display()))
        })?;

        Ok(RawRecord::new(
            components[0].clone(),
            components[1].clone(),
            body,
        ))
    }
}

impl LogStore for DirectoryLogStore {
    fn load(&self) -> Result<Vec<RawRecord>, FeatureError> {
        let mut files = Vec::new();
        Self::collect_files(&self.root, &mut files)?;

        tracing::debug!(
            "Found {} log files under {}",
            files.len(),
            self.root.display()
        );

        files.iter().map(|path| self.read_record(path)).collect()
    }
}

/// Log store backed by NDJSON text
#[derive(Debug, Clone)]
pub struct NdjsonLogStore {
    data: String,
}

impl NdjsonLogStore {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }

    /// Read NDJSON from a file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        Ok(Self::new(fs::read_to_string(path)?))
    }

    /// Parse NDJSON (newline-delimited JSON) containing record envelopes
    pub fn parse(ndjson: &str) -> Result<Vec<RawRecord>, FeatureError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(FeatureError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }
}

impl LogStore for NdjsonLogStore {
    fn load(&self) -> Result<Vec<RawRecord>, FeatureError> {
        Self::parse(&self.data)
    }
}

/// Result of record validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub user_id: String,
    pub session_id: String,
    pub error: FeatureError,
}

/// Decode every record and report the ones that would fail reconstruction
pub fn validate_records(records: &[RawRecord]) -> Vec<ValidationResult> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            raw.timestamp().err().map(|error| ValidationResult {
                index,
                user_id: raw.user_id.clone(),
                session_id: raw.session_id.clone(),
                error,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn body(timestamp: &str) -> serde_json::Value {
        json!({ "request": { "request": { "timestamp": timestamp } } })
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("slot-retention-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_json(path: &Path, value: &serde_json::Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    #[test]
    fn test_directory_store_walks_user_and_session_dirs() {
        let root = scratch_dir();
        write_json(&root.join("user-b/sess-1/turn1.json"), &body("2018-03-01T18:00:00Z"));
        write_json(&root.join("user-a/sess-2/turn1.json"), &body("2018-03-01T18:01:00Z"));
        write_json(
            &root.join("user-a/sess-1/nested/turn2.json"),
            &body("2018-03-01T18:02:00Z"),
        );
        fs::write(root.join("user-a/.DS_Store"), "junk").unwrap();

        let records = DirectoryLogStore::new(&root).load().unwrap();
        let keys: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.user_id.as_str(), r.session_id.as_str()))
            .collect();

        assert_eq!(
            keys,
            vec![("user-a", "sess-1"), ("user-a", "sess-2"), ("user-b", "sess-1")]
        );

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_directory_store_rejects_invalid_json() {
        let root = scratch_dir();
        let path = root.join("user/sess/turn.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let result = DirectoryLogStore::new(&root).load();
        assert!(matches!(result, Err(FeatureError::ParseError(_))));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_directory_store_rejects_file_outside_session_dir() {
        let root = scratch_dir();
        write_json(&root.join("user/turn.json"), &body("2018-03-01T18:00:00Z"));

        let result = DirectoryLogStore::new(&root).load();
        assert!(matches!(result, Err(FeatureError::ParseError(_))));

        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_missing_root_is_io_error() {
        let root = std::env::temp_dir().join(format!("slot-retention-missing-{}", uuid::Uuid::new_v4()));
        let result = DirectoryLogStore::new(root).load();
        assert!(matches!(result, Err(FeatureError::IoError(_))));
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"{"user_id": "u1", "session_id": "s1", "body": {"request": {"request": {"timestamp": 1}}}}

{"user_id": "u2", "session_id": "s9", "body": {"request": {"request": {"timestamp": 2}}}}
"#;
        let records = NdjsonLogStore::new(ndjson).load().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].user_id, "u2");
        assert_eq!(records[1].session_id, "s9");
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"user_id\": \"u1\", \"session_id\": \"s1\", \"body\": {}}\nnope\n";
        match NdjsonLogStore::parse(ndjson) {
            Err(FeatureError::ParseError(msg)) => assert!(msg.contains("line 2")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_records() {
        let records = vec![
            RawRecord::new("u1", "s1", body("2018-03-01T18:00:00Z")),
            RawRecord::new("u1", "s2", json!({ "request": {} })),
            RawRecord::new("u2", "s1", body("not a date")),
        ];

        let failures = validate_records(&records);
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].index, 1);
        assert!(matches!(failures[0].error, FeatureError::MissingField(_)));
        assert_eq!(failures[1].user_id, "u2");
        assert!(matches!(failures[1].error, FeatureError::DateParseError(_)));
    }
}

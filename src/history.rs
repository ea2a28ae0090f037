//! Persisted history of applied statements.
//!
//! One JSON document per (environment, script file) pair:
//!
//! ```json
//! {"executed": [{"id": 1, "hash": "-1514979975", "sql": "CREATE TABLE t (id INT)",
//!                "executedAt": "2024-05-01T10:00:00.000Z"}]}
//! ```
//!
//! The file is read whole at run start and replaced whole on save. There is
//! no locking: two concurrent runs against the same pair can lose records.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TrackError, TrackResult};
use crate::statement::Statement;

/// One executed or recorded statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "id")]
    pub sequence_index: usize,
    #[serde(rename = "hash")]
    pub fingerprint: String,
    #[serde(rename = "sql")]
    pub text: String,
    #[serde(rename = "executedAt", with = "iso_millis")]
    pub applied_at: DateTime<Utc>,
    #[serde(
        rename = "recordedOnly",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub recorded_only: bool,
}

impl HistoryRecord {
    /// Record for a statement committed to the database.
    pub fn executed(statement: &Statement, applied_at: DateTime<Utc>) -> Self {
        Self::new(statement, applied_at, false)
    }

    /// Record for a statement marked as applied without running it.
    pub fn recorded(statement: &Statement, applied_at: DateTime<Utc>) -> Self {
        Self::new(statement, applied_at, true)
    }

    fn new(statement: &Statement, applied_at: DateTime<Utc>, recorded_only: bool) -> Self {
        Self {
            sequence_index: statement.sequence_index,
            fingerprint: statement.fingerprint.clone(),
            text: statement.text.clone(),
            applied_at,
            recorded_only,
        }
    }
}

/// Append-only log for one (environment, script) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLog {
    #[serde(default)]
    executed: Vec<HistoryRecord>,
}

impl HistoryLog {
    pub fn append(&mut self, record: HistoryRecord) {
        self.executed.push(record);
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.executed
    }

    pub fn fingerprints(&self) -> impl Iterator<Item = &str> {
        self.executed.iter().map(|r| r.fingerprint.as_str())
    }

    pub fn len(&self) -> usize {
        self.executed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Identity of a history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryKey {
    pub environment: String,
    pub script_name: String,
}

impl HistoryKey {
    /// Key from the script's file name (directory is ignored).
    pub fn for_script(script: &Path, environment: &str) -> Self {
        let script_name = script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| script.to_string_lossy().into_owned());
        Self {
            environment: environment.to_string(),
            script_name,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}-history.json", self.environment, self.script_name)
    }
}

/// Directory of history files.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.sqltrack/history`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".sqltrack").join("history"))
    }

    pub fn path(&self, key: &HistoryKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Load a log, creating an empty file if none exists yet.
    ///
    /// An existing file that does not parse is an error, never an empty log.
    pub fn load(&self, key: &HistoryKey) -> TrackResult<HistoryLog> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let log: HistoryLog = serde_json::from_str(&raw)
                    .map_err(|source| TrackError::CorruptHistory { path: path.clone(), source })?;
                debug!(path = %path.display(), records = log.len(), "loaded history");
                Ok(log)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let log = HistoryLog::default();
                self.save(key, &log)?;
                debug!(path = %path.display(), "created empty history");
                Ok(log)
            }
            Err(source) => Err(TrackError::HistoryIo { path, source }),
        }
    }

    /// Replace the log file: write a sibling temp file, then rename over.
    pub fn save(&self, key: &HistoryKey, log: &HistoryLog) -> TrackResult<PathBuf> {
        let path = self.path(key);
        let io_err = |source: io::Error| TrackError::HistoryIo {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut json = serde_json::to_string_pretty(log).map_err(|e| io_err(io::Error::other(e)))?;
        json.push('\n');

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;

        debug!(path = %path.display(), records = log.len(), "saved history");
        Ok(path)
    }

    /// Delete the log. Returns false if there was nothing to delete.
    pub fn clear(&self, key: &HistoryKey) -> TrackResult<bool> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(TrackError::HistoryIo { path, source }),
        }
    }
}

/// RFC 3339 in UTC with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn statement(index: usize, text: &str) -> Statement {
        Statement {
            sequence_index: index,
            text: text.to_string(),
            fingerprint: crate::fingerprint::fingerprint(text),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap()
    }

    #[test]
    fn test_key_file_name() {
        let key = HistoryKey::for_script(Path::new("db/scripts/schema.sql"), "staging");
        assert_eq!(key.file_name(), "staging-schema.sql-history.json");
    }

    #[test]
    fn test_wire_format() {
        let mut log = HistoryLog::default();
        log.append(HistoryRecord::executed(&statement(1, "SELECT 1"), at(0)));
        log.append(HistoryRecord::recorded(&statement(2, "SELECT 2"), at(1)));

        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "executed": [
                    {"id": 1, "hash": "1974197773", "sql": "SELECT 1",
                     "executedAt": "2024-05-01T10:00:00.000Z"},
                    {"id": 2, "hash": "1974197774", "sql": "SELECT 2",
                     "executedAt": "2024-05-01T10:00:01.000Z", "recordedOnly": true}
                ]
            })
        );
    }

    #[test]
    fn test_reads_foreign_timestamps() {
        let raw = r#"{"executed":[{"id":4,"hash":"97","sql":"a","executedAt":"2024-05-01T12:00:00.123+02:00"}]}"#;
        let log: HistoryLog = serde_json::from_str(raw).unwrap();
        let record = &log.records()[0];
        assert_eq!(record.sequence_index, 4);
        assert!(!record.recorded_only);
        assert_eq!(record.applied_at.to_rfc3339(), "2024-05-01T10:00:00.123+00:00");
    }

    #[test]
    fn test_load_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("history"));
        let key = HistoryKey::for_script(Path::new("a.sql"), "default");

        let log = store.load(&key).unwrap();
        assert!(log.is_empty());
        assert!(store.path(&key).exists());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let key = HistoryKey::for_script(Path::new("a.sql"), "default");

        let mut log = HistoryLog::default();
        log.append(HistoryRecord::executed(&statement(1, "SELECT 1"), at(0)));
        store.save(&key, &log).unwrap();

        assert_eq!(store.load(&key).unwrap(), log);
        assert!(!store.path(&key).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let key = HistoryKey::for_script(Path::new("a.sql"), "default");
        fs::write(store.path(&key), "{\"executed\": [").unwrap();

        let err = store.load(&key).unwrap_err();
        assert!(matches!(err, TrackError::CorruptHistory { .. }));
    }

    #[test]
    fn test_clear_twice() {
        let dir = tempfile::tempdir().unwrap();
        let store = HistoryStore::new(dir.path());
        let key = HistoryKey::for_script(Path::new("a.sql"), "default");
        store.save(&key, &HistoryLog::default()).unwrap();

        assert!(store.clear(&key).unwrap());
        assert!(!store.clear(&key).unwrap());
    }
}

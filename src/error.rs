//! Error taxonomy for a tracked run.
//!
//! Every variant belongs to exactly one [`Phase`], which is what the CLI
//! reports when a run stops.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::splitter::SplitError;

/// The pipeline phase an error stopped the run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuration,
    Split,
    Execution,
    Persistence,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Configuration => write!(f, "configuration"),
            Phase::Split => write!(f, "split"),
            Phase::Execution => write!(f, "execution"),
            Phase::Persistence => write!(f, "persistence"),
        }
    }
}

/// Errors that terminate a run.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("script file not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("failed to read script {}: {source}", path.display())]
    ScriptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("environment [{environment}] not found in {}", path.display())]
    MissingEnvironment { environment: String, path: PathBuf },

    #[error("invalid config {}: {message}", path.display())]
    InvalidConfig { path: PathBuf, message: String },

    #[error("--record-history and --clear-history cannot be combined; pick one mode")]
    ConflictingModes,

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("failed to connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(
        "statement {index} failed: {source}\n  {sql}\nTransaction rolled back - database unchanged, history not updated."
    )]
    Execution {
        index: usize,
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("commit failed: {0}\nTransaction rolled back - history not updated.")]
    Commit(#[source] sqlx::Error),

    #[error("history file {} is unreadable: {source}", path.display())]
    CorruptHistory {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("history I/O failed on {}: {source}", path.display())]
    HistoryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "database changes were COMMITTED but history {} could not be written: {source}\nHistory may be stale; the next run will re-attempt these statements.",
        path.display()
    )]
    StaleHistory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TrackError {
    pub fn phase(&self) -> Phase {
        match self {
            TrackError::ScriptNotFound(_)
            | TrackError::ScriptUnreadable { .. }
            | TrackError::ConfigNotFound(_)
            | TrackError::MissingEnvironment { .. }
            | TrackError::InvalidConfig { .. }
            | TrackError::ConflictingModes => Phase::Configuration,
            TrackError::Split(_) => Phase::Split,
            TrackError::Connection { .. }
            | TrackError::Execution { .. }
            | TrackError::Commit(_) => Phase::Execution,
            TrackError::CorruptHistory { .. }
            | TrackError::HistoryIo { .. }
            | TrackError::StaleHistory { .. } => Phase::Persistence,
        }
    }

    /// True when a transaction was opened and then rolled back.
    pub fn rolled_back(&self) -> bool {
        matches!(self, TrackError::Execution { .. } | TrackError::Commit(_))
    }
}

/// Result alias used throughout the crate.
pub type TrackResult<T> = Result<T, TrackError>;

//! Run-mode controller.
//!
//! One invocation picks exactly one [`RunMode`]:
//! - `Execute`: split, diff against history, confirm, apply in a transaction
//! - `RecordOnly`: split, diff, mark new statements as applied without running them
//! - `ClearHistory`: delete the history file for (script, environment)

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::{ConfigFile, DbConfig};
use crate::console::{Confirm, Console, StdinConfirm};
use crate::error::{TrackError, TrackResult};
use crate::executor::{ExecutionReport, TransactionalExecutor};
use crate::fingerprint::{Fingerprinter, RollingHash};
use crate::history::{HistoryKey, HistoryLog, HistoryRecord, HistoryStore};
use crate::splitter::{DelimiterSplitter, Splitter};
use crate::statement::{Statement, find_new};

/// What an invocation does. Chosen once, before anything runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Execute,
    RecordOnly,
    ClearHistory,
}

impl RunMode {
    /// Both flags at once is a configuration error, not a precedence rule.
    pub fn from_flags(record_history: bool, clear_history: bool) -> TrackResult<Self> {
        match (record_history, clear_history) {
            (true, true) => Err(TrackError::ConflictingModes),
            (true, false) => Ok(RunMode::RecordOnly),
            (false, true) => Ok(RunMode::ClearHistory),
            (false, false) => Ok(RunMode::Execute),
        }
    }
}

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub script: PathBuf,
    pub config: PathBuf,
    pub environment: String,
    pub mode: RunMode,
}

impl Invocation {
    pub fn new(script: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            config: config.into(),
            environment: "default".to_string(),
            mode: RunMode::Execute,
        }
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    HistoryCleared { path: PathBuf },
    HistoryAbsent { path: PathBuf },
    /// Every statement in the script is already in history.
    UpToDate { total: usize },
    Recorded { count: usize, history_path: PathBuf },
    Applied(ExecutionReport),
    /// Execution declined at the confirmation prompt.
    Cancelled { pending: usize },
}

/// Wires splitter, fingerprint, history and executor together.
pub struct Runner<'a> {
    store: HistoryStore,
    splitter: Box<dyn Splitter>,
    fingerprinter: Box<dyn Fingerprinter>,
    confirm: Box<dyn Confirm + 'a>,
    console: &'a Console,
}

impl<'a> Runner<'a> {
    /// Delimiter splitter, rolling-hash fingerprints, stdin confirmation.
    pub fn new(store: HistoryStore, console: &'a Console) -> Self {
        Self {
            store,
            splitter: Box::new(DelimiterSplitter::default()),
            fingerprinter: Box::new(RollingHash),
            confirm: Box::new(StdinConfirm),
            console,
        }
    }

    pub fn with_splitter(mut self, splitter: Box<dyn Splitter>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_fingerprinter(mut self, fingerprinter: Box<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    pub fn with_confirm(mut self, confirm: impl Confirm + 'a) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    pub async fn run(&mut self, invocation: &Invocation) -> TrackResult<RunOutcome> {
        if !invocation.script.is_file() {
            return Err(TrackError::ScriptNotFound(invocation.script.clone()));
        }
        let config = ConfigFile::load(&invocation.config)?;
        config.section(&invocation.environment)?;

        let key = HistoryKey::for_script(&invocation.script, &invocation.environment);
        info!(mode = ?invocation.mode, history = %key.file_name(), "run");

        match invocation.mode {
            RunMode::ClearHistory => self.clear_history(&key),
            RunMode::RecordOnly => self.record_only(invocation, &key),
            RunMode::Execute => {
                let db = config.database(&invocation.environment)?;
                self.execute(invocation, &key, &db).await
            }
        }
    }

    fn clear_history(&self, key: &HistoryKey) -> TrackResult<RunOutcome> {
        let path = self.store.path(key);
        if self.store.clear(key)? {
            self.console
                .success(&format!("Deleted history {}", path.display()));
            Ok(RunOutcome::HistoryCleared { path })
        } else {
            self.console
                .info(&format!("No history at {}", path.display()));
            Ok(RunOutcome::HistoryAbsent { path })
        }
    }

    fn record_only(&self, invocation: &Invocation, key: &HistoryKey) -> TrackResult<RunOutcome> {
        let (mut history, statements, new) = self.pending(invocation, key)?;
        if new.is_empty() {
            return Ok(self.up_to_date(statements.len()));
        }

        let now = Utc::now();
        for statement in &new {
            history.append(HistoryRecord::recorded(statement, now));
        }
        let history_path = self.store.save(key, &history)?;

        self.console.success(&format!(
            "Recorded {} statement(s) as applied without executing them",
            new.len()
        ));
        Ok(RunOutcome::Recorded {
            count: new.len(),
            history_path,
        })
    }

    async fn execute(
        &mut self,
        invocation: &Invocation,
        key: &HistoryKey,
        db: &DbConfig,
    ) -> TrackResult<RunOutcome> {
        let (mut history, statements, new) = self.pending(invocation, key)?;
        if new.is_empty() {
            return Ok(self.up_to_date(statements.len()));
        }

        self.console.info(&format!(
            "{} new statement(s) for [{}] on {}:",
            new.len(),
            invocation.environment,
            db.target()
        ));
        self.console
            .list(new.iter().map(|s| (s.sequence_index, s.text.as_str())));

        let confirmed = self
            .confirm
            .confirm("Execute these statements?")
            .unwrap_or_else(|e| {
                warn!(error = %e, "confirmation prompt failed; declining");
                false
            });
        if !confirmed {
            self.console.warn("Cancelled - nothing executed.");
            return Ok(RunOutcome::Cancelled { pending: new.len() });
        }

        let executor = TransactionalExecutor::new(&self.store, self.console);
        let report = executor.execute(&new, db, key, &mut history).await?;

        self.console.success(&format!(
            "{} statement(s) applied (atomic), history {}",
            report.applied,
            report.history_path.display()
        ));
        Ok(RunOutcome::Applied(report))
    }

    /// Split, fingerprint, load history, diff. Splitting happens before the
    /// history file is touched.
    fn pending(
        &self,
        invocation: &Invocation,
        key: &HistoryKey,
    ) -> TrackResult<(HistoryLog, Vec<Statement>, Vec<Statement>)> {
        let script = fs::read_to_string(&invocation.script).map_err(|source| {
            TrackError::ScriptUnreadable {
                path: invocation.script.clone(),
                source,
            }
        })?;

        let texts = self.splitter.split(&script)?;
        let statements = Statement::sequence(texts, self.fingerprinter.as_ref());
        let history = self.store.load(key)?;
        let new = find_new(&statements, &history);

        self.console.info(&format!(
            "{}: {} statement(s) via {} splitter, {} in history, {} new",
            key.script_name,
            statements.len(),
            self.splitter.name(),
            history.len(),
            new.len()
        ));
        Ok((history, statements, new))
    }

    fn up_to_date(&self, total: usize) -> RunOutcome {
        self.console.success("Nothing to do - all statements already applied.");
        RunOutcome::UpToDate { total }
    }
}

//! Transactional execution of new statements.
//!
//! One connection, one transaction: `BEGIN`, each statement verbatim in
//! order, then `COMMIT`. The first failing statement rolls the whole batch
//! back and nothing is written to history. History is only rewritten after a
//! successful commit.
//!
//! Databases that auto-commit DDL (MySQL) cannot roll those statements back;
//! history is still left untouched on failure.

use chrono::{DateTime, Utc};
use sqlx::{AnyConnection, Connection, Executor};
use tracing::{debug, warn};

use crate::config::DbConfig;
use crate::console::Console;
use crate::error::{TrackError, TrackResult};
use crate::history::{HistoryKey, HistoryLog, HistoryRecord, HistoryStore};
use crate::statement::Statement;

/// Outcome of a committed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub applied: usize,
    pub committed_at: DateTime<Utc>,
    pub history_path: std::path::PathBuf,
}

/// Open a connection to the configured database.
pub async fn connect(db: &DbConfig) -> TrackResult<AnyConnection> {
    sqlx::any::install_default_drivers();
    debug!(target = %db.target(), "connecting");
    AnyConnection::connect(db.url())
        .await
        .map_err(|source| TrackError::Connection {
            target: db.target(),
            source,
        })
}

/// Run `statements` in one transaction on `conn`.
///
/// Returns the commit time. On any failure the transaction is rolled back
/// before returning the error.
pub async fn run_batch(
    conn: &mut AnyConnection,
    statements: &[Statement],
    console: &Console,
) -> TrackResult<DateTime<Utc>> {
    console.info("Starting transaction...");
    let mut tx = conn.begin().await.map_err(|source| TrackError::Connection {
        target: "transaction".to_string(),
        source,
    })?;

    let total = statements.len();
    for (i, statement) in statements.iter().enumerate() {
        console.step(i + 1, total, &statement.text);

        if let Err(source) = (&mut *tx).execute(statement.text.as_str()).await {
            console.error("Rolling back transaction...");
            if let Err(e) = tx.rollback().await {
                warn!(error = %e, "explicit rollback failed; connection drop discards the transaction");
            }
            return Err(TrackError::Execution {
                index: statement.sequence_index,
                sql: statement.text.clone(),
                source,
            });
        }
    }

    tx.commit().await.map_err(TrackError::Commit)?;
    let committed_at = Utc::now();
    debug!(statements = total, "committed");
    Ok(committed_at)
}

/// Applies batches and keeps history in step with the database.
pub struct TransactionalExecutor<'a> {
    store: &'a HistoryStore,
    console: &'a Console,
}

impl<'a> TransactionalExecutor<'a> {
    pub fn new(store: &'a HistoryStore, console: &'a Console) -> Self {
        Self { store, console }
    }

    /// Connect, run the batch, then append and persist one record per
    /// statement. A statement lands in history only if it was committed.
    pub async fn execute(
        &self,
        statements: &[Statement],
        db: &DbConfig,
        key: &HistoryKey,
        history: &mut HistoryLog,
    ) -> TrackResult<ExecutionReport> {
        let mut conn = connect(db).await?;
        self.console
            .success(&format!("Connected to {}", db.target()));

        let committed_at = run_batch(&mut conn, statements, self.console).await?;
        if let Err(e) = conn.close().await {
            debug!(error = %e, "close after commit failed");
        }

        for statement in statements {
            history.append(HistoryRecord::executed(statement, committed_at));
        }

        let history_path = match self.store.save(key, history) {
            Ok(path) => path,
            Err(TrackError::HistoryIo { path, source }) => {
                return Err(TrackError::StaleHistory { path, source });
            }
            Err(other) => return Err(other),
        };

        Ok(ExecutionReport {
            applied: statements.len(),
            committed_at,
            history_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::Section;
    use crate::error::Phase;
    use crate::fingerprint::RollingHash;
    use crate::splitter::{DelimiterSplitter, Splitter};

    fn statements(script: &str) -> Vec<Statement> {
        Statement::sequence(DelimiterSplitter::default().split(script).unwrap(), &RollingHash)
    }

    async fn memory() -> AnyConnection {
        sqlx::any::install_default_drivers();
        AnyConnection::connect("sqlite::memory:").await.unwrap()
    }

    async fn table_count(conn: &mut AnyConnection, name: &str) -> i64 {
        let sql = format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '{}'",
            name
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_commits_in_order() {
        let mut conn = memory().await;
        let stmts = statements(
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
        );

        run_batch(&mut conn, &stmts, &Console::silent()).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM t")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_everything() {
        let mut conn = memory().await;
        let stmts = statements(
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1); INSERT INTO missing VALUES (1);",
        );

        let err = run_batch(&mut conn, &stmts, &Console::silent())
            .await
            .unwrap_err();

        match &err {
            TrackError::Execution { index, sql, .. } => {
                assert_eq!(*index, 3);
                assert_eq!(sql, "INSERT INTO missing VALUES (1)");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.rolled_back());
        assert_eq!(table_count(&mut conn, "t").await, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_commits() {
        let mut conn = memory().await;
        assert!(run_batch(&mut conn, &[], &Console::silent()).await.is_ok());
    }

    #[tokio::test]
    async fn test_history_write_failure_after_commit_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the history directory should be.
        let blocked = dir.path().join("history");
        std::fs::write(&blocked, "not a directory").unwrap();
        let store = HistoryStore::new(blocked.clone());

        let mut section = Section::new();
        section.insert("driver".to_string(), "sqlite".to_string());
        section.insert(
            "db".to_string(),
            dir.path().join("target.db").display().to_string(),
        );
        let db = DbConfig::from_section(&section).unwrap();
        let key = HistoryKey::for_script(Path::new("a.sql"), "default");
        let mut history = HistoryLog::default();
        let console = Console::silent();

        let err = TransactionalExecutor::new(&store, &console)
            .execute(
                &statements("CREATE TABLE t (id INTEGER);"),
                &db,
                &key,
                &mut history,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TrackError::StaleHistory { .. }), "{err}");
        assert_eq!(err.phase(), Phase::Persistence);
        assert!(!err.rolled_back());
        assert!(err.to_string().contains("COMMITTED"));

        let mut conn = connect(&db).await.unwrap();
        assert_eq!(table_count(&mut conn, "t").await, 1);
    }
}

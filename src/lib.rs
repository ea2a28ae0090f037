//! Incremental SQL script runner.
//!
//! Tracks which statements of a script were already applied to a database,
//! per environment, so re-running the script only executes what is new, in
//! a single all-or-nothing transaction.
//!
//! ```text
//! script → Splitter → Statement (fingerprinted) → find_new(history)
//!        → Execute | RecordOnly | ClearHistory
//! ```
//!
//! # Example
//! ```no_run
//! use sqltrack::{Console, HistoryStore, Invocation, RunMode, Runner};
//!
//! # async fn example() -> Result<(), sqltrack::TrackError> {
//! let console = Console::new();
//! let mut runner = Runner::new(HistoryStore::new("/var/lib/sqltrack"), &console);
//! let invocation = Invocation::new("schema.sql", "config.ini")
//!     .environment("staging")
//!     .mode(RunMode::RecordOnly);
//! runner.run(&invocation).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod executor;
pub mod fingerprint;
pub mod history;
pub mod runner;
pub mod splitter;
pub mod statement;

pub use config::{ConfigFile, DbConfig, Driver};
pub use console::{Confirm, Console, FixedAnswer, StdinConfirm};
pub use error::{Phase, TrackError, TrackResult};
pub use executor::{ExecutionReport, TransactionalExecutor};
pub use fingerprint::{Fingerprinter, RollingHash, fingerprint};
pub use history::{HistoryKey, HistoryLog, HistoryRecord, HistoryStore};
pub use runner::{Invocation, RunMode, RunOutcome, Runner};
pub use splitter::{DelimiterSplitter, NaiveSplitter, SplitError, Splitter, SplitterKind};
pub use statement::{Statement, find_new};

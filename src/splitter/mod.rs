//! Statement splitters.
//!
//! A splitter turns raw script text into an ordered list of statement
//! strings. The tracking engine only depends on the [`Splitter`] trait; the
//! concrete strategy is chosen once at process start via [`SplitterKind`].
//!
//! Submodules:
//! - `delimiter`: quote- and comment-aware split on `;`
//! - `naive`: split on every `;`

mod delimiter;
mod naive;

pub use delimiter::DelimiterSplitter;
pub use naive::NaiveSplitter;

use thiserror::Error;

/// A splitter could not determine statement boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SplitError {
    /// A literal, quoted identifier or block comment never closes.
    #[error("unterminated {construct} starting at line {line}, column {column}: {excerpt}")]
    Unterminated {
        construct: &'static str,
        line: usize,
        column: usize,
        excerpt: String,
    },
}

/// Turns script text into ordered, trimmed, non-empty statements.
pub trait Splitter {
    /// Short name used in progress output.
    fn name(&self) -> &'static str;

    fn split(&self, script: &str) -> Result<Vec<String>, SplitError>;
}

/// Available splitter strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SplitterKind {
    /// Respects quotes and comments when looking for `;`
    #[default]
    Delimiter,
    /// Splits on every `;`
    Naive,
}

impl SplitterKind {
    pub fn build(self) -> Box<dyn Splitter> {
        match self {
            SplitterKind::Delimiter => Box::new(DelimiterSplitter::default()),
            SplitterKind::Naive => Box::new(NaiveSplitter),
        }
    }
}

use super::{SplitError, Splitter};

/// Splits on every `;` without looking at quotes or comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveSplitter;

impl Splitter for NaiveSplitter {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn split(&self, script: &str) -> Result<Vec<String>, SplitError> {
        Ok(script
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect())
    }
}

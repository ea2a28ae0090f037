//! Fingerprinted statements and the "what is new" diff against history.

use std::collections::HashSet;

use crate::fingerprint::Fingerprinter;
use crate::history::HistoryLog;

/// One statement from the current script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based position in the script.
    pub sequence_index: usize,
    pub text: String,
    pub fingerprint: String,
}

impl Statement {
    /// Number split statements in source order and fingerprint each one.
    pub fn sequence(texts: Vec<String>, fingerprinter: &dyn Fingerprinter) -> Vec<Statement> {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Statement {
                sequence_index: i + 1,
                fingerprint: fingerprinter.fingerprint(&text),
                text,
            })
            .collect()
    }
}

/// Statements whose fingerprint is not yet in `history`, in original order.
///
/// Membership is by fingerprint alone, so a statement repeated verbatim in
/// the script is new at most once per history.
pub fn find_new(statements: &[Statement], history: &HistoryLog) -> Vec<Statement> {
    let applied: HashSet<&str> = history.fingerprints().collect();
    statements
        .iter()
        .filter(|s| !applied.contains(s.fingerprint.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::RollingHash;
    use crate::history::HistoryRecord;
    use crate::splitter::{DelimiterSplitter, Splitter};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn statements(script: &str) -> Vec<Statement> {
        let texts = DelimiterSplitter::default().split(script).unwrap();
        Statement::sequence(texts, &RollingHash)
    }

    #[test]
    fn test_sequence_is_one_based() {
        let stmts = statements("SELECT 1; SELECT 2");
        assert_eq!(stmts[0].sequence_index, 1);
        assert_eq!(stmts[1].sequence_index, 2);
        assert_eq!(stmts[1].fingerprint, crate::fingerprint::fingerprint("SELECT 2"));
    }

    #[test]
    fn test_empty_history_returns_everything() {
        let stmts = statements("CREATE TABLE t (id INT); INSERT INTO t VALUES (1);");
        let new = find_new(&stmts, &HistoryLog::default());
        assert_eq!(new, stmts);
    }

    #[test]
    fn test_empty_input() {
        assert!(find_new(&[], &HistoryLog::default()).is_empty());
    }

    #[test]
    fn test_only_appended_statement_is_new() {
        let first = statements("CREATE TABLE t (id INT); INSERT INTO t VALUES (1);");
        let mut history = HistoryLog::default();
        for s in &first {
            history.append(HistoryRecord::executed(s, Utc::now()));
        }

        let second = statements(
            "CREATE TABLE t (id INT); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
        );
        let new = find_new(&second, &history);
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].text, "INSERT INTO t VALUES (2)");
        assert_eq!(new[0].sequence_index, 3);
    }

    #[test]
    fn test_order_preserved_and_pure() {
        let stmts = statements("SELECT 1; SELECT 2; SELECT 3; SELECT 4");
        let mut history = HistoryLog::default();
        history.append(HistoryRecord::recorded(&stmts[1], Utc::now()));

        let a = find_new(&stmts, &history);
        let b = find_new(&stmts, &history);
        assert_eq!(a, b);
        let indexes: Vec<usize> = a.iter().map(|s| s.sequence_index).collect();
        assert_eq!(indexes, vec![1, 3, 4]);
    }

    #[test]
    fn test_repeated_statement_already_applied() {
        let stmts = statements("INSERT INTO t VALUES (1); INSERT INTO t VALUES (1)");
        let mut history = HistoryLog::default();
        history.append(HistoryRecord::executed(&stmts[0], Utc::now()));
        assert!(find_new(&stmts, &history).is_empty());
    }
}

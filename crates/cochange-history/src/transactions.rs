//! Transaction log: one line per commit, space-separated file paths.

use std::path::Path;

use cochange_core::{CochangeError, Transaction};
use tracing::debug;

use crate::mining::CommitInfo;

/// Turn mined commits into transactions, preserving commit order.
///
/// A commit without file changes becomes an empty transaction.
///
/// # Examples
///
/// ```
/// use cochange_history::mining::{CommitInfo, FileChange};
/// use cochange_history::transactions::build_transactions;
///
/// let commits = vec![CommitInfo {
///     hash: "abc".into(),
///     committer: "alice".into(),
///     message: "init".into(),
///     files_changed: vec![
///         FileChange { path: "a.rs".into(), lines_added: 1, lines_deleted: 0 },
///         FileChange { path: "b.rs".into(), lines_added: 2, lines_deleted: 0 },
///     ],
/// }];
/// let txs = build_transactions(&commits);
/// assert_eq!(txs[0].files(), ["a.rs", "b.rs"]);
/// ```
pub fn build_transactions(commits: &[CommitInfo]) -> Vec<Transaction> {
    commits
        .iter()
        .map(|c| Transaction::new(c.files_changed.iter().map(|f| f.path.as_str())))
        .collect()
}

/// Parse a transaction log. Every line is one transaction; tokens are split
/// on whitespace and a blank line is an empty transaction.
///
/// # Examples
///
/// ```
/// use cochange_history::transactions::parse_transactions;
///
/// let txs = parse_transactions("a.rs b.rs\n\nc.rs\n");
/// assert_eq!(txs.len(), 3);
/// assert!(txs[1].is_empty());
/// ```
pub fn parse_transactions(content: &str) -> Vec<Transaction> {
    content
        .lines()
        .map(|line| Transaction::new(line.split_whitespace()))
        .collect()
}

/// Render transactions in log format.
pub fn transactions_to_string(transactions: &[Transaction]) -> String {
    let mut out = String::new();
    for tx in transactions {
        out.push_str(&tx.files().join(" "));
        out.push('\n');
    }
    out
}

/// Read a transaction log from `path`.
///
/// # Errors
///
/// Returns [`CochangeError::FileNotFound`] if `path` does not exist, or
/// [`CochangeError::Io`] on other read failures.
pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>, CochangeError> {
    let content = std::fs::read_to_string(path).map_err(|e| CochangeError::from_io(path, e))?;
    let transactions = parse_transactions(&content);
    debug!(path = %path.display(), count = transactions.len(), "read transaction log");
    Ok(transactions)
}

/// Write a transaction log to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`CochangeError::Io`] if the file cannot be written.
pub fn write_transactions(path: &Path, transactions: &[Transaction]) -> Result<(), CochangeError> {
    std::fs::write(path, transactions_to_string(transactions))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_collapses_repeated_whitespace() {
        let txs = parse_transactions("  a.rs \t b.rs   a.rs \n");
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].files(), ["a.rs", "b.rs"]);
    }

    #[test]
    fn written_log_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.txt");
        let txs = vec![
            Transaction::new(["src/A.java", "src/B.java"]),
            Transaction::default(),
            Transaction::new(["src/C.java"]),
        ];
        write_transactions(&path, &txs).unwrap();
        assert_eq!(read_transactions(&path).unwrap(), txs);
    }

    #[test]
    fn missing_log_names_path() {
        let err = read_transactions(Path::new("/nonexistent/transactions.txt")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/transactions.txt"));
    }
}

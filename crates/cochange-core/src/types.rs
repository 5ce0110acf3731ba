use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The set of files changed together in one commit.
///
/// Duplicate paths are collapsed on construction; the first occurrence
/// keeps its position.
///
/// # Examples
///
/// ```
/// use cochange_core::Transaction;
///
/// let tx = Transaction::new(["a.rs", "b.rs", "a.rs"]);
/// assert_eq!(tx.len(), 2);
/// assert!(tx.contains("b.rs"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    files: Vec<String>,
}

impl Transaction {
    /// Build a transaction from file paths, dropping duplicates.
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for file in files {
            let file = file.into();
            if !unique.contains(&file) {
                unique.push(file);
            }
        }
        Self { files: unique }
    }

    /// Files touched by the commit.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Number of distinct files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// `true` for a commit that touched no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Whether `file` is part of this transaction.
    pub fn contains(&self, file: &str) -> bool {
        self.files.iter().any(|f| f == file)
    }
}

/// Change statistics for a single file across the whole history.
///
/// The per-commit averages are derived from the totals and rounded to two
/// decimals; a file with zero commits has averages of zero.
///
/// # Examples
///
/// ```
/// use cochange_core::FileStatsRecord;
///
/// let rec = FileStatsRecord::new("src/Foo.java", 30, 10, 40, 2, 3, 1);
/// assert_eq!(rec.avg_lines_added_per_commit, 10.0);
/// assert_eq!(rec.avg_lines_changed_per_commit, 13.33);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatsRecord {
    /// File path relative to repo root.
    pub path: String,
    /// Total lines added.
    pub lines_added: u64,
    /// Total lines deleted.
    pub lines_deleted: u64,
    /// Total lines changed (added + deleted).
    pub lines_changed_total: u64,
    /// Distinct committers that touched the file.
    pub author_count: u64,
    /// Commits touching the file.
    pub commit_count: u64,
    /// Commits touching the file that were classified as bug fixes.
    pub bug_fix_commit_count: u64,
    /// `lines_added / commit_count`.
    pub avg_lines_added_per_commit: f64,
    /// `lines_deleted / commit_count`.
    pub avg_lines_deleted_per_commit: f64,
    /// `lines_changed_total / commit_count`.
    pub avg_lines_changed_per_commit: f64,
}

impl FileStatsRecord {
    /// Build a record from totals, deriving the per-commit averages.
    pub fn new(
        path: impl Into<String>,
        lines_added: u64,
        lines_deleted: u64,
        lines_changed_total: u64,
        author_count: u64,
        commit_count: u64,
        bug_fix_commit_count: u64,
    ) -> Self {
        Self {
            path: path.into(),
            lines_added,
            lines_deleted,
            lines_changed_total,
            author_count,
            commit_count,
            bug_fix_commit_count,
            avg_lines_added_per_commit: per_commit_average(lines_added, commit_count),
            avg_lines_deleted_per_commit: per_commit_average(lines_deleted, commit_count),
            avg_lines_changed_per_commit: per_commit_average(lines_changed_total, commit_count),
        }
    }
}

/// `total / commits` rounded to two decimals, or `0.0` when there are no commits.
///
/// # Examples
///
/// ```
/// use cochange_core::per_commit_average;
///
/// assert_eq!(per_commit_average(10, 3), 3.33);
/// assert_eq!(per_commit_average(10, 0), 0.0);
/// ```
pub fn per_commit_average(total: u64, commits: u64) -> f64 {
    if commits == 0 {
        return 0.0;
    }
    let avg = total as f64 / commits as f64;
    (avg * 100.0).round() / 100.0
}

/// Per-file statistics keyed by path.
///
/// Keeps insertion order for output; a second record for an already known
/// path is ignored so every path resolves to exactly one record.
///
/// # Examples
///
/// ```
/// use cochange_core::{FileStatsRecord, FileStatsTable};
///
/// let table = FileStatsTable::from_records(vec![
///     FileStatsRecord::new("a.rs", 10, 0, 10, 1, 1, 0),
///     FileStatsRecord::new("a.rs", 99, 0, 99, 1, 1, 0),
/// ]);
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.get("a.rs").unwrap().lines_added, 10);
/// assert!(table.get("b.rs").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileStatsTable {
    records: Vec<FileStatsRecord>,
    index: HashMap<String, usize>,
}

impl FileStatsTable {
    /// Build a table, keeping the first record seen for each path.
    pub fn from_records(records: impl IntoIterator<Item = FileStatsRecord>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.insert(record);
        }
        table
    }

    /// Add `record` unless its path is already present. Returns whether it was added.
    pub fn insert(&mut self, record: FileStatsRecord) -> bool {
        if self.index.contains_key(&record.path) {
            return false;
        }
        self.index.insert(record.path.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// Look up the record for `path`.
    pub fn get(&self, path: &str) -> Option<&FileStatsRecord> {
        self.index.get(path).map(|&i| &self.records[i])
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FileStatsRecord> {
        self.records.iter()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if no file has statistics.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A set of files together with the number of transactions containing it.
///
/// # Examples
///
/// ```
/// use cochange_core::FrequentItemset;
///
/// let set = FrequentItemset::new(vec!["a.rs".into(), "b.rs".into()], 7);
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.freq, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequentItemset {
    /// Member files, in mined order.
    pub items: Vec<String>,
    /// Absolute number of transactions containing every member.
    pub freq: u64,
}

impl FrequentItemset {
    /// Create an itemset.
    pub fn new(items: Vec<String>, freq: u64) -> Self {
        Self { items, freq }
    }

    /// Number of member files.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if the itemset has no members.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use cochange_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

//! Per-file change statistics: accumulation from history and the
//! comma-separated table format.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use cochange_core::table::{join_row, parse_count, parse_number, split_row};
use cochange_core::{CochangeError, FileStatsRecord, FileStatsTable};
use tracing::{debug, warn};

use crate::classify::BugFixClassifier;
use crate::mining::CommitInfo;

/// Column names of the file statistics table, in output order.
pub const FILE_STATS_COLUMNS: [&str; 10] = [
    "FileName",
    "NumberOfLinesAdded",
    "NumberOLinesDeleted",
    "NumberOfLinesChangedTotal",
    "NumberOfAuthors",
    "NumberOfCommits",
    "NumberOfCommitsOnlyForBugFix",
    "AvgLinesAddedPerCommit",
    "AvgLinesDeletedPerCommit",
    "AvgLinesChangedPerCommit",
];

#[derive(Default)]
struct Accumulator {
    lines_added: u64,
    lines_deleted: u64,
    commits: u64,
    bug_fix_commits: u64,
    committers: HashSet<String>,
}

/// Accumulate per-file statistics over the whole history.
///
/// Files appear in the order they were first touched.
///
/// # Examples
///
/// ```
/// use cochange_history::classify::BugFixClassifier;
/// use cochange_history::mining::{CommitInfo, FileChange};
/// use cochange_history::stats::build_file_stats;
///
/// let commits = vec![CommitInfo {
///     hash: "abc".into(),
///     committer: "alice".into(),
///     message: "fix overflow".into(),
///     files_changed: vec![FileChange { path: "a.rs".into(), lines_added: 4, lines_deleted: 2 }],
/// }];
/// let table = build_file_stats(&commits, &BugFixClassifier::new(["fix"]));
/// let rec = table.get("a.rs").unwrap();
/// assert_eq!(rec.lines_changed_total, 6);
/// assert_eq!(rec.bug_fix_commit_count, 1);
/// ```
pub fn build_file_stats(commits: &[CommitInfo], classifier: &BugFixClassifier) -> FileStatsTable {
    let mut order: Vec<String> = Vec::new();
    let mut acc: HashMap<String, Accumulator> = HashMap::new();

    for commit in commits {
        let is_bug_fix = classifier.classify(commit);
        if is_bug_fix {
            debug!(commit = %commit.hash, files = commit.files_changed.len(), "bug-fix commit");
        }
        for change in &commit.files_changed {
            let entry = acc.entry(change.path.clone()).or_insert_with(|| {
                order.push(change.path.clone());
                Accumulator::default()
            });
            entry.lines_added += change.lines_added;
            entry.lines_deleted += change.lines_deleted;
            entry.commits += 1;
            if is_bug_fix {
                entry.bug_fix_commits += 1;
            }
            entry.committers.insert(commit.committer.clone());
        }
    }

    FileStatsTable::from_records(order.into_iter().filter_map(|path| {
        let a = acc.remove(&path)?;
        Some(FileStatsRecord::new(
            path,
            a.lines_added,
            a.lines_deleted,
            a.lines_added + a.lines_deleted,
            a.committers.len() as u64,
            a.commits,
            a.bug_fix_commits,
        ))
    }))
}

/// Largest accepted gap between a stored per-commit average and the value
/// recomputed from the totals.
pub const AVERAGE_TOLERANCE: f64 = 0.01;

/// Render a statistics table with its header row.
pub fn file_stats_to_csv(table: &FileStatsTable) -> String {
    let mut out = FILE_STATS_COLUMNS.join(",");
    out.push('\n');
    for rec in table.iter() {
        let cells = [
            rec.path.clone(),
            rec.lines_added.to_string(),
            rec.lines_deleted.to_string(),
            rec.lines_changed_total.to_string(),
            rec.author_count.to_string(),
            rec.commit_count.to_string(),
            rec.bug_fix_commit_count.to_string(),
            rec.avg_lines_added_per_commit.to_string(),
            rec.avg_lines_deleted_per_commit.to_string(),
            rec.avg_lines_changed_per_commit.to_string(),
        ];
        out.push_str(&join_row(cells.iter().map(String::as_str)));
        out.push('\n');
    }
    out
}

/// Parse a statistics table. Columns are located by header name, so extra
/// columns and any column order are accepted.
///
/// Rows with the wrong number of cells or unparsable counts are skipped
/// with a warning. The per-commit averages are recomputed from the totals;
/// a stored average that differs from the recomputed one by more than
/// [`AVERAGE_TOLERANCE`] is logged and replaced.
///
/// # Errors
///
/// Returns [`CochangeError::Parse`] if the header is missing or lacks one
/// of the [`FILE_STATS_COLUMNS`].
pub fn parse_file_stats(content: &str, source: &str) -> Result<FileStatsTable, CochangeError> {
    let mut lines = content.lines().enumerate();
    let header = lines
        .next()
        .map(|(_, line)| line)
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| CochangeError::Parse(format!("{source}: missing header row")))?;
    let header = split_row(header.trim_start_matches('\u{feff}'))
        .ok_or_else(|| CochangeError::Parse(format!("{source}: malformed header row")))?;

    let column = |name: &str| -> Result<usize, CochangeError> {
        header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| CochangeError::Parse(format!("{source}: missing column {name}")))
    };
    let columns = [
        column("FileName")?,
        column("NumberOfLinesAdded")?,
        column("NumberOLinesDeleted")?,
        column("NumberOfLinesChangedTotal")?,
        column("NumberOfAuthors")?,
        column("NumberOfCommits")?,
        column("NumberOfCommitsOnlyForBugFix")?,
    ];
    let average_columns = [
        column("AvgLinesAddedPerCommit")?,
        column("AvgLinesDeletedPerCommit")?,
        column("AvgLinesChangedPerCommit")?,
    ];

    let mut table = FileStatsTable::default();
    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some(cells) = split_row(line) else {
            warn!(source, line = line_no, "skipping row with unterminated quote");
            continue;
        };
        if cells.len() != header.len() {
            warn!(
                source,
                line = line_no,
                expected = header.len(),
                found = cells.len(),
                "skipping row with wrong cell count"
            );
            continue;
        }

        let path = cells[columns[0]].trim();
        if path.is_empty() {
            warn!(source, line = line_no, "skipping row without file name");
            continue;
        }
        let counts: Option<Vec<u64>> = columns[1..]
            .iter()
            .map(|&c| parse_count(&cells[c]))
            .collect();
        let Some(counts) = counts else {
            warn!(source, line = line_no, "skipping row with unparsable counts");
            continue;
        };

        let record = FileStatsRecord::new(
            path, counts[0], counts[1], counts[2], counts[3], counts[4], counts[5],
        );
        let recomputed = [
            record.avg_lines_added_per_commit,
            record.avg_lines_deleted_per_commit,
            record.avg_lines_changed_per_commit,
        ];
        let averages = FILE_STATS_COLUMNS[7..].iter().zip(average_columns);
        for ((&name, c), expected) in averages.zip(recomputed) {
            let stored = parse_number(&cells[c]);
            if stored.map_or(true, |v| (v - expected).abs() > AVERAGE_TOLERANCE) {
                warn!(
                    source,
                    line = line_no,
                    path,
                    column = name,
                    stored = cells[c].trim(),
                    expected,
                    "stored average disagrees with totals; using recomputed value"
                );
            }
        }
        if !table.insert(record) {
            warn!(source, line = line_no, path, "duplicate file row ignored");
        }
    }

    Ok(table)
}

/// Read a statistics table from `path`.
///
/// # Errors
///
/// Returns [`CochangeError::FileNotFound`] if `path` does not exist,
/// [`CochangeError::Io`] on other read failures, or
/// [`CochangeError::Parse`] for a malformed header.
pub fn read_file_stats(path: &Path) -> Result<FileStatsTable, CochangeError> {
    let content = std::fs::read_to_string(path).map_err(|e| CochangeError::from_io(path, e))?;
    let table = parse_file_stats(&content, &path.display().to_string())?;
    debug!(path = %path.display(), files = table.len(), "read file statistics");
    Ok(table)
}

/// Write a statistics table to `path`, replacing any existing file.
///
/// # Errors
///
/// Returns [`CochangeError::Io`] if the file cannot be written.
pub fn write_file_stats(path: &Path, table: &FileStatsTable) -> Result<(), CochangeError> {
    std::fs::write(path, file_stats_to_csv(table))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mining::FileChange;

    fn commit(committer: &str, message: &str, files: &[(&str, u64, u64)]) -> CommitInfo {
        CommitInfo {
            hash: "abc".into(),
            committer: committer.into(),
            message: message.into(),
            files_changed: files
                .iter()
                .map(|(path, added, deleted)| FileChange {
                    path: (*path).into(),
                    lines_added: *added,
                    lines_deleted: *deleted,
                })
                .collect(),
        }
    }

    fn classifier() -> BugFixClassifier {
        BugFixClassifier::new(["fix", "bug"])
    }

    #[test]
    fn totals_and_averages_accumulate_across_commits() {
        let commits = vec![
            commit("alice", "initial", &[("a.rs", 10, 0), ("b.rs", 5, 0)]),
            commit("bob", "fix crash", &[("a.rs", 2, 3)]),
            commit("alice", "bug in parser", &[("a.rs", 0, 1)]),
        ];
        let table = build_file_stats(&commits, &classifier());

        let a = table.get("a.rs").unwrap();
        assert_eq!(a.lines_added, 12);
        assert_eq!(a.lines_deleted, 4);
        assert_eq!(a.lines_changed_total, 16);
        assert_eq!(a.author_count, 2);
        assert_eq!(a.commit_count, 3);
        assert_eq!(a.bug_fix_commit_count, 2);
        assert_eq!(a.avg_lines_added_per_commit, 4.0);
        assert_eq!(a.avg_lines_deleted_per_commit, 1.33);
        assert_eq!(a.avg_lines_changed_per_commit, 5.33);

        let b = table.get("b.rs").unwrap();
        assert_eq!(b.author_count, 1);
        assert_eq!(b.bug_fix_commit_count, 0);
    }

    #[test]
    fn files_keep_first_touch_order() {
        let commits = vec![
            commit("alice", "one", &[("z.rs", 1, 0)]),
            commit("alice", "two", &[("a.rs", 1, 0), ("z.rs", 1, 0)]),
        ];
        let table = build_file_stats(&commits, &classifier());
        let paths: Vec<&str> = table.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["z.rs", "a.rs"]);
    }

    #[test]
    fn csv_output_reads_back() {
        let commits = vec![
            commit("alice", "fix", &[("src/a,b.java", 3, 1), ("c.java", 7, 0)]),
            commit("bob", "more", &[("c.java", 1, 1)]),
        ];
        let table = build_file_stats(&commits, &classifier());
        let csv = file_stats_to_csv(&table);
        assert!(csv.starts_with("FileName,NumberOfLinesAdded,NumberOLinesDeleted,"));

        let parsed = parse_file_stats(&csv, "test").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("src/a,b.java"), table.get("src/a,b.java"));
        assert_eq!(parsed.get("c.java"), table.get("c.java"));
    }

    #[test]
    fn parse_accepts_decimal_counts_and_reordered_columns() {
        let csv = "NumberOfCommits,FileName,NumberOfLinesAdded,NumberOLinesDeleted,\
NumberOfLinesChangedTotal,NumberOfAuthors,NumberOfCommitsOnlyForBugFix,\
AvgLinesChangedPerCommit,AvgLinesAddedPerCommit,AvgLinesDeletedPerCommit\n\
4.0,a.rs,8.0,4.0,12.0,2.0,0.0,3.0,2.0,1.0\n";
        let table = parse_file_stats(csv, "test").unwrap();
        let rec = table.get("a.rs").unwrap();
        assert_eq!(rec.commit_count, 4);
        assert_eq!(rec.avg_lines_added_per_commit, 2.0);
        assert_eq!(rec.avg_lines_changed_per_commit, 3.0);
    }

    #[test]
    fn average_columns_are_required() {
        let csv = "FileName,NumberOfLinesAdded,NumberOLinesDeleted,NumberOfLinesChangedTotal,\
NumberOfAuthors,NumberOfCommits,NumberOfCommitsOnlyForBugFix,AvgLinesAddedPerCommit\n\
a.rs,1,1,2,1,1,0,1\n";
        let err = parse_file_stats(csv, "stats.csv").unwrap_err();
        assert!(err.to_string().contains("AvgLinesDeletedPerCommit"), "{err}");
    }

    #[test]
    fn stale_averages_are_replaced_by_recomputed_ones() {
        let csv = format!(
            "{}\na.rs,10,2,12,1,4,0,9.5,n/a,3\n",
            FILE_STATS_COLUMNS.join(",")
        );
        let table = parse_file_stats(&csv, "test").unwrap();
        let rec = table.get("a.rs").unwrap();
        assert_eq!(rec.avg_lines_added_per_commit, 2.5);
        assert_eq!(rec.avg_lines_deleted_per_commit, 0.5);
        assert_eq!(rec.avg_lines_changed_per_commit, 3.0);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let csv = format!(
            "{}\n\
a.rs,1,1,2,1,1,0,1,1,2\n\
short,row\n\
b.rs,x,1,2,1,1,0,1,1,2\n\
\n\
c.rs,2,0,2,1,2,1,1,0,1\n",
            FILE_STATS_COLUMNS.join(",")
        );
        let table = parse_file_stats(&csv, "test").unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.get("a.rs").is_some());
        assert!(table.get("b.rs").is_none());
        assert_eq!(table.get("c.rs").unwrap().bug_fix_commit_count, 1);
    }

    #[test]
    fn zero_commit_rows_have_zero_averages() {
        let csv = format!("{}\na.rs,5,5,10,0,0,0,0,0,0\n", FILE_STATS_COLUMNS.join(","));
        let table = parse_file_stats(&csv, "test").unwrap();
        assert_eq!(table.get("a.rs").unwrap().avg_lines_changed_per_commit, 0.0);
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = parse_file_stats("FileName,NumberOfLinesAdded\na.rs,1\n", "stats.csv")
            .unwrap_err();
        assert!(err.to_string().contains("NumberOLinesDeleted"));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_file_stats("", "stats.csv").is_err());
    }
}

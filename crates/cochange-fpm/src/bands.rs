//! Frequency banding of mined itemsets and change-statistics aggregation.
//!
//! Every itemset of two or more files is placed in one of three bands by its
//! absolute frequency. For each itemset the band records six means taken
//! over the member files that have statistics: lines added, deleted and
//! changed per commit, author count, commit count, and bug-fix commit count.

use std::fmt;
use std::path::{Path, PathBuf};

use cochange_core::table::{format_cell, parse_number, split_row};
use cochange_core::{BandConfig, CochangeError, FileStatsTable, FrequentItemset};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Column names of a band statistics table, in output order.
pub const BAND_COLUMNS: [&str; 6] = [
    "NumberOfLinesAdded",
    "NumberOLinesDeleted",
    "NumberOfLinesChangedTotal",
    "NumberOfAuthors",
    "NumberOfCommits",
    "NumberOfCommitsOnlyForBugFix",
];

/// Frequency band of an itemset.
///
/// # Examples
///
/// ```
/// use cochange_fpm::bands::FrequencyBand;
///
/// assert_eq!(FrequencyBand::VeryFrequent.slug(), "very-frequent");
/// assert_eq!(FrequencyBand::ALL.len(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FrequencyBand {
    /// Count below the low threshold.
    Infrequent,
    /// Count between the thresholds.
    Frequent,
    /// Count at or above the high threshold.
    VeryFrequent,
}

impl FrequencyBand {
    /// All bands, least frequent first.
    pub const ALL: [FrequencyBand; 3] = [
        FrequencyBand::Infrequent,
        FrequencyBand::Frequent,
        FrequencyBand::VeryFrequent,
    ];

    /// Lowercase identifier used in file names.
    pub fn slug(self) -> &'static str {
        match self {
            FrequencyBand::Infrequent => "infrequent",
            FrequencyBand::Frequent => "frequent",
            FrequencyBand::VeryFrequent => "very-frequent",
        }
    }

    /// Heading used in console summaries.
    pub fn title(self) -> &'static str {
        match self {
            FrequencyBand::Infrequent => "Non-frequent changing pattern statistics",
            FrequencyBand::Frequent => "Frequent changing pattern statistics",
            FrequencyBand::VeryFrequent => "Very frequent changing pattern statistics",
        }
    }

    /// File name of the band's statistics table.
    pub fn csv_file_name(self) -> String {
        format!("file-stats-{}.csv", self.slug())
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// The two thresholds separating the bands.
///
/// # Examples
///
/// ```
/// use cochange_fpm::bands::{BandThresholds, FrequencyBand};
///
/// let t = BandThresholds::new(14, 35).unwrap();
/// assert_eq!(t.classify(13), FrequencyBand::Infrequent);
/// assert_eq!(t.classify(14), FrequencyBand::Frequent);
/// assert_eq!(t.classify(35), FrequencyBand::VeryFrequent);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandThresholds {
    low: u64,
    high: u64,
}

impl BandThresholds {
    /// Build thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::InvalidArgument`] if `low > high`.
    pub fn new(low: u64, high: u64) -> Result<Self, CochangeError> {
        if low > high {
            return Err(CochangeError::InvalidArgument(format!(
                "low threshold {low} exceeds high threshold {high}"
            )));
        }
        Ok(Self { low, high })
    }

    /// Counts below this are infrequent.
    pub fn low(&self) -> u64 {
        self.low
    }

    /// Counts at or above this are very frequent.
    pub fn high(&self) -> u64 {
        self.high
    }

    /// Band of an itemset occurring `freq` times.
    pub fn classify(&self, freq: u64) -> FrequencyBand {
        if freq < self.low {
            FrequencyBand::Infrequent
        } else if freq < self.high {
            FrequencyBand::Frequent
        } else {
            FrequencyBand::VeryFrequent
        }
    }
}

impl TryFrom<&BandConfig> for BandThresholds {
    type Error = CochangeError;

    fn try_from(config: &BandConfig) -> Result<Self, Self::Error> {
        Self::new(config.low_threshold, config.high_threshold)
    }
}

/// The six per-itemset means. Each is `NaN` when no member file has
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsetMeans {
    pub lines_added: f64,
    pub lines_deleted: f64,
    pub lines_changed: f64,
    pub authors: f64,
    pub commits: f64,
    pub bug_fix_commits: f64,
}

impl ItemsetMeans {
    /// Average the statistics of `items`, ignoring files missing from `stats`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cochange_core::{FileStatsRecord, FileStatsTable};
    /// use cochange_fpm::bands::ItemsetMeans;
    ///
    /// let stats = FileStatsTable::from_records(vec![
    ///     FileStatsRecord::new("f1", 10, 0, 10, 1, 1, 0),
    ///     FileStatsRecord::new("f2", 20, 0, 20, 1, 1, 0),
    /// ]);
    /// let means = ItemsetMeans::compute(&["f1".into(), "f2".into()], &stats);
    /// assert_eq!(means.lines_added, 15.0);
    ///
    /// let means = ItemsetMeans::compute(&["f1".into(), "gone".into()], &stats);
    /// assert_eq!(means.lines_added, 10.0);
    /// ```
    pub fn compute(items: &[String], stats: &FileStatsTable) -> Self {
        let mut sums = [0.0f64; 6];
        let mut present = 0usize;
        for item in items {
            let Some(rec) = stats.get(item) else {
                continue;
            };
            let values = [
                rec.avg_lines_added_per_commit,
                rec.avg_lines_deleted_per_commit,
                rec.avg_lines_changed_per_commit,
                rec.author_count as f64,
                rec.commit_count as f64,
                rec.bug_fix_commit_count as f64,
            ];
            for (sum, v) in sums.iter_mut().zip(values) {
                *sum += v;
            }
            present += 1;
        }

        let mean = |sum: f64| {
            if present == 0 {
                f64::NAN
            } else {
                sum / present as f64
            }
        };
        Self::from_values(sums.map(mean))
    }

    fn from_values(v: [f64; 6]) -> Self {
        Self {
            lines_added: v[0],
            lines_deleted: v[1],
            lines_changed: v[2],
            authors: v[3],
            commits: v[4],
            bug_fix_commits: v[5],
        }
    }
}

/// Mean of the non-`NaN` values, or `NaN` if there are none.
///
/// # Examples
///
/// ```
/// use cochange_fpm::bands::nan_mean;
///
/// assert_eq!(nan_mean(&[1.0, f64::NAN, 3.0]), 2.0);
/// assert!(nan_mean(&[f64::NAN]).is_nan());
/// assert!(nan_mean(&[]).is_nan());
/// ```
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0f64, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Per-itemset means accumulated for one band, one list per statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandStats {
    pub band: FrequencyBand,
    pub lines_added: Vec<f64>,
    pub lines_deleted: Vec<f64>,
    pub lines_changed: Vec<f64>,
    pub authors: Vec<f64>,
    pub commits: Vec<f64>,
    pub bug_fix_commits: Vec<f64>,
}

impl BandStats {
    /// An empty band.
    pub fn new(band: FrequencyBand) -> Self {
        Self {
            band,
            lines_added: Vec::new(),
            lines_deleted: Vec::new(),
            lines_changed: Vec::new(),
            authors: Vec::new(),
            commits: Vec::new(),
            bug_fix_commits: Vec::new(),
        }
    }

    /// Append one itemset's means.
    pub fn push(&mut self, means: ItemsetMeans) {
        self.lines_added.push(means.lines_added);
        self.lines_deleted.push(means.lines_deleted);
        self.lines_changed.push(means.lines_changed);
        self.authors.push(means.authors);
        self.commits.push(means.commits);
        self.bug_fix_commits.push(means.bug_fix_commits);
    }

    /// Number of itemsets in the band.
    pub fn len(&self) -> usize {
        self.lines_added.len()
    }

    /// `true` if no itemset fell in the band.
    pub fn is_empty(&self) -> bool {
        self.lines_added.is_empty()
    }

    fn columns(&self) -> [&[f64]; 6] {
        [
            self.lines_added.as_slice(),
            self.lines_deleted.as_slice(),
            self.lines_changed.as_slice(),
            self.authors.as_slice(),
            self.commits.as_slice(),
            self.bug_fix_commits.as_slice(),
        ]
    }

    fn columns_mut(&mut self) -> [&mut Vec<f64>; 6] {
        [
            &mut self.lines_added,
            &mut self.lines_deleted,
            &mut self.lines_changed,
            &mut self.authors,
            &mut self.commits,
            &mut self.bug_fix_commits,
        ]
    }

    /// Band-level averages of the six lists, ignoring `NaN` entries.
    pub fn summary(&self) -> BandSummary {
        let [la, ld, lc, na, nc, nb] = self.columns().map(nan_mean);
        BandSummary {
            band: self.band,
            itemsets: self.len(),
            avg_lines_added: la,
            avg_lines_deleted: ld,
            avg_lines_changed: lc,
            avg_authors: na,
            avg_commits: nc,
            avg_bug_fix_commits: nb,
        }
    }

    /// Render the band as a table, one row per itemset, `NaN` written as `0`.
    pub fn to_csv(&self) -> String {
        let mut out = BAND_COLUMNS.join(",");
        out.push('\n');
        let columns = self.columns();
        for row in 0..self.len() {
            let cells: Vec<String> = columns.iter().map(|c| format_cell(c[row])).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    /// Write the band table to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::Io`] if the file cannot be written.
    pub fn write_csv(&self, path: &Path) -> Result<(), CochangeError> {
        std::fs::write(path, self.to_csv())?;
        Ok(())
    }

    /// Parse a band table written by [`BandStats::to_csv`].
    ///
    /// Rows with the wrong cell count or non-numeric cells are skipped with a
    /// warning.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::Parse`] if the header does not list the six
    /// band columns.
    pub fn parse_csv(band: FrequencyBand, content: &str) -> Result<Self, CochangeError> {
        let mut lines = content.lines().enumerate();
        let header = lines
            .next()
            .and_then(|(_, line)| split_row(line))
            .ok_or_else(|| CochangeError::Parse(format!("{band} table: missing header row")))?;
        if header.iter().map(|h| h.trim()).ne(BAND_COLUMNS) {
            return Err(CochangeError::Parse(format!(
                "{band} table: expected columns {}",
                BAND_COLUMNS.join(",")
            )));
        }

        let mut stats = Self::new(band);
        for (idx, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let values: Option<Vec<f64>> = split_row(line)
                .filter(|cells| cells.len() == BAND_COLUMNS.len())
                .and_then(|cells| cells.iter().map(|c| parse_number(c)).collect());
            let Some(values) = values else {
                warn!(%band, line = idx + 1, "skipping malformed band row");
                continue;
            };
            for (column, v) in stats.columns_mut().into_iter().zip(values) {
                column.push(v);
            }
        }
        Ok(stats)
    }

    /// Read a band table from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::FileNotFound`] if `path` does not exist, or
    /// [`CochangeError::Parse`] for a malformed header.
    pub fn read_csv(band: FrequencyBand, path: &Path) -> Result<Self, CochangeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CochangeError::from_io(path, e))?;
        Self::parse_csv(band, &content)
    }
}

/// Averages of one band's six statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandSummary {
    pub band: FrequencyBand,
    pub itemsets: usize,
    pub avg_lines_added: f64,
    pub avg_lines_deleted: f64,
    pub avg_lines_changed: f64,
    pub avg_authors: f64,
    pub avg_commits: f64,
    pub avg_bug_fix_commits: f64,
}

impl BandSummary {
    /// `(label, value)` pairs in display order.
    pub fn rows(&self) -> [(&'static str, f64); 6] {
        [
            ("AvgLinesAdded", self.avg_lines_added),
            ("AvgLinesDeleted", self.avg_lines_deleted),
            ("AvgLinesChanged", self.avg_lines_changed),
            ("AvgNoOfAuthors", self.avg_authors),
            ("AvgNoOfCommits", self.avg_commits),
            ("AvgNoOfCommitsForBugFixOnly", self.avg_bug_fix_commits),
        ]
    }
}

impl fmt::Display for BandSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.band.title())?;
        for (label, value) in self.rows() {
            writeln!(f, "{label} {value:.2}")?;
        }
        Ok(())
    }
}

/// The three bands produced by one aggregation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandReport {
    pub infrequent: BandStats,
    pub frequent: BandStats,
    pub very_frequent: BandStats,
    /// Frequency count of every itemset that was banded, in input order.
    pub frequencies: Vec<u64>,
    /// Itemsets with fewer than two files, which are not banded.
    pub skipped_singletons: usize,
}

impl BandReport {
    fn new() -> Self {
        Self {
            infrequent: BandStats::new(FrequencyBand::Infrequent),
            frequent: BandStats::new(FrequencyBand::Frequent),
            very_frequent: BandStats::new(FrequencyBand::VeryFrequent),
            frequencies: Vec::new(),
            skipped_singletons: 0,
        }
    }

    /// Statistics of one band.
    pub fn band(&self, band: FrequencyBand) -> &BandStats {
        match band {
            FrequencyBand::Infrequent => &self.infrequent,
            FrequencyBand::Frequent => &self.frequent,
            FrequencyBand::VeryFrequent => &self.very_frequent,
        }
    }

    fn band_mut(&mut self, band: FrequencyBand) -> &mut BandStats {
        match band {
            FrequencyBand::Infrequent => &mut self.infrequent,
            FrequencyBand::Frequent => &mut self.frequent,
            FrequencyBand::VeryFrequent => &mut self.very_frequent,
        }
    }

    /// All bands, least frequent first.
    pub fn bands(&self) -> impl Iterator<Item = &BandStats> {
        FrequencyBand::ALL.into_iter().map(|b| self.band(b))
    }

    /// Write one table per band into `dir`, returning the written paths.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::Io`] if a file cannot be written.
    pub fn write_csvs(&self, dir: &Path) -> Result<Vec<PathBuf>, CochangeError> {
        let mut written = Vec::new();
        for stats in self.bands() {
            let path = dir.join(stats.band.csv_file_name());
            stats.write_csv(&path)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Band every itemset of two or more files and record its means.
///
/// # Examples
///
/// ```
/// use cochange_core::{FileStatsRecord, FileStatsTable, FrequentItemset};
/// use cochange_fpm::bands::{aggregate, BandThresholds};
///
/// let stats = FileStatsTable::from_records(vec![
///     FileStatsRecord::new("a", 10, 0, 10, 1, 1, 0),
///     FileStatsRecord::new("b", 20, 0, 20, 1, 1, 0),
/// ]);
/// let itemsets = vec![
///     FrequentItemset::new(vec!["a".into()], 50),
///     FrequentItemset::new(vec!["a".into(), "b".into()], 20),
/// ];
/// let report = aggregate(&itemsets, &stats, &BandThresholds::new(14, 35).unwrap());
/// assert_eq!(report.frequent.lines_added, vec![15.0]);
/// assert!(report.infrequent.is_empty() && report.very_frequent.is_empty());
/// assert_eq!(report.skipped_singletons, 1);
/// ```
pub fn aggregate(
    itemsets: &[FrequentItemset],
    stats: &FileStatsTable,
    thresholds: &BandThresholds,
) -> BandReport {
    let mut report = BandReport::new();

    for itemset in itemsets {
        if itemset.len() < 2 {
            report.skipped_singletons += 1;
            continue;
        }
        let means = ItemsetMeans::compute(&itemset.items, stats);
        if means.lines_added.is_nan() {
            debug!(items = ?itemset.items, "no member file has statistics");
        }
        report.band_mut(thresholds.classify(itemset.freq)).push(means);
        report.frequencies.push(itemset.freq);
    }

    debug!(
        infrequent = report.infrequent.len(),
        frequent = report.frequent.len(),
        very_frequent = report.very_frequent.len(),
        "itemsets banded"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use cochange_core::FileStatsRecord;

    fn stats() -> FileStatsTable {
        FileStatsTable::from_records(vec![
            FileStatsRecord::new("f1", 10, 4, 14, 2, 1, 1),
            FileStatsRecord::new("f2", 20, 6, 26, 4, 1, 0),
            FileStatsRecord::new("f3", 30, 0, 30, 1, 3, 3),
        ])
    }

    fn set(items: &[&str], freq: u64) -> FrequentItemset {
        FrequentItemset::new(items.iter().map(|s| s.to_string()).collect(), freq)
    }

    #[test]
    fn means_cover_all_six_statistics() {
        let means = ItemsetMeans::compute(&["f1".into(), "f2".into()], &stats());
        assert_eq!(means.lines_added, 15.0);
        assert_eq!(means.lines_deleted, 5.0);
        assert_eq!(means.lines_changed, 20.0);
        assert_eq!(means.authors, 3.0);
        assert_eq!(means.commits, 1.0);
        assert_eq!(means.bug_fix_commits, 0.5);
    }

    #[test]
    fn means_use_per_commit_line_averages() {
        // f3: 30 lines over 3 commits
        let means = ItemsetMeans::compute(&["f3".into()], &stats());
        assert_eq!(means.lines_added, 10.0);
        assert_eq!(means.commits, 3.0);
    }

    #[test]
    fn all_missing_members_give_nan() {
        let means = ItemsetMeans::compute(&["x".into(), "y".into()], &stats());
        assert!(means.lines_added.is_nan());
        assert!(means.bug_fix_commits.is_nan());
    }

    #[test]
    fn bands_are_disjoint_and_exhaustive() {
        let itemsets = vec![
            set(&["f1", "f2"], 1),
            set(&["f1", "f3"], 13),
            set(&["f2", "f3"], 14),
            set(&["f1", "f2", "f3"], 34),
            set(&["f1", "f2"], 35),
            set(&["f2", "f3"], 1000),
            set(&["f1"], 1000),
        ];
        let thresholds = BandThresholds::new(14, 35).unwrap();
        let report = aggregate(&itemsets, &stats(), &thresholds);

        assert_eq!(report.infrequent.len(), 2);
        assert_eq!(report.frequent.len(), 2);
        assert_eq!(report.very_frequent.len(), 2);
        assert_eq!(report.skipped_singletons, 1);
        assert_eq!(report.frequencies, vec![1, 13, 14, 34, 35, 1000]);
        let total: usize = report.bands().map(BandStats::len).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn equal_thresholds_leave_frequent_band_empty() {
        let thresholds = BandThresholds::new(10, 10).unwrap();
        assert_eq!(thresholds.classify(9), FrequencyBand::Infrequent);
        assert_eq!(thresholds.classify(10), FrequencyBand::VeryFrequent);
        assert!(BandThresholds::new(11, 10).is_err());
    }

    #[test]
    fn summary_ignores_nan_itemsets() {
        let mut band = BandStats::new(FrequencyBand::Frequent);
        band.push(ItemsetMeans::compute(&["f1".into()], &stats()));
        band.push(ItemsetMeans::compute(&["missing".into()], &stats()));
        band.push(ItemsetMeans::compute(&["f2".into()], &stats()));

        let summary = band.summary();
        assert_eq!(summary.itemsets, 3);
        assert_eq!(summary.avg_lines_added, 15.0);
        assert_eq!(summary.avg_authors, 3.0);
    }

    #[test]
    fn empty_band_summary_is_nan_not_error() {
        let summary = BandStats::new(FrequencyBand::VeryFrequent).summary();
        assert!(summary.avg_commits.is_nan());
        let text = summary.to_string();
        assert!(text.starts_with("Very frequent changing pattern statistics\n"));
        assert!(text.contains("AvgNoOfCommits NaN"));
    }

    #[test]
    fn summary_display_uses_two_decimals() {
        let mut band = BandStats::new(FrequencyBand::Infrequent);
        band.push(ItemsetMeans::compute(&["f1".into(), "f3".into()], &stats()));
        let text = band.summary().to_string();
        assert!(text.contains("AvgLinesAdded 10.00"));
        assert!(text.contains("AvgNoOfCommits 2.00"));
    }

    #[test]
    fn csv_round_trip_maps_nan_to_zero() {
        let mut band = BandStats::new(FrequencyBand::Frequent);
        band.push(ItemsetMeans::compute(&["f1".into(), "f2".into()], &stats()));
        band.push(ItemsetMeans::compute(&["nope".into()], &stats()));

        let csv = band.to_csv();
        assert!(csv.starts_with(
            "NumberOfLinesAdded,NumberOLinesDeleted,NumberOfLinesChangedTotal,\
NumberOfAuthors,NumberOfCommits,NumberOfCommitsOnlyForBugFix\n"
        ));

        let parsed = BandStats::parse_csv(FrequencyBand::Frequent, &csv).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.lines_added, vec![15.0, 0.0]);
        assert_eq!(parsed.authors, vec![3.0, 0.0]);
        assert_eq!(parsed.bug_fix_commits, vec![0.5, 0.0]);
    }

    #[test]
    fn written_tables_land_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let report = aggregate(
            &[set(&["f1", "f2"], 20)],
            &stats(),
            &BandThresholds::new(14, 35).unwrap(),
        );
        let paths = report.write_csvs(dir.path()).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[2].ends_with("file-stats-very-frequent.csv"));

        let frequent =
            BandStats::read_csv(FrequencyBand::Frequent, &dir.path().join("file-stats-frequent.csv"))
                .unwrap();
        assert_eq!(frequent.len(), 1);
        let empty = BandStats::read_csv(
            FrequencyBand::Infrequent,
            &dir.path().join("file-stats-infrequent.csv"),
        )
        .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn parse_rejects_wrong_header() {
        assert!(BandStats::parse_csv(FrequencyBand::Frequent, "a,b,c\n1,2,3\n").is_err());
    }
}

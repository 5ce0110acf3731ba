use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CochangeError;

/// Top-level configuration loaded from `.cochange.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use cochange_core::CochangeConfig;
///
/// let config = CochangeConfig::default();
/// assert_eq!(config.mining.num_partitions, 5);
/// assert_eq!(config.bands.low_threshold, 14);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CochangeConfig {
    /// Git history extraction settings.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Frequent itemset mining settings.
    #[serde(default)]
    pub mining: MiningConfig,
    /// Frequency band thresholds.
    #[serde(default)]
    pub bands: BandConfig,
    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,
}

impl CochangeConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::FileNotFound`] if the file does not exist,
    /// [`CochangeError::Io`] if it cannot be read, or
    /// [`CochangeError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cochange_core::CochangeConfig;
    /// use std::path::Path;
    ///
    /// let config = CochangeConfig::from_file(Path::new(".cochange.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, CochangeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CochangeError::from_io(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use cochange_core::CochangeConfig;
    ///
    /// let toml = r#"
    /// [mining]
    /// min_support = 0.004
    /// "#;
    /// let config = CochangeConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.mining.min_support, 0.004);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, CochangeError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Check that numeric settings are within their valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::Config`] naming the first offending setting.
    pub fn validate(&self) -> Result<(), CochangeError> {
        let support = self.mining.min_support;
        if !(support > 0.0 && support <= 1.0) {
            return Err(CochangeError::Config(format!(
                "mining.min_support must be in (0, 1], got {support}"
            )));
        }
        if self.mining.num_partitions == 0 {
            return Err(CochangeError::Config(
                "mining.num_partitions must be at least 1".into(),
            ));
        }
        if self.bands.low_threshold > self.bands.high_threshold {
            return Err(CochangeError::Config(format!(
                "bands.low_threshold ({}) exceeds bands.high_threshold ({})",
                self.bands.low_threshold, self.bands.high_threshold
            )));
        }
        Ok(())
    }
}

/// Git history extraction configuration.
///
/// # Examples
///
/// ```
/// use cochange_core::HistoryConfig;
///
/// let config = HistoryConfig::default();
/// assert!(config.branch.is_none());
/// assert!(config.bug_fix_keywords.contains(&"FIX".to_string()));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
    /// Skip commits touching more files than this (default: no limit).
    pub max_files_per_commit: Option<usize>,
    /// Commit message keywords marking a bug-fix commit, matched
    /// case-insensitively as substrings.
    #[serde(default = "default_bug_fix_keywords")]
    pub bug_fix_keywords: Vec<String>,
}

fn default_bug_fix_keywords() -> Vec<String> {
    ["FIX", "BUG", "CHANGE", "UPDATE", "REMOVE"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            branch: None,
            max_files_per_commit: None,
            bug_fix_keywords: default_bug_fix_keywords(),
        }
    }
}

/// Frequent itemset mining configuration.
///
/// # Examples
///
/// ```
/// use cochange_core::MiningConfig;
///
/// let config = MiningConfig::default();
/// assert_eq!(config.min_support, 0.005);
/// assert_eq!(config.num_partitions, 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Minimum support as a fraction of all transactions (default: 0.005).
    #[serde(default = "default_min_support")]
    pub min_support: f64,
    /// Number of partitions counted in parallel (default: 5).
    #[serde(default = "default_num_partitions")]
    pub num_partitions: usize,
}

fn default_min_support() -> f64 {
    0.005
}

fn default_num_partitions() -> usize {
    5
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
            num_partitions: default_num_partitions(),
        }
    }
}

/// Frequency band thresholds on an itemset's absolute count.
///
/// # Examples
///
/// ```
/// use cochange_core::BandConfig;
///
/// let config = BandConfig::default();
/// assert_eq!((config.low_threshold, config.high_threshold), (14, 35));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandConfig {
    /// Counts below this are infrequent (default: 14).
    #[serde(default = "default_low_threshold")]
    pub low_threshold: u64,
    /// Counts at or above this are very frequent (default: 35).
    #[serde(default = "default_high_threshold")]
    pub high_threshold: u64,
}

fn default_low_threshold() -> u64 {
    14
}

fn default_high_threshold() -> u64 {
    35
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            high_threshold: default_high_threshold(),
        }
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Transaction log, one commit per line.
    #[serde(default = "default_transactions")]
    pub transactions: PathBuf,
    /// Per-file change statistics table.
    #[serde(default = "default_file_stats")]
    pub file_stats: PathBuf,
    /// Hand-labeled ground-truth rules.
    #[serde(default = "default_ground_truth")]
    pub ground_truth: PathBuf,
    /// Directory receiving band tables and itemset files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_transactions() -> PathBuf {
    PathBuf::from("commit-transactions.txt")
}

fn default_file_stats() -> PathBuf {
    PathBuf::from("file-stats.csv")
}

fn default_ground_truth() -> PathBuf {
    PathBuf::from("ground-truth.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            transactions: default_transactions(),
            file_stats: default_file_stats(),
            ground_truth: default_ground_truth(),
            output_dir: default_output_dir(),
        }
    }
}

//! Hand-curated reference rules, indexed by antecedent.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use cochange_core::CochangeError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One reference rule: an antecedent file and the files that truly change
/// with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthRule {
    pub antecedent: String,
    pub consequent: Vec<String>,
}

impl GroundTruthRule {
    /// Parse `antecedent consequent...`. Returns `None` for a blank line.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let antecedent = tokens.next()?.to_string();
        Some(Self {
            antecedent,
            consequent: tokens.map(String::from).collect(),
        })
    }
}

/// Ground truth loaded once and indexed by antecedent.
///
/// An antecedent may appear on several lines; each line keeps its own
/// consequent set, in file order.
///
/// # Examples
///
/// ```
/// use cochange_eval::groundtruth::GroundTruth;
///
/// let gt = GroundTruth::parse("a.rs b.rs c.rs\na.rs d.rs\n", "inline");
/// assert_eq!(gt.consequents("a.rs").len(), 2);
/// assert!(gt.consequents("z.rs").is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    index: HashMap<String, Vec<BTreeSet<String>>>,
    rules: usize,
}

impl GroundTruth {
    /// Build the index from parsed rules.
    pub fn from_rules(rules: impl IntoIterator<Item = GroundTruthRule>) -> Self {
        let mut gt = Self::default();
        for rule in rules {
            gt.index
                .entry(rule.antecedent)
                .or_default()
                .push(rule.consequent.into_iter().collect());
            gt.rules += 1;
        }
        gt
    }

    /// Parse ground-truth text. Blank lines are skipped with a warning;
    /// `source` names the input in that warning.
    pub fn parse(content: &str, source: &str) -> Self {
        let rules = content.lines().enumerate().filter_map(|(i, line)| {
            let rule = GroundTruthRule::parse_line(line);
            if rule.is_none() {
                warn!(source, line = i + 1, "skipping blank ground-truth line");
            }
            rule
        });
        Self::from_rules(rules)
    }

    /// Read and index the ground-truth file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::FileNotFound`] if `path` does not exist, or
    /// [`CochangeError::Io`] on other read failures.
    pub fn from_file(path: &Path) -> Result<Self, CochangeError> {
        let content = std::fs::read_to_string(path).map_err(|e| CochangeError::from_io(path, e))?;
        let gt = Self::parse(&content, &path.display().to_string());
        debug!(
            path = %path.display(),
            rules = gt.rules,
            antecedents = gt.index.len(),
            "ground truth loaded"
        );
        Ok(gt)
    }

    /// Consequent sets recorded for `antecedent`, empty if there are none.
    pub fn consequents(&self, antecedent: &str) -> &[BTreeSet<String>] {
        self.index.get(antecedent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of rules (lines) loaded.
    pub fn len(&self) -> usize {
        self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules == 0
    }

    /// Number of distinct antecedents.
    pub fn antecedent_count(&self) -> usize {
        self.index.len()
    }
}

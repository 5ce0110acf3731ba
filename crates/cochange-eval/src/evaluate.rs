//! Scoring of mined rules against ground truth.
//!
//! Every subset of a rule's consequent is compared against every reference
//! rule with the same antecedent. Subsets are visited largest first, and
//! within one size in lexicographic order of consequent positions. The
//! best pair is the one with the highest precision; recall is whatever
//! came with it. Ties go to the pair seen first, so the largest matching
//! subset wins.

use std::collections::BTreeSet;
use std::path::Path;

use cochange_core::{CochangeError, FrequentItemset};
use serde::Serialize;
use tracing::{debug, warn};

use crate::groundtruth::GroundTruth;

/// A mined rule: the first file of an itemset implies the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRule {
    pub antecedent: String,
    /// Consequent files, mined order, without duplicates.
    pub consequent: Vec<String>,
}

impl CandidateRule {
    /// Create a rule, dropping repeated consequent files.
    pub fn new(antecedent: impl Into<String>, consequent: impl IntoIterator<Item = String>) -> Self {
        let mut seen = BTreeSet::new();
        let consequent = consequent
            .into_iter()
            .filter(|f| seen.insert(f.clone()))
            .collect();
        Self {
            antecedent: antecedent.into(),
            consequent,
        }
    }

    /// Parse `antecedent consequent...`, the line format of a size group
    /// file. Returns `None` for a blank line.
    ///
    /// # Examples
    ///
    /// ```
    /// use cochange_eval::evaluate::CandidateRule;
    ///
    /// let rule = CandidateRule::parse_line("a.rs b.rs c.rs").unwrap();
    /// assert_eq!(rule.antecedent, "a.rs");
    /// assert_eq!(rule.consequent, ["b.rs", "c.rs"]);
    /// assert!(CandidateRule::parse_line("   ").is_none());
    /// ```
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let antecedent = tokens.next()?;
        Some(Self::new(antecedent, tokens.map(String::from)))
    }

    /// Reinterpret a mined itemset as a rule. `None` if the itemset is empty.
    pub fn from_itemset(itemset: &FrequentItemset) -> Option<Self> {
        let (first, rest) = itemset.items.split_first()?;
        Some(Self::new(first.clone(), rest.iter().cloned()))
    }
}

/// Read candidate rules from a size group file, skipping blank lines.
///
/// # Errors
///
/// Returns [`CochangeError::FileNotFound`] if `path` does not exist, or
/// [`CochangeError::Io`] on other read failures.
pub fn read_candidate_rules(path: &Path) -> Result<Vec<CandidateRule>, CochangeError> {
    let content = std::fs::read_to_string(path).map_err(|e| CochangeError::from_io(path, e))?;
    let mut rules = Vec::new();
    for (i, line) in content.lines().enumerate() {
        match CandidateRule::parse_line(line) {
            Some(rule) => rules.push(rule),
            None => warn!(path = %path.display(), line = i + 1, "skipping blank rule line"),
        }
    }
    debug!(path = %path.display(), rules = rules.len(), "candidate rules loaded");
    Ok(rules)
}

/// Precision and recall of one consequent subset against one reference
/// consequent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub precision: f64,
    pub recall: f64,
}

impl ScoredCandidate {
    /// Score `subset` against `truth`. Either ratio is 0 when its
    /// denominator is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeSet;
    /// use cochange_eval::evaluate::ScoredCandidate;
    ///
    /// let truth: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
    /// let s = ScoredCandidate::score_subset(&["x", "y", "z"], &truth);
    /// assert!((s.precision - 2.0 / 3.0).abs() < 1e-12);
    /// assert_eq!(s.recall, 1.0);
    /// ```
    pub fn score_subset(subset: &[&str], truth: &BTreeSet<String>) -> Self {
        let matched = subset.iter().filter(|f| truth.contains(**f)).count();
        Self::from_counts(matched, subset.len(), truth.len())
    }

    fn from_counts(matched: usize, subset_len: usize, truth_len: usize) -> Self {
        let ratio = |den: usize| {
            if den == 0 {
                0.0
            } else {
                matched as f64 / den as f64
            }
        };
        Self {
            precision: ratio(subset_len),
            recall: ratio(truth_len),
        }
    }
}

/// Score one rule.
///
/// # Errors
///
/// Returns [`CochangeError::NoGroundTruth`] if no reference rule shares the
/// antecedent.
pub fn evaluate_rule(rule: &CandidateRule, gt: &GroundTruth) -> Result<ScoredCandidate, CochangeError> {
    let references = gt.consequents(&rule.antecedent);
    if references.is_empty() {
        return Err(CochangeError::NoGroundTruth {
            antecedent: rule.antecedent.clone(),
        });
    }
    if rule.consequent.len() <= ENUMERATION_LIMIT {
        Ok(best_by_enumeration(&rule.consequent, references))
    } else {
        Ok(best_by_overlap(&rule.consequent, references))
    }
}

/// Longest consequent whose subsets are visited one by one. Longer ones
/// are scored from their overlaps alone.
const ENUMERATION_LIMIT: usize = 20;

/// Visit every subset and keep the first pair with the highest precision.
/// `references` must be non-empty and `consequent` at most 63 files.
fn best_by_enumeration(consequent: &[String], references: &[BTreeSet<String>]) -> ScoredCandidate {
    let n = consequent.len();
    // Bit i set: consequent[i] is in that reference set.
    let masks: Vec<(u64, usize)> = references
        .iter()
        .map(|truth| (overlap_positions(consequent, truth).fold(0u64, |m, i| m | (1 << i)), truth.len()))
        .collect();

    let mut best: Option<ScoredCandidate> = None;
    for size in (0..=n).rev() {
        for_each_subset_mask(n, size, |subset| {
            for &(truth_mask, truth_len) in &masks {
                let matched = (subset & truth_mask).count_ones() as usize;
                let scored = ScoredCandidate::from_counts(matched, size, truth_len);
                if best.map_or(true, |b| scored.precision > b.precision) {
                    best = Some(scored);
                }
            }
        });
    }
    // The full consequent against the first reference is always visited.
    best.unwrap_or(ScoredCandidate::from_counts(0, n, 0))
}

/// Same result as [`best_by_enumeration`] without visiting subsets.
///
/// A non-empty subset of the overlap with some reference has precision 1,
/// and nothing scores higher. The first such pair in visiting order is the
/// largest overlap, lexicographically smallest among equal sizes, against
/// the first reference with exactly that overlap. Without any overlap every
/// pair scores 0 and the full consequent against the first reference wins.
fn best_by_overlap(consequent: &[String], references: &[BTreeSet<String>]) -> ScoredCandidate {
    let overlaps: Vec<(Vec<usize>, usize)> = references
        .iter()
        .map(|truth| (overlap_positions(consequent, truth).collect(), truth.len()))
        .collect();
    let largest = overlaps.iter().map(|(o, _)| o.len()).max().unwrap_or(0);
    if largest == 0 {
        return ScoredCandidate::from_counts(0, consequent.len(), 0);
    }
    // min_by returns the first of equal elements, so reference order breaks ties.
    overlaps
        .iter()
        .filter(|(o, _)| o.len() == largest)
        .min_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, truth_len)| ScoredCandidate::from_counts(largest, largest, *truth_len))
        .unwrap_or(ScoredCandidate::from_counts(0, consequent.len(), 0))
}

/// Positions of the consequent files found in `truth`, ascending.
fn overlap_positions<'a>(
    consequent: &'a [String],
    truth: &'a BTreeSet<String>,
) -> impl Iterator<Item = usize> + 'a {
    consequent
        .iter()
        .enumerate()
        .filter(move |(_, f)| truth.contains(*f))
        .map(|(i, _)| i)
}

/// Call `f` with the bitmask of every `k`-subset of `0..n`, in lexicographic
/// order of the chosen positions.
fn for_each_subset_mask(n: usize, k: usize, mut f: impl FnMut(u64)) {
    if k > n {
        return;
    }
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        f(idx.iter().fold(0u64, |m, &i| m | (1 << i)));

        // Advance the rightmost position that still has room.
        let Some(pos) = (0..k).rev().find(|&p| idx[p] < n - k + p) else {
            return;
        };
        idx[pos] += 1;
        for p in pos + 1..k {
            idx[p] = idx[p - 1] + 1;
        }
    }
}

/// Outcome for one rule; `best` is `None` when the rule could not be scored.
#[derive(Debug, Clone, Serialize)]
pub struct RuleEvaluation {
    pub rule: CandidateRule,
    pub best: Option<ScoredCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Scores for a batch of rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    pub rules: Vec<RuleEvaluation>,
    /// Antecedents of rules that were not scored, in rule order.
    pub unscored: Vec<String>,
}

impl EvaluationReport {
    /// Best pairs of the scored rules, in rule order.
    pub fn scored(&self) -> impl Iterator<Item = &ScoredCandidate> {
        self.rules.iter().filter_map(|r| r.best.as_ref())
    }

    pub fn scored_count(&self) -> usize {
        self.scored().count()
    }

    /// Mean best precision over scored rules; `None` if nothing scored.
    pub fn mean_precision(&self) -> Option<f64> {
        mean(self.scored().map(|s| s.precision))
    }

    /// Mean best recall over scored rules; `None` if nothing scored.
    pub fn mean_recall(&self) -> Option<f64> {
        mean(self.scored().map(|s| s.recall))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0f64, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Score every rule. Rules that cannot be scored are kept in the report
/// with `best: None` and logged.
pub fn evaluate(rules: &[CandidateRule], gt: &GroundTruth) -> EvaluationReport {
    let mut report = EvaluationReport::default();
    for rule in rules {
        let (best, reason) = match evaluate_rule(rule, gt) {
            Ok(scored) => (Some(scored), None),
            Err(e) => {
                warn!(antecedent = %rule.antecedent, error = %e, "rule not scored");
                report.unscored.push(rule.antecedent.clone());
                (None, Some(e.to_string()))
            }
        };
        report.rules.push(RuleEvaluation {
            rule: rule.clone(),
            best,
            reason,
        });
    }
    debug!(
        rules = rules.len(),
        scored = report.scored_count(),
        unscored = report.unscored.len(),
        "evaluation finished"
    );
    report
}

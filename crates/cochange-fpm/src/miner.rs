//! Level-wise frequent itemset mining.
//!
//! Candidates of size k+1 are joined from frequent k-itemsets and pruned by
//! anti-monotonicity (every subset of a frequent itemset is frequent). Each
//! level is counted by scattering the transaction log over partitions that
//! are processed in parallel; the per-partition counts are merged by
//! summation, so the partition count never changes the result.

use std::collections::{HashMap, HashSet};

use cochange_core::{CochangeError, FrequentItemset, MiningConfig, Transaction};
use rayon::prelude::*;
use tracing::{debug, info};

/// Parameters of a mining run.
///
/// # Examples
///
/// ```
/// use cochange_fpm::miner::MinerOptions;
///
/// let opts = MinerOptions::new(0.01, 4).unwrap();
/// assert_eq!(opts.min_count(1000), 10);
/// assert!(MinerOptions::new(0.0, 4).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinerOptions {
    min_support: f64,
    num_partitions: usize,
}

impl MinerOptions {
    /// Validate and build mining options.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::InvalidArgument`] if `min_support` is not in
    /// (0, 1] or `num_partitions` is zero.
    pub fn new(min_support: f64, num_partitions: usize) -> Result<Self, CochangeError> {
        if !(min_support > 0.0 && min_support <= 1.0) {
            return Err(CochangeError::InvalidArgument(format!(
                "min_support must be in (0, 1], got {min_support}"
            )));
        }
        if num_partitions == 0 {
            return Err(CochangeError::InvalidArgument(
                "num_partitions must be at least 1".into(),
            ));
        }
        Ok(Self {
            min_support,
            num_partitions,
        })
    }

    /// Minimum support as a fraction of the transaction count.
    pub fn min_support(&self) -> f64 {
        self.min_support
    }

    /// Number of partitions counted in parallel.
    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Smallest absolute count that satisfies the support threshold for a
    /// log of `transactions` entries: `ceil(min_support * transactions)`,
    /// never less than one.
    pub fn min_count(&self, transactions: usize) -> u64 {
        // Tolerate representation error so that 0.005 * 1000 is 5, not 6.
        let exact = self.min_support * transactions as f64;
        let count = (exact - 1e-9).ceil();
        (count.max(1.0)) as u64
    }
}

impl TryFrom<&MiningConfig> for MinerOptions {
    type Error = CochangeError;

    fn try_from(config: &MiningConfig) -> Result<Self, Self::Error> {
        Self::new(config.min_support, config.num_partitions)
    }
}

/// Mine every itemset whose support meets `min_support`.
///
/// Items inside an itemset are ordered by descending single-file frequency,
/// ties broken by path; the returned sequence is ordered by itemset size and
/// then by that item order.
///
/// # Errors
///
/// Returns [`CochangeError::InvalidArgument`] for an out-of-range support or
/// a zero partition count.
///
/// # Examples
///
/// ```
/// use cochange_core::Transaction;
/// use cochange_fpm::miner::mine;
///
/// let txs = vec![
///     Transaction::new(["a", "b", "c"]),
///     Transaction::new(["a", "b"]),
///     Transaction::new(["a"]),
///     Transaction::new(Vec::<String>::new()),
/// ];
/// let sets = mine(&txs, 0.5, 2).unwrap();
/// // {a}: 3, {b}: 2, {a, b}: 2
/// assert_eq!(sets.len(), 3);
/// assert_eq!(sets[2].items, vec!["a", "b"]);
/// assert_eq!(sets[2].freq, 2);
/// ```
pub fn mine(
    transactions: &[Transaction],
    min_support: f64,
    num_partitions: usize,
) -> Result<Vec<FrequentItemset>, CochangeError> {
    let options = MinerOptions::new(min_support, num_partitions)?;
    Ok(mine_with(transactions, &options))
}

/// Mine with pre-validated options.
pub fn mine_with(transactions: &[Transaction], options: &MinerOptions) -> Vec<FrequentItemset> {
    if transactions.is_empty() {
        return Vec::new();
    }

    let threshold = options.min_count(transactions.len());
    let chunk_size = transactions.len().div_ceil(options.num_partitions()).max(1);

    // Level 1: count single files per partition, merge by summation.
    let item_counts = transactions
        .par_chunks(chunk_size)
        .map(|part| {
            let mut counts: HashMap<&str, u64> = HashMap::new();
            for tx in part {
                for file in tx.files() {
                    *counts.entry(file.as_str()).or_default() += 1;
                }
            }
            counts
        })
        .reduce(HashMap::new, merge_counts);

    let mut frequent_items: Vec<(&str, u64)> = item_counts
        .into_iter()
        .filter(|&(_, count)| count >= threshold)
        .collect();
    frequent_items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    debug!(
        transactions = transactions.len(),
        threshold,
        frequent_files = frequent_items.len(),
        "level 1 counted"
    );

    let names: Vec<&str> = frequent_items.iter().map(|&(name, _)| name).collect();
    let ids: HashMap<&str, u32> = names
        .iter()
        .enumerate()
        .map(|(id, &name)| (name, id as u32))
        .collect();

    let mut found: Vec<(Vec<u32>, u64)> = frequent_items
        .iter()
        .enumerate()
        .map(|(id, &(_, count))| (vec![id as u32], count))
        .collect();

    // Re-encode transactions as sorted ids of frequent files only.
    let encoded: Vec<Vec<u32>> = transactions
        .par_iter()
        .map(|tx| {
            let mut items: Vec<u32> = tx
                .files()
                .iter()
                .filter_map(|f| ids.get(f.as_str()).copied())
                .collect();
            items.sort_unstable();
            items
        })
        .filter(|items| items.len() >= 2)
        .collect();

    let mut level: Vec<Vec<u32>> = found.iter().map(|(items, _)| items.clone()).collect();
    let mut k = 2;
    while level.len() >= 2 {
        let candidates = generate_candidates(&level);
        if candidates.is_empty() {
            break;
        }
        let counts = count_candidates(&encoded, &candidates, k, chunk_size);

        level = candidates
            .into_iter()
            .zip(counts)
            .filter(|&(_, count)| count >= threshold)
            .map(|(items, count)| {
                found.push((items.clone(), count));
                items
            })
            .collect();

        debug!(size = k, frequent = level.len(), "level counted");
        k += 1;
    }

    found.sort_by(|a, b| a.0.len().cmp(&b.0.len()).then_with(|| a.0.cmp(&b.0)));

    info!(
        itemsets = found.len(),
        min_support = options.min_support(),
        partitions = options.num_partitions(),
        "frequent itemsets mined"
    );

    found
        .into_iter()
        .map(|(items, freq)| {
            let items = items
                .into_iter()
                .map(|id| names[id as usize].to_string())
                .collect();
            FrequentItemset::new(items, freq)
        })
        .collect()
}

fn merge_counts<'a>(
    mut acc: HashMap<&'a str, u64>,
    other: HashMap<&'a str, u64>,
) -> HashMap<&'a str, u64> {
    for (item, count) in other {
        *acc.entry(item).or_default() += count;
    }
    acc
}

/// Join frequent (k-1)-itemsets sharing a (k-2)-prefix into k-candidates,
/// dropping any candidate with an infrequent (k-1)-subset.
///
/// `level` must be sorted lexicographically with sorted members.
fn generate_candidates(level: &[Vec<u32>]) -> Vec<Vec<u32>> {
    let known: HashSet<&[u32]> = level.iter().map(Vec::as_slice).collect();
    let mut candidates = Vec::new();

    for (i, left) in level.iter().enumerate() {
        let prefix = &left[..left.len() - 1];
        for right in &level[i + 1..] {
            if &right[..right.len() - 1] != prefix {
                break;
            }
            let mut candidate = left.clone();
            candidate.push(right[right.len() - 1]);
            if all_subsets_known(&candidate, &known) {
                candidates.push(candidate);
            }
        }
    }

    candidates
}

fn all_subsets_known(candidate: &[u32], known: &HashSet<&[u32]>) -> bool {
    // Dropping either of the last two members yields one of the joined parents.
    let mut subset = Vec::with_capacity(candidate.len() - 1);
    (0..candidate.len().saturating_sub(2)).all(|skip| {
        subset.clear();
        subset.extend(
            candidate
                .iter()
                .enumerate()
                .filter(|&(i, _)| i != skip)
                .map(|(_, &item)| item),
        );
        known.contains(subset.as_slice())
    })
}

fn count_candidates(
    encoded: &[Vec<u32>],
    candidates: &[Vec<u32>],
    k: usize,
    chunk_size: usize,
) -> Vec<u64> {
    let index: HashMap<&[u32], usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_slice(), i))
        .collect();

    encoded
        .par_chunks(chunk_size)
        .map(|part| {
            let mut counts = vec![0u64; candidates.len()];
            let mut combo = Vec::with_capacity(k);
            for tx in part.iter().filter(|tx| tx.len() >= k) {
                if binomial(tx.len(), k) <= candidates.len() as u64 {
                    for_each_combination(tx, k, &mut combo, &mut |c| {
                        if let Some(&i) = index.get(c) {
                            counts[i] += 1;
                        }
                    });
                } else {
                    for (i, candidate) in candidates.iter().enumerate() {
                        if is_sorted_subset(candidate, tx) {
                            counts[i] += 1;
                        }
                    }
                }
            }
            counts
        })
        .reduce(
            || vec![0u64; candidates.len()],
            |mut acc, other| {
                for (a, b) in acc.iter_mut().zip(other) {
                    *a += b;
                }
                acc
            },
        )
}

/// Call `f` with every size-`k` combination of `items`, in lexicographic
/// index order.
fn for_each_combination(items: &[u32], k: usize, buf: &mut Vec<u32>, f: &mut impl FnMut(&[u32])) {
    fn recurse(
        items: &[u32],
        start: usize,
        k: usize,
        buf: &mut Vec<u32>,
        f: &mut impl FnMut(&[u32]),
    ) {
        if buf.len() == k {
            f(buf);
            return;
        }
        let remaining = k - buf.len();
        for i in start..=items.len() - remaining {
            buf.push(items[i]);
            recurse(items, i + 1, k, buf, f);
            buf.pop();
        }
    }

    buf.clear();
    if k <= items.len() {
        recurse(items, 0, k, buf, f);
    }
}

fn is_sorted_subset(small: &[u32], big: &[u32]) -> bool {
    let mut rest = big.iter();
    small.iter().all(|s| rest.by_ref().any(|b| b == s))
}

/// `n choose k`, saturating at `u64::MAX`.
fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k) as u64;
    let n = n as u64;
    let mut result: u64 = 1;
    for i in 0..k {
        result = match result.checked_mul(n - i) {
            Some(v) => v / (i + 1),
            None => return u64::MAX,
        };
    }
    result
}

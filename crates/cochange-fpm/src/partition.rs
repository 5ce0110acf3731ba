//! Grouping of mined itemsets by size, one output file per size.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cochange_core::{CochangeError, FrequentItemset};
use tracing::debug;

/// Group itemsets by member count, dropping singletons.
///
/// Grouping does not depend on input order; within a group itemsets keep
/// their relative input order.
///
/// # Examples
///
/// ```
/// use cochange_core::FrequentItemset;
/// use cochange_fpm::partition::partition_by_size;
///
/// let sets: Vec<FrequentItemset> = [vec!["a", "b"], vec!["a", "b", "c"], vec!["c", "d"], vec!["e"]]
///     .into_iter()
///     .map(|items| FrequentItemset::new(items.into_iter().map(String::from).collect(), 1))
///     .collect();
/// let groups = partition_by_size(&sets);
/// assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
/// assert_eq!(groups[&2].len(), 2);
/// ```
pub fn partition_by_size(itemsets: &[FrequentItemset]) -> BTreeMap<usize, Vec<&FrequentItemset>> {
    let mut groups: BTreeMap<usize, Vec<&FrequentItemset>> = BTreeMap::new();
    for itemset in itemsets.iter().filter(|s| s.len() > 1) {
        groups.entry(itemset.len()).or_default().push(itemset);
    }
    groups
}

/// File name of the size group for `size` mined at `min_support`.
///
/// # Examples
///
/// ```
/// use cochange_fpm::partition::size_group_file_name;
///
/// assert_eq!(size_group_file_name(0.004, 3), "sup0.004-set-3.txt");
/// ```
pub fn size_group_file_name(min_support: f64, size: usize) -> String {
    format!("sup{min_support}-set-{size}.txt")
}

/// Render a size group, one space-joined itemset per line.
pub fn size_group_to_string(group: &[&FrequentItemset]) -> String {
    let mut out = String::new();
    for itemset in group {
        out.push_str(&itemset.items.join(" "));
        out.push('\n');
    }
    out
}

/// Write every non-empty size group into `dir`, returning `(size, path)`
/// pairs in ascending size order.
///
/// # Errors
///
/// Returns [`CochangeError::Io`] if a file cannot be written.
pub fn write_size_groups(
    dir: &Path,
    min_support: f64,
    groups: &BTreeMap<usize, Vec<&FrequentItemset>>,
) -> Result<Vec<(usize, PathBuf)>, CochangeError> {
    let mut written = Vec::new();
    for (&size, group) in groups {
        if group.is_empty() {
            continue;
        }
        let path = dir.join(size_group_file_name(min_support, size));
        std::fs::write(&path, size_group_to_string(group))?;
        debug!(size, itemsets = group.len(), path = %path.display(), "size group written");
        written.push((size, path));
    }
    Ok(written)
}

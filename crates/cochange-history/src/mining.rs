//! Git history extraction via git2.
//!
//! Walks a branch from its first commit to its tip, extracting per-commit
//! file changes with line counts, the committer, and the commit message.

use std::collections::HashMap;
use std::path::Path;

use cochange_core::CochangeError;
use git2::{DiffFindOptions, DiffOptions, Repository, Sort};
use tracing::debug;

/// Raw commit data extracted from git history.
///
/// # Examples
///
/// ```
/// use cochange_history::mining::CommitInfo;
///
/// let info = CommitInfo {
///     hash: "abc12345".into(),
///     committer: "alice".into(),
///     message: "Fix parsing of leap years".into(),
///     files_changed: vec![],
/// };
/// assert_eq!(info.committer, "alice");
/// ```
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Short commit hash.
    pub hash: String,
    /// Committer name.
    pub committer: String,
    /// Full commit message.
    pub message: String,
    /// Files modified in this commit.
    pub files_changed: Vec<FileChange>,
}

/// A single file change within a commit.
///
/// # Examples
///
/// ```
/// use cochange_history::mining::FileChange;
///
/// let change = FileChange {
///     path: "src/main/java/org/joda/time/DateTime.java".into(),
///     lines_added: 10,
///     lines_deleted: 3,
/// };
/// assert_eq!(change.lines_changed(), 13);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// File path relative to repo root.
    pub path: String,
    /// Lines added in this commit.
    pub lines_added: u64,
    /// Lines deleted in this commit.
    pub lines_deleted: u64,
}

impl FileChange {
    /// Lines added plus lines deleted.
    pub fn lines_changed(&self) -> u64 {
        self.lines_added + self.lines_deleted
    }
}

/// Options for history extraction.
///
/// # Examples
///
/// ```
/// use cochange_history::mining::MiningOptions;
///
/// let opts = MiningOptions::default();
/// assert!(opts.branch.is_none());
/// assert!(opts.max_files_per_commit.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MiningOptions {
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
    /// Skip commits touching more files than this (default: no limit).
    pub max_files_per_commit: Option<usize>,
}

/// Extract the commit history of a git repository.
///
/// Returns commits oldest first. Each commit is diffed against its first
/// parent (the root commit against the empty tree) with rename detection.
///
/// # Errors
///
/// Returns [`CochangeError::Git`] if the repository cannot be opened or walked.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use cochange_history::mining::{mine_history, MiningOptions};
///
/// let commits = mine_history(Path::new("."), &MiningOptions::default()).unwrap();
/// for c in &commits {
///     println!("{}: {} files", c.hash, c.files_changed.len());
/// }
/// ```
pub fn mine_history(
    repo_path: &Path,
    options: &MiningOptions,
) -> Result<Vec<CommitInfo>, CochangeError> {
    let repo = Repository::open(repo_path)
        .map_err(|e| CochangeError::Git(format!("failed to open repository: {e}")))?;

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| CochangeError::Git(format!("failed to create revwalk: {e}")))?;

    revwalk
        .set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)
        .map_err(|e| CochangeError::Git(format!("failed to set revwalk order: {e}")))?;

    if let Some(ref branch) = options.branch {
        let reference = repo
            .resolve_reference_from_short_name(branch)
            .map_err(|e| CochangeError::Git(format!("failed to resolve branch '{branch}': {e}")))?;
        let oid = reference
            .target()
            .ok_or_else(|| CochangeError::Git("branch has no target".into()))?;
        revwalk
            .push(oid)
            .map_err(|e| CochangeError::Git(format!("failed to push oid: {e}")))?;
    } else {
        revwalk
            .push_head()
            .map_err(|e| CochangeError::Git(format!("failed to push HEAD: {e}")))?;
    }

    let mut commits = Vec::new();

    for oid_result in revwalk {
        let oid = oid_result.map_err(|e| CochangeError::Git(format!("revwalk error: {e}")))?;

        let commit = repo
            .find_commit(oid)
            .map_err(|e| CochangeError::Git(format!("failed to find commit: {e}")))?;

        let files_changed = extract_file_changes(&repo, &commit)?;
        let hash = oid.to_string();
        let hash = &hash[..hash.len().min(8)];

        if let Some(max) = options.max_files_per_commit {
            if files_changed.len() > max {
                debug!(commit = hash, files = files_changed.len(), "skipping large commit");
                continue;
            }
        }

        let committer = commit.committer();

        commits.push(CommitInfo {
            hash: hash.to_string(),
            committer: committer.name().unwrap_or("unknown").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            files_changed,
        });
    }

    debug!(commits = commits.len(), "history extracted");
    Ok(commits)
}

fn extract_file_changes(
    repo: &Repository,
    commit: &git2::Commit,
) -> Result<Vec<FileChange>, CochangeError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| CochangeError::Git(format!("failed to get commit tree: {e}")))?;

    let parent_tree = if commit.parent_count() > 0 {
        let parent = commit
            .parent(0)
            .map_err(|e| CochangeError::Git(format!("failed to get parent: {e}")))?;
        Some(
            parent
                .tree()
                .map_err(|e| CochangeError::Git(format!("failed to get parent tree: {e}")))?,
        )
    } else {
        None
    };

    let mut diff_opts = DiffOptions::new();
    let mut diff = repo
        .diff_tree_to_tree(
            parent_tree.as_ref(),
            Some(&commit_tree),
            Some(&mut diff_opts),
        )
        .map_err(|e| CochangeError::Git(format!("failed to compute diff: {e}")))?;

    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true);
    diff.find_similar(Some(&mut find_opts))
        .map_err(|e| CochangeError::Git(format!("failed to find renames: {e}")))?;

    let mut changes: Vec<FileChange> = Vec::new();
    for delta in diff.deltas() {
        let Some(path) = delta_path(&delta) else {
            continue;
        };
        if changes.iter().any(|c| c.path == path) {
            continue;
        }
        changes.push(FileChange {
            path,
            lines_added: 0,
            lines_deleted: 0,
        });
    }

    // Count lines added/deleted per file
    let mut line_counts: HashMap<String, (u64, u64)> = HashMap::new();

    diff.foreach(
        &mut |_delta, _progress| true,
        None,
        None,
        Some(&mut |delta, _hunk, line| {
            if let Some(path) = delta_path(&delta) {
                let entry = line_counts.entry(path).or_insert((0, 0));
                match line.origin() {
                    '+' => entry.0 += 1,
                    '-' => entry.1 += 1,
                    _ => {}
                }
            }
            true
        }),
    )
    .map_err(|e| CochangeError::Git(format!("failed to iterate diff lines: {e}")))?;

    for change in &mut changes {
        if let Some((added, deleted)) = line_counts.get(&change.path) {
            change.lines_added = *added;
            change.lines_deleted = *deleted;
        }
    }

    Ok(changes)
}

/// New path of a delta, falling back to the old path for deletions.
fn delta_path(delta: &git2::DiffDelta<'_>) -> Option<String> {
    let path = delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())?
        .to_string_lossy()
        .to_string();
    (!path.is_empty()).then_some(path)
}

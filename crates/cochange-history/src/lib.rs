//! Transaction log builder: turns git history into co-change inputs.
//!
//! Walks a repository with git2 and produces the two inputs of the mining
//! pipeline: a transaction log (the files touched by each commit) and a
//! per-file change statistics table, including bug-fix commit counts
//! derived from commit message keywords.

pub mod classify;
pub mod mining;
pub mod stats;
pub mod transactions;

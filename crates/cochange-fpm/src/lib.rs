//! Frequent co-change pattern mining.
//!
//! Mines sets of files that change together from a transaction log, bands
//! the mined sets by frequency while averaging the member files' change
//! statistics, and splits them by size for rule evaluation.

pub mod bands;
pub mod miner;
pub mod partition;

//! Core types, configuration, and error handling for co-change mining.
//!
//! This crate provides the shared foundation used by all other crates:
//! - [`CochangeError`]: unified error type using `thiserror`
//! - [`CochangeConfig`]: configuration loaded from `.cochange.toml`
//! - Shared types: [`Transaction`], [`FileStatsRecord`], [`FileStatsTable`],
//!   [`FrequentItemset`], [`OutputFormat`]
//! - [`table`]: comma-separated table helpers

mod config;
mod error;
pub mod table;
mod types;

pub use config::{BandConfig, CochangeConfig, HistoryConfig, MiningConfig, PathsConfig};
pub use error::CochangeError;
pub use types::{
    per_commit_average, FileStatsRecord, FileStatsTable, FrequentItemset, OutputFormat,
    Transaction,
};

/// A convenience `Result` type for co-change operations.
pub type Result<T> = std::result::Result<T, CochangeError>;

//! Precision/recall evaluation of mined co-change rules against a
//! hand-curated ground truth.

pub mod curve;
pub mod evaluate;
pub mod groundtruth;

//! Precision/recall curve over the best pair of each scored rule.

use std::fmt;
use std::path::Path;

use cochange_core::table::{format_cell, join_row};
use cochange_core::CochangeError;
use serde::Serialize;
use tracing::debug;

use crate::evaluate::EvaluationReport;

/// Curve header, x axis first.
pub const CURVE_COLUMNS: [&str; 2] = ["Recall", "Precision"];

/// One point of the curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub recall: f64,
    pub precision: f64,
}

/// Points sorted by recall, ready for plotting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrecisionRecallCurve {
    pub title: String,
    pub points: Vec<CurvePoint>,
}

impl PrecisionRecallCurve {
    /// Build the curve from the scored rules of `report`. Points with equal
    /// recall keep rule order.
    ///
    /// # Examples
    ///
    /// ```
    /// use cochange_eval::curve::PrecisionRecallCurve;
    /// use cochange_eval::evaluate::{evaluate, CandidateRule};
    /// use cochange_eval::groundtruth::GroundTruth;
    ///
    /// let gt = GroundTruth::parse("a b\nc d e\n", "inline");
    /// let rules: Vec<_> = ["a b", "c d"].iter().filter_map(|l| CandidateRule::parse_line(l)).collect();
    /// let curve = PrecisionRecallCurve::from_report(&evaluate(&rules, &gt), "demo");
    /// assert_eq!(curve.points.len(), 2);
    /// assert_eq!(curve.points[0].recall, 0.5);
    /// ```
    pub fn from_report(report: &EvaluationReport, title: impl Into<String>) -> Self {
        let mut points: Vec<CurvePoint> = report
            .scored()
            .map(|s| CurvePoint {
                recall: s.recall,
                precision: s.precision,
            })
            .collect();
        points.sort_by(|a, b| a.recall.total_cmp(&b.recall));
        Self {
            title: title.into(),
            points,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Render as CSV with a `Recall,Precision` header.
    pub fn to_csv(&self) -> String {
        let mut out = join_row(CURVE_COLUMNS);
        out.push('\n');
        for p in &self.points {
            let (recall, precision) = (format_cell(p.recall), format_cell(p.precision));
            out.push_str(&join_row([recall.as_str(), precision.as_str()]));
            out.push('\n');
        }
        out
    }

    /// Write the CSV rendering to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CochangeError::Io`] if the file cannot be written.
    pub fn write_csv(&self, path: &Path) -> Result<(), CochangeError> {
        std::fs::write(path, self.to_csv())?;
        debug!(path = %path.display(), points = self.points.len(), "curve written");
        Ok(())
    }
}

impl fmt::Display for PrecisionRecallCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{:>10} {:>10}", CURVE_COLUMNS[0], CURVE_COLUMNS[1])?;
        for p in &self.points {
            writeln!(f, "{:>10.3} {:>10.3}", p.recall, p.precision)?;
        }
        Ok(())
    }
}

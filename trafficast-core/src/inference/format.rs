//! Result formatting: rounding at the presentation boundary and batch reports.

use crate::data::record::value_to_text;
use crate::data::source::{DataBatch, write_csv};
use crate::error::DataError;
use crate::inference::adapter::IntervalBatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

pub const PREDICTED_COLUMN: &str = "Predicted Traffic Volume";
pub const LOWER_COLUMN: &str = "Lower Volume Limit";
pub const UPPER_COLUMN: &str = "Upper Volume Limit";

/// One formatted prediction: rounded volumes plus the confidence percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
    /// `(1 - alpha) * 100`.
    pub confidence: f64,
}

impl PredictionResult {
    /// Confidence as a fraction in (0, 1).
    pub fn confidence_level(&self) -> f64 {
        self.confidence / 100.0
    }

    pub fn interval_width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn is_ordered(&self) -> bool {
        self.lower <= self.point && self.point <= self.upper
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0} (confidence interval {}%: [{:.0}, {:.0}])",
            self.point,
            format_percent(self.confidence),
            self.lower,
            self.upper
        )
    }
}

/// Round half to even, folding negative zero into zero.
pub fn round_volume(value: f64) -> f64 {
    value.round_ties_even() + 0.0
}

/// Percentages print with up to two decimals and no trailing zeros.
pub fn format_percent(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Pair rounded values with the realized confidence, one result per row in order.
pub fn format_results(
    points: &[f64],
    lowers: &[f64],
    uppers: &[f64],
    alpha: f64,
) -> Vec<PredictionResult> {
    let confidence = (1.0 - alpha) * 100.0;
    points
        .iter()
        .zip(lowers)
        .zip(uppers)
        .map(|((point, lower), upper)| PredictionResult {
            point: round_volume(*point),
            lower: round_volume(*lower),
            upper: round_volume(*upper),
            confidence,
        })
        .collect()
}

impl IntervalBatch {
    pub fn to_results(&self) -> Vec<PredictionResult> {
        format_results(&self.points, &self.lowers, &self.uppers, self.alpha)
    }
}

/// A batch upload with the prediction columns appended.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl BatchReport {
    /// `results[i]` must belong to `batch.rows[i]`.
    pub fn new(batch: &DataBatch, results: &[PredictionResult]) -> Self {
        let header = batch
            .columns
            .iter()
            .cloned()
            .chain([PREDICTED_COLUMN, LOWER_COLUMN, UPPER_COLUMN].map(str::to_string))
            .collect();
        let rows = batch
            .rows
            .iter()
            .zip(results)
            .map(|(raw, result)| {
                batch
                    .columns
                    .iter()
                    .map(|col| raw.get(col).map(value_to_text).unwrap_or_default())
                    .chain([
                        format!("{:.0}", result.point),
                        format!("{:.0}", result.lower),
                        format!("{:.0}", result.upper),
                    ])
                    .collect()
            })
            .collect();
        Self { header, rows }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), DataError> {
        write_csv(writer, &self.header, &self.rows)
    }
}

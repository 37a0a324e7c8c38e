//! Interval predictor adapter: one predictor call per batch, then bound post-processing.
//!
//! Lower bounds are clipped at zero row by row; upper bounds are passed through.
//! Nothing is rounded here, rounding belongs to the formatter.

use crate::error::PredictionError;
use crate::features::encode::EncodedMatrix;
use crate::inference::predictor::IntervalPredictor;

/// Unrounded, post-processed predictor output for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalBatch {
    pub points: Vec<f64>,
    pub lowers: Vec<f64>,
    pub uppers: Vec<f64>,
    pub alpha: f64,
}

impl IntervalBatch {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Rows where `lower <= point <= upper` does not hold.
    ///
    /// Conformal intervals do not guarantee this ordering, and clipping a
    /// negative point's lower bound to zero can break it too.
    pub fn unordered_rows(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| !(self.lowers[i] <= self.points[i] && self.points[i] <= self.uppers[i]))
            .collect()
    }
}

pub fn validate_alpha(alpha: f64) -> Result<f64, PredictionError> {
    if alpha.is_finite() && alpha > 0.0 && alpha < 1.0 {
        Ok(alpha)
    } else {
        Err(PredictionError::InvalidAlpha { alpha })
    }
}

/// Run `predictor` over the whole matrix at miscoverage `alpha`.
pub fn predict_interval(
    predictor: &dyn IntervalPredictor,
    matrix: &EncodedMatrix,
    alpha: f64,
) -> Result<IntervalBatch, PredictionError> {
    let alpha = validate_alpha(alpha)?;
    if matrix.width() != predictor.expected_width() {
        return Err(PredictionError::WidthMismatch {
            expected: predictor.expected_width(),
            actual: matrix.width(),
        });
    }

    let rows = matrix.row_count();
    let raw = predictor.predict(matrix, alpha)?;
    if raw.points.len() != rows {
        return Err(PredictionError::OutputLength {
            what: "points",
            expected: rows,
            actual: raw.points.len(),
        });
    }
    if raw.intervals.len() != rows {
        return Err(PredictionError::OutputLength {
            what: "intervals",
            expected: rows,
            actual: raw.intervals.len(),
        });
    }

    let mut lowers = Vec::with_capacity(rows);
    let mut uppers = Vec::with_capacity(rows);
    let mut clipped = 0usize;
    for (row, (point, [lower, upper])) in raw.points.iter().zip(&raw.intervals).enumerate() {
        if !(point.is_finite() && lower.is_finite() && upper.is_finite()) {
            return Err(PredictionError::NonFinite { row });
        }
        if *lower < 0.0 {
            clipped += 1;
        }
        lowers.push(lower.max(0.0));
        uppers.push(*upper);
    }

    tracing::debug!(
        predictor = predictor.name(),
        rows,
        alpha,
        clipped,
        "Predicted intervals"
    );
    Ok(IntervalBatch {
        points: raw.points,
        lowers,
        uppers,
        alpha,
    })
}

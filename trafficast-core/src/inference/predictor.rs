//! The frozen interval predictor contract.

use crate::error::PredictionError;
use crate::features::encode::EncodedMatrix;

/// Output of one predictor call: a point estimate and a `[lower, upper]`
/// interval per input row, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub points: Vec<f64>,
    pub intervals: Vec<[f64; 2]>,
}

/// A pre-trained model producing prediction intervals at miscoverage `alpha`.
///
/// Implementations are loaded once and shared read-only across requests, so
/// `predict` must not depend on hidden mutable state.
pub trait IntervalPredictor: Send + Sync {
    fn name(&self) -> &str;

    /// Number of input columns the model was fit on.
    fn expected_width(&self) -> usize;

    /// Input column names in fit order, when the artifact records them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn predict(&self, matrix: &EncodedMatrix, alpha: f64)
    -> Result<RawPrediction, PredictionError>;
}

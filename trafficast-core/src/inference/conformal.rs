//! Split-conformal linear model artifact.
//!
//! The artifact is a JSON document holding a linear point model fit on the
//! encoded columns plus the absolute residuals it produced on a held-out
//! calibration split. For miscoverage `alpha` the interval half-width is the
//! `ceil((n + 1)(1 - alpha))`-th smallest calibration score, so coverage is at
//! least `1 - alpha` for exchangeable data and the interval never widens as
//! `alpha` grows. Below `alpha = 1 / (n + 1)` that rank exceeds `n` and no
//! finite interval carries the guarantee, so such requests are refused.

use crate::error::PredictionError;
use crate::features::encode::EncodedMatrix;
use crate::inference::predictor::{IntervalPredictor, RawPrediction};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serialized form of the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConformalArtifact {
    pub name: String,
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// Absolute residuals on the calibration split.
    pub calibration_scores: Vec<f64>,
}

/// A validated, ready-to-serve conformal linear model.
#[derive(Debug, Clone)]
pub struct ConformalLinearModel {
    artifact: ConformalArtifact,
    sorted_scores: Vec<f64>,
}

impl ConformalLinearModel {
    pub fn from_artifact(artifact: ConformalArtifact) -> Result<Self, PredictionError> {
        if artifact.coefficients.len() != artifact.feature_names.len() {
            return Err(PredictionError::Artifact(format!(
                "{} coefficients for {} features",
                artifact.coefficients.len(),
                artifact.feature_names.len()
            )));
        }
        if artifact.calibration_scores.is_empty() {
            return Err(PredictionError::Artifact(
                "calibration scores are empty".to_string(),
            ));
        }
        let all_finite = std::iter::once(artifact.intercept)
            .chain(artifact.coefficients.iter().copied())
            .chain(artifact.calibration_scores.iter().copied())
            .all(f64::is_finite);
        if !all_finite {
            return Err(PredictionError::Artifact(
                "artifact contains non-finite values".to_string(),
            ));
        }

        let mut sorted_scores: Vec<f64> =
            artifact.calibration_scores.iter().map(|s| s.abs()).collect();
        sorted_scores.sort_by(f64::total_cmp);
        Ok(Self {
            artifact,
            sorted_scores,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, PredictionError> {
        let artifact: ConformalArtifact = serde_json::from_str(text)
            .map_err(|e| PredictionError::Artifact(format!("invalid JSON: {e}")))?;
        Self::from_artifact(artifact)
    }

    pub fn load(path: &Path) -> Result<Self, PredictionError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PredictionError::Artifact(format!("failed to read {}: {e}", path.display()))
        })?;
        let model = Self::from_json(&text)?;
        tracing::info!(
            path = %path.display(),
            name = %model.artifact.name,
            width = model.expected_width(),
            calibration = model.sorted_scores.len(),
            "Loaded conformal model"
        );
        Ok(model)
    }

    pub fn artifact(&self) -> &ConformalArtifact {
        &self.artifact
    }

    /// Interval half-width for miscoverage `alpha`.
    pub fn quantile(&self, alpha: f64) -> Result<f64, PredictionError> {
        let n = self.sorted_scores.len();
        let rank = ((n as f64 + 1.0) * (1.0 - alpha)).ceil() as usize;
        if rank > n {
            return Err(PredictionError::InsufficientCalibration { alpha, scores: n });
        }
        Ok(self.sorted_scores[rank.max(1) - 1])
    }

    fn point(&self, row: &[f64]) -> f64 {
        self.artifact.intercept
            + row
                .iter()
                .zip(&self.artifact.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>()
    }
}

impl IntervalPredictor for ConformalLinearModel {
    fn name(&self) -> &str {
        &self.artifact.name
    }

    fn expected_width(&self) -> usize {
        self.artifact.feature_names.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.artifact.feature_names)
    }

    fn predict(
        &self,
        matrix: &EncodedMatrix,
        alpha: f64,
    ) -> Result<RawPrediction, PredictionError> {
        if matrix.width() != self.expected_width() {
            return Err(PredictionError::WidthMismatch {
                expected: self.expected_width(),
                actual: matrix.width(),
            });
        }
        let q = self.quantile(alpha)?;
        let points: Vec<f64> = matrix.rows().map(|row| self.point(row)).collect();
        let intervals = points.iter().map(|p| [p - q, p + q]).collect();
        Ok(RawPrediction { points, intervals })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact() -> ConformalArtifact {
        ConformalArtifact {
            name: "test-linear".to_string(),
            feature_names: vec!["a".to_string(), "b".to_string()],
            intercept: 100.0,
            coefficients: vec![2.0, -1.0],
            calibration_scores: vec![5.0, 1.0, 4.0, 2.0, 3.0, 9.0, 7.0, 6.0, 8.0, 10.0],
        }
    }

    #[test]
    fn test_quantile_ranks() {
        let model = ConformalLinearModel::from_artifact(artifact()).unwrap();
        // n = 10: rank = ceil(11 * 0.9) = 10 -> 10.0; ceil(11 * 0.5) = 6 -> 6.0
        assert_eq!(model.quantile(0.1).unwrap(), 10.0);
        assert_eq!(model.quantile(0.5).unwrap(), 6.0);
        assert_eq!(model.quantile(0.95).unwrap(), 1.0);
    }

    #[test]
    fn test_alpha_below_calibration_resolution_is_refused() {
        let model = ConformalLinearModel::from_artifact(artifact()).unwrap();
        // n = 10 supports alpha down to 1/11
        for alpha in [0.01, 0.05, 0.09] {
            assert!(matches!(
                model.quantile(alpha),
                Err(PredictionError::InsufficientCalibration { scores: 10, .. })
            ));
        }

        let matrix = EncodedMatrix::from_rows(
            model.artifact().feature_names.clone(),
            vec![vec![0.0, 0.0]],
        )
        .unwrap();
        assert!(matches!(
            model.predict(&matrix, 0.01),
            Err(PredictionError::InsufficientCalibration { .. })
        ));
        assert!(model.predict(&matrix, 0.1).is_ok());
    }

    #[test]
    fn test_quantile_monotone_in_alpha() {
        let model = ConformalLinearModel::from_artifact(artifact()).unwrap();
        let mut previous = f64::INFINITY;
        for step in 10..100 {
            let q = model.quantile(step as f64 / 100.0).unwrap();
            assert!(q <= previous);
            previous = q;
        }
    }

    #[test]
    fn test_predict() {
        let model = ConformalLinearModel::from_artifact(artifact()).unwrap();
        let matrix = EncodedMatrix::from_rows(
            model.artifact().feature_names.clone(),
            vec![vec![10.0, 5.0], vec![0.0, 0.0]],
        )
        .unwrap();
        let out = model.predict(&matrix, 0.5).unwrap();
        assert_eq!(out.points, vec![115.0, 100.0]);
        assert_eq!(out.intervals, vec![[109.0, 121.0], [94.0, 106.0]]);
    }

    #[test]
    fn test_predict_width_mismatch() {
        let model = ConformalLinearModel::from_artifact(artifact()).unwrap();
        let matrix = EncodedMatrix::from_rows(vec!["a".to_string()], vec![vec![1.0]]).unwrap();
        assert!(matches!(
            model.predict(&matrix, 0.1),
            Err(PredictionError::WidthMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_invalid_artifacts() {
        let mut bad = artifact();
        bad.coefficients.pop();
        assert!(ConformalLinearModel::from_artifact(bad).is_err());

        let mut bad = artifact();
        bad.calibration_scores.clear();
        assert!(ConformalLinearModel::from_artifact(bad).is_err());

        let mut bad = artifact();
        bad.intercept = f64::NAN;
        assert!(ConformalLinearModel::from_artifact(bad).is_err());

        assert!(ConformalLinearModel::from_json("{not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(&artifact()).unwrap()).unwrap();
        let model = ConformalLinearModel::load(&path).unwrap();
        assert_eq!(model.name(), "test-linear");
        assert_eq!(model.feature_names().map(<[String]>::len), Some(2));

        assert!(ConformalLinearModel::load(&dir.path().join("missing.json")).is_err());
    }
}

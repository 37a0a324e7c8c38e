//! Inference: the predictor contract, the conformal artifact, and result shaping.

pub mod adapter;
pub mod conformal;
pub mod format;
pub mod predictor;

pub use adapter::{IntervalBatch, predict_interval};
pub use conformal::{ConformalArtifact, ConformalLinearModel};
pub use format::{BatchReport, PredictionResult, format_results};
pub use predictor::{IntervalPredictor, RawPrediction};

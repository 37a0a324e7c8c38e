//! # trafficast-core: traffic-volume prediction intervals
//!
//! Turns raw weather and calendar records into the exact one-hot feature
//! layout a frozen conformal predictor was fit on, and shapes its output
//! into rounded point estimates with confidence intervals.
//!
//! ## Stages
//!
//! 1. **Schema reference** ([`data::schema`]): categorical vocabulary and
//!    column order, built once from the reference dataset
//! 2. **Normalizer** ([`features::normalize`]): calendar decomposition and
//!    categorical cleanup
//! 3. **Aligner** ([`features::encode`]): one-hot encoding against the
//!    stored vocabulary only
//! 4. **Interval adapter** ([`inference::adapter`]): one predictor call per
//!    batch, lower bounds clipped at zero
//! 5. **Formatter** ([`inference::format`]): rounding and confidence level
//!
//! [`TrafficPipeline`] composes the stages around explicitly passed shared state.

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod inference;
pub mod pipeline;

// Re-exports
pub use config::{TrafficConfig, load_config};
pub use data::{DataBatch, RawRecord, SchemaReference};
pub use error::{
    ConfigError, DataError, NormalizationError, PredictionError, SchemaBuildError,
    SchemaMismatchError, TrafficError,
};
pub use features::{EncodedMatrix, NormalizedRecord, UnknownCategoryPolicy};
pub use inference::{IntervalPredictor, PredictionResult};
pub use pipeline::TrafficPipeline;

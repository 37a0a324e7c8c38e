//! Request handling: normalize -> align -> predict -> format.
//!
//! A [`TrafficPipeline`] is built once at startup from an immutable schema
//! reference and a shared predictor, then serves any number of requests by
//! shared reference. Nothing in a request mutates the pipeline, so a failed
//! request leaves it usable for the next one.

use crate::config::TrafficConfig;
use crate::data::record::RawRecord;
use crate::data::schema::SchemaReference;
use crate::data::source::CsvSource;
use crate::error::{SchemaMismatchError, TrafficError};
use crate::features::encode::{Aligner, EncodedMatrix, UnknownCategoryPolicy};
use crate::features::normalize::{NormalizedRecord, Normalizer};
use crate::inference::adapter::{IntervalBatch, predict_interval};
use crate::inference::conformal::ConformalLinearModel;
use crate::inference::format::PredictionResult;
use crate::inference::predictor::IntervalPredictor;
use chrono::NaiveDateTime;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// The prediction pipeline with its shared, read-only state.
#[derive(Clone)]
pub struct TrafficPipeline {
    aligner: Aligner,
    predictor: Arc<dyn IntervalPredictor>,
}

impl std::fmt::Debug for TrafficPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficPipeline")
            .field("predictor", &self.predictor.name())
            .field("width", &self.aligner.schema().width())
            .field("policy", &self.aligner.policy())
            .finish()
    }
}

impl TrafficPipeline {
    /// Assemble a pipeline, refusing a schema whose layout the predictor does not accept.
    pub fn new(
        schema: Arc<SchemaReference>,
        predictor: Arc<dyn IntervalPredictor>,
        policy: UnknownCategoryPolicy,
    ) -> Result<Self, SchemaMismatchError> {
        let empty = EncodedMatrix::empty(schema.full_column_order().to_vec());
        if let Err(err) = empty.ensure_matches(predictor.expected_width(), predictor.feature_names())
        {
            tracing::error!(
                predictor = predictor.name(),
                error = %err,
                "Reference schema and predictor artifact disagree"
            );
            return Err(err);
        }
        tracing::info!(
            predictor = predictor.name(),
            width = schema.width(),
            %policy,
            "Prediction pipeline ready"
        );
        Ok(Self {
            aligner: Aligner::new(schema, policy),
            predictor,
        })
    }

    /// Load the reference dataset and model artifact named by `config`.
    pub fn from_config(config: &TrafficConfig, workspace: &Path) -> Result<Self, TrafficError> {
        let reference_path = TrafficConfig::resolve(workspace, &config.data.reference_path);
        let dataset = CsvSource::new(&reference_path).load(None)?;
        let schema = SchemaReference::build_with_sample(&dataset, config.data.sample_rows)?;

        let artifact_path = TrafficConfig::resolve(workspace, &config.model.artifact_path);
        let model = ConformalLinearModel::load(&artifact_path)?;

        Ok(Self::new(
            Arc::new(schema),
            Arc::new(model),
            config.prediction.unknown_categories,
        )?)
    }

    pub fn schema(&self) -> &SchemaReference {
        self.aligner.schema()
    }

    pub fn predictor(&self) -> &dyn IntervalPredictor {
        self.predictor.as_ref()
    }

    /// Predict one record that carries its own timestamp or calendar fields.
    pub fn predict_record(
        &self,
        raw: &RawRecord,
        alpha: f64,
    ) -> Result<PredictionResult, TrafficError> {
        self.run("record", 1, || {
            let record = Normalizer::new().normalize(raw)?;
            self.predict_single(record, alpha)
        })
    }

    /// Predict one form entry: calendar fields default to `now`, and the
    /// continuous inputs must lie within the schema's input bounds.
    pub fn predict_form(
        &self,
        raw: &RawRecord,
        alpha: f64,
        now: NaiveDateTime,
    ) -> Result<PredictionResult, TrafficError> {
        self.run("form", 1, || {
            let record = Normalizer::with_default_instant(now).normalize(raw)?;
            self.schema().input_bounds().check(&record)?;
            self.predict_single(record, alpha)
        })
    }

    /// Predict a batch atomically; `results[i]` belongs to `raws[i]`.
    pub fn predict_batch(
        &self,
        raws: &[RawRecord],
        alpha: f64,
    ) -> Result<Vec<PredictionResult>, TrafficError> {
        self.run("batch", raws.len(), || {
            let records = Normalizer::new().normalize_batch(raws)?;
            Ok(self.predict_normalized(&records, alpha)?.to_results())
        })
    }

    /// Encode and predict already-normalized records, returning unrounded bounds.
    pub fn predict_normalized(
        &self,
        records: &[NormalizedRecord],
        alpha: f64,
    ) -> Result<IntervalBatch, TrafficError> {
        let matrix = self.encode(records)?;
        let batch = predict_interval(self.predictor.as_ref(), &matrix, alpha)?;
        let unordered = batch.unordered_rows();
        if !unordered.is_empty() {
            tracing::warn!(
                rows = ?unordered,
                "Interval does not bracket the point estimate"
            );
        }
        Ok(batch)
    }

    /// Align records to the schema and verify the predictor accepts the layout.
    pub fn encode(&self, records: &[NormalizedRecord]) -> Result<EncodedMatrix, TrafficError> {
        let matrix = self.aligner.align(records)?;
        matrix.ensure_matches(
            self.predictor.expected_width(),
            self.predictor.feature_names(),
        )?;
        Ok(matrix)
    }

    fn predict_single(
        &self,
        record: NormalizedRecord,
        alpha: f64,
    ) -> Result<PredictionResult, TrafficError> {
        self.predict_normalized(std::slice::from_ref(&record), alpha)?
            .to_results()
            .pop()
            .ok_or_else(|| {
                crate::error::PredictionError::OutputLength {
                    what: "results",
                    expected: 1,
                    actual: 0,
                }
                .into()
            })
    }

    /// Run one request inside its own span and log rejections at the boundary.
    fn run<T>(
        &self,
        kind: &'static str,
        rows: usize,
        request: impl FnOnce() -> Result<T, TrafficError>,
    ) -> Result<T, TrafficError> {
        let span = tracing::info_span!("request", id = %Uuid::new_v4(), kind, rows);
        let _guard = span.enter();
        let result = request();
        match &result {
            Ok(_) => tracing::debug!("Request completed"),
            Err(err @ TrafficError::SchemaMismatch(_)) => {
                tracing::error!(error = %err, "Request rejected: schema skew")
            }
            Err(err) => tracing::warn!(error = %err, "Request rejected"),
        }
        result
    }
}

//! Property-based tests for the prediction pipeline using proptest.

use proptest::prelude::*;
use std::sync::Arc;

use trafficast_core::data::columns;
use trafficast_core::features::calendar::{MONTHS, WEEKDAYS, hour_labels};
use trafficast_core::features::{Aligner, Normalizer};
use trafficast_core::inference::format::round_volume;
use trafficast_core::inference::{ConformalArtifact, ConformalLinearModel};
use trafficast_core::{RawRecord, SchemaReference, TrafficPipeline, UnknownCategoryPolicy};

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn schema() -> Arc<SchemaReference> {
    Arc::new(
        SchemaReference::from_vocabulary(&[
            (columns::HOLIDAY, owned(&["Christmas Day", "Labor Day"])),
            (columns::WEATHER_MAIN, owned(&["Clear", "Clouds", "Rain", "Snow"])),
            (columns::MONTH, owned(&MONTHS)),
            (columns::WEEKDAY, owned(&WEEKDAYS)),
            (columns::HOUR, hour_labels()),
        ])
        .unwrap(),
    )
}

/// A linear model with a coefficient for every column and a fixed score set.
fn pipeline(policy: UnknownCategoryPolicy) -> TrafficPipeline {
    let schema = schema();
    let feature_names = schema.full_column_order().to_vec();
    let coefficients = (0..feature_names.len())
        .map(|i| ((i * 37) % 11) as f64 * 25.0 - 100.0)
        .collect();
    let artifact = ConformalArtifact {
        name: "prop-linear".to_string(),
        feature_names,
        intercept: 500.0,
        coefficients,
        calibration_scores: (1..=100).map(|i| (i * i) as f64).collect(),
    };
    let model = ConformalLinearModel::from_artifact(artifact).unwrap();
    TrafficPipeline::new(schema, Arc::new(model), policy).unwrap()
}

fn arb_record() -> impl Strategy<Value = RawRecord> {
    (
        prop::option::of(prop::sample::select(vec![
            "Christmas Day",
            "Labor Day",
            "New Years Day",
        ])),
        245.0f64..315.0,
        0.0f64..20.0,
        0.0f64..5.0,
        0u32..=100,
        prop::sample::select(vec!["Clear", "Clouds", "Rain", "Snow", "Haze"]),
        prop::sample::select(MONTHS.to_vec()),
        prop::sample::select(WEEKDAYS.to_vec()),
        0u32..24,
    )
        .prop_map(
            |(holiday, temp, rain, snow, clouds, weather, month, weekday, hour)| {
                let mut raw = RawRecord::new()
                    .with(columns::TEMP, temp)
                    .with(columns::RAIN_1H, rain)
                    .with(columns::SNOW_1H, snow)
                    .with(columns::CLOUDS_ALL, clouds)
                    .with(columns::WEATHER_MAIN, weather)
                    .with(columns::MONTH, month)
                    .with(columns::WEEKDAY, weekday)
                    .with(columns::HOUR, hour);
                if let Some(holiday) = holiday {
                    raw.insert(columns::HOLIDAY, holiday);
                }
                raw
            },
        )
}

// --- Alignment properties ---

proptest! {
    #[test]
    fn encoded_width_matches_schema(records in prop::collection::vec(arb_record(), 1..20)) {
        let schema = schema();
        let aligner = Aligner::new(schema.clone(), UnknownCategoryPolicy::ZeroFill);
        let normalized = Normalizer::new().normalize_batch(&records).unwrap();
        let matrix = aligner.align(&normalized).unwrap();

        prop_assert_eq!(matrix.width(), schema.width());
        prop_assert_eq!(matrix.row_count(), records.len());
        prop_assert_eq!(matrix.column_names(), schema.full_column_order());
    }

    #[test]
    fn alignment_is_deterministic(records in prop::collection::vec(arb_record(), 1..10)) {
        let aligner = Aligner::new(schema(), UnknownCategoryPolicy::ZeroFill);
        let normalized = Normalizer::new().normalize_batch(&records).unwrap();
        let first = aligner.align(&normalized).unwrap();
        let second = aligner.align(&normalized).unwrap();
        let bits = |m: &[f64]| m.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        prop_assert_eq!(bits(first.as_slice()), bits(second.as_slice()));
        prop_assert_eq!(first.column_names(), second.column_names());
    }

    #[test]
    fn each_group_has_at_most_one_indicator(record in arb_record()) {
        let schema = schema();
        let aligner = Aligner::new(schema.clone(), UnknownCategoryPolicy::ZeroFill);
        let normalized = Normalizer::new().normalize(&record).unwrap();
        let matrix = aligner.align(std::slice::from_ref(&normalized)).unwrap();

        for group in schema.categorical_columns() {
            let hot: Vec<&String> = group
                .values
                .iter()
                .filter(|v| matrix.value(0, &group.indicator_name(v)) == Some(1.0))
                .collect();
            prop_assert!(hot.len() <= 1, "group {} has {} indicators", group.name, hot.len());
            let known = normalized
                .categorical_value(&group.name)
                .and_then(|v| group.index_of(v))
                .is_some();
            prop_assert_eq!(hot.len() == 1, known);
        }
    }
}

// --- Prediction properties ---

proptest! {
    #[test]
    fn prediction_is_deterministic(record in arb_record(), alpha in 0.01f64..0.5) {
        let pipeline = pipeline(UnknownCategoryPolicy::ZeroFill);
        let first = pipeline.predict_record(&record, alpha).unwrap();
        let second = pipeline.predict_record(&record, alpha).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn batch_rows_match_single_predictions(
        records in prop::collection::vec(arb_record(), 1..15),
        alpha in 0.01f64..0.5,
    ) {
        let pipeline = pipeline(UnknownCategoryPolicy::ZeroFill);
        let batch = pipeline.predict_batch(&records, alpha).unwrap();
        prop_assert_eq!(batch.len(), records.len());
        for (record, result) in records.iter().zip(&batch) {
            prop_assert_eq!(&pipeline.predict_record(record, alpha).unwrap(), result);
        }
    }

    #[test]
    fn lower_bound_is_never_negative(
        records in prop::collection::vec(arb_record(), 1..15),
        alpha in 0.01f64..0.99,
    ) {
        let pipeline = pipeline(UnknownCategoryPolicy::ZeroFill);
        for result in pipeline.predict_batch(&records, alpha).unwrap() {
            prop_assert!(result.lower >= 0.0);
            prop_assert!(result.lower.is_sign_positive());
        }
    }

    #[test]
    fn interval_narrows_with_alpha(
        record in arb_record(),
        low in 0.01f64..0.25,
        gap in 0.0f64..0.5,
    ) {
        let pipeline = pipeline(UnknownCategoryPolicy::ZeroFill);
        let high = (low + gap).min(0.99);
        let wide = pipeline.predict_record(&record, low).unwrap();
        let narrow = pipeline.predict_record(&record, high).unwrap();
        prop_assert!(narrow.interval_width() <= wide.interval_width());
        prop_assert!((wide.confidence - (1.0 - low) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn rounding_is_to_nearest_integer(value in -1.0e6f64..1.0e6) {
        let rounded = round_volume(value);
        prop_assert_eq!(rounded.fract(), 0.0);
        prop_assert!((rounded - value).abs() <= 0.5);
    }
}

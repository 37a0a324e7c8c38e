use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use trafficast_core::data::columns;
use trafficast_core::data::source::read_csv;
use trafficast_core::features::calendar::{MONTHS, WEEKDAYS};
use trafficast_core::features::{Aligner, Normalizer};
use trafficast_core::inference::{ConformalArtifact, ConformalLinearModel};
use trafficast_core::{RawRecord, SchemaReference, TrafficPipeline, UnknownCategoryPolicy};

const WEATHER: [&str; 6] = ["Clear", "Clouds", "Rain", "Snow", "Mist", "Drizzle"];

/// A synthetic reference dataset covering every calendar label.
fn reference_csv(rows: usize) -> String {
    let mut csv = String::from(
        "holiday,temp,rain_1h,snow_1h,clouds_all,weather_main,date_time,traffic_volume\n",
    );
    for i in 0..rows {
        let holiday = if i % 97 == 0 { "Labor Day" } else { "" };
        let day = 1 + i % 28;
        let month = 1 + (i / 24) % 12;
        csv.push_str(&format!(
            "{},{:.2},{:.1},0.0,{},{},2013-{:02}-{:02} {:02}:00:00,{}\n",
            holiday,
            260.0 + (i % 40) as f64,
            (i % 5) as f64 * 0.5,
            i % 101,
            WEATHER[i % WEATHER.len()],
            month,
            day,
            i % 24,
            1000 + (i * 13) % 5000
        ));
    }
    csv
}

fn schema(rows: usize) -> Arc<SchemaReference> {
    let batch = read_csv(reference_csv(rows).as_bytes(), b',', None).unwrap();
    Arc::new(SchemaReference::build(&batch).unwrap())
}

fn pipeline(schema: Arc<SchemaReference>) -> TrafficPipeline {
    let feature_names = schema.full_column_order().to_vec();
    let coefficients = (0..feature_names.len()).map(|i| (i % 7) as f64).collect();
    let artifact = ConformalArtifact {
        name: "bench-linear".to_string(),
        feature_names,
        intercept: 100.0,
        coefficients,
        calibration_scores: (0..1000).map(|i| i as f64).collect(),
    };
    let model = ConformalLinearModel::from_artifact(artifact).unwrap();
    TrafficPipeline::new(schema, Arc::new(model), UnknownCategoryPolicy::ZeroFill).unwrap()
}

fn upload(rows: usize) -> Vec<RawRecord> {
    (0..rows)
        .map(|i| {
            RawRecord::new()
                .with(columns::TEMP, 270.0 + (i % 30) as f64)
                .with(columns::RAIN_1H, 0.0)
                .with(columns::SNOW_1H, 0.0)
                .with(columns::CLOUDS_ALL, (i % 100) as f64)
                .with(columns::WEATHER_MAIN, WEATHER[i % WEATHER.len()])
                .with(columns::MONTH, MONTHS[i % 12])
                .with(columns::WEEKDAY, WEEKDAYS[i % 7])
                .with(columns::HOUR, (i % 24) as u64)
        })
        .collect()
}

fn bench_schema_build(c: &mut Criterion) {
    let batch = read_csv(reference_csv(5000).as_bytes(), b',', None).unwrap();
    c.bench_function("schema_build_5000_rows", |b| {
        b.iter(|| SchemaReference::build(black_box(&batch)).unwrap())
    });
}

fn bench_alignment(c: &mut Criterion) {
    let schema = schema(2000);
    let aligner = Aligner::new(schema, UnknownCategoryPolicy::ZeroFill);
    let normalizer = Normalizer::new();

    let mut group = c.benchmark_group("align");
    for rows in [1usize, 100, 1000] {
        let records = normalizer.normalize_batch(&upload(rows)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(rows), &records, |b, records| {
            b.iter(|| aligner.align(black_box(records)).unwrap())
        });
    }
    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let pipeline = pipeline(schema(2000));
    let single = upload(1);

    c.bench_function("predict_single_record", |b| {
        b.iter(|| pipeline.predict_record(black_box(&single[0]), 0.1).unwrap())
    });

    let mut group = c.benchmark_group("predict_batch");
    for rows in [100usize, 1000] {
        let raws = upload(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &raws, |b, raws| {
            b.iter(|| pipeline.predict_batch(black_box(raws), 0.1).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_schema_build,
    bench_alignment,
    bench_prediction
);
criterion_main!(benches);

//! Schema reference: the categorical vocabulary and one-hot column order the
//! predictor was fit on.
//!
//! Built once from the reference dataset and immutable afterwards. The encoded
//! column order is a pure function of the vocabulary: continuous columns in
//! [`columns::CONTINUOUS`] order, then one `<column>_<value>` indicator per
//! distinct value, grouped in [`columns::CATEGORICAL`] order with values sorted
//! lexicographically. Hour labels sort as strings, so `hour_10` precedes `hour_2`.

use crate::data::record::columns;
use crate::data::source::DataBatch;
use crate::error::SchemaBuildError;
use crate::features::calendar::{self, MONTHS, WEEKDAYS};
use crate::features::normalize::{
    ABSENT_HOLIDAY, Bounds, InputBounds, NormalizedRecord, Normalizer,
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Number of reference rows kept as the sample upload format.
pub const DEFAULT_SAMPLE_ROWS: usize = 5;

/// Vocabulary of one categorical feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoricalColumn {
    pub name: String,
    /// Distinct values, sorted. This is the one-hot order.
    pub values: Vec<String>,
    /// Distinct values in first-seen order, for presentation.
    pub first_seen: Vec<String>,
}

impl CategoricalColumn {
    fn from_observed<'a>(name: &str, observed: impl IntoIterator<Item = &'a str>) -> Self {
        let mut first_seen: Vec<String> = Vec::new();
        let mut seen = BTreeSet::new();
        for value in observed {
            if seen.insert(value.to_string()) {
                first_seen.push(value.to_string());
            }
        }
        Self {
            name: name.to_string(),
            values: seen.into_iter().collect(),
            first_seen,
        }
    }

    /// Position of `value` within this group's indicator columns.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values
            .binary_search_by(|v| v.as_str().cmp(value))
            .ok()
    }

    pub fn indicator_name(&self, value: &str) -> String {
        format!("{}_{}", self.name, value)
    }
}

/// Choices offered for single-record entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormOptions {
    pub holidays: Vec<String>,
    pub weather: Vec<String>,
    pub months: Vec<String>,
    pub weekdays: Vec<String>,
    pub hours: Vec<String>,
    pub bounds: InputBounds,
}

/// Immutable description of the predictor's training-time feature schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaReference {
    continuous: Vec<String>,
    categorical: Vec<CategoricalColumn>,
    column_order: Vec<String>,
    absent_holiday: String,
    input_bounds: InputBounds,
    sample: Vec<NormalizedRecord>,
    row_count: usize,
}

impl SchemaReference {
    /// Build from the reference dataset, keeping [`DEFAULT_SAMPLE_ROWS`] sample rows.
    pub fn build(dataset: &DataBatch) -> Result<Self, SchemaBuildError> {
        Self::build_with_sample(dataset, DEFAULT_SAMPLE_ROWS)
    }

    pub fn build_with_sample(
        dataset: &DataBatch,
        sample_rows: usize,
    ) -> Result<Self, SchemaBuildError> {
        for required in columns::REFERENCE_REQUIRED {
            if !dataset.has_column(required) {
                return Err(SchemaBuildError::MissingColumn {
                    column: required.to_string(),
                });
            }
        }
        if dataset.rows.is_empty() {
            return Err(SchemaBuildError::EmptyDataset);
        }

        let normalizer = Normalizer::new();
        let records = dataset
            .rows
            .iter()
            .enumerate()
            .map(|(row, raw)| {
                normalizer
                    .normalize(raw)
                    .map_err(|source| SchemaBuildError::InvalidRow { row, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let categorical = columns::CATEGORICAL
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let observed = records.iter().map(|r| r.categorical()[i]);
                if *name == columns::HOLIDAY {
                    CategoricalColumn::from_observed(
                        name,
                        std::iter::once(ABSENT_HOLIDAY).chain(observed),
                    )
                } else {
                    CategoricalColumn::from_observed(name, observed)
                }
            })
            .collect();

        let rain_max = records.iter().map(|r| r.rain_1h).fold(0.0_f64, f64::max);
        let snow_max = records.iter().map(|r| r.snow_1h).fold(0.0_f64, f64::max);
        let input_bounds = InputBounds {
            rain_1h: Bounds::new(0.0, rain_max),
            snow_1h: Bounds::new(0.0, snow_max),
            ..InputBounds::default()
        };

        let schema = Self::assemble(
            categorical,
            input_bounds,
            records.iter().take(sample_rows).cloned().collect(),
            records.len(),
        );
        tracing::info!(
            rows = schema.row_count,
            width = schema.width(),
            "Built schema reference"
        );
        Ok(schema)
    }

    /// Build a synthetic schema directly from a categorical vocabulary.
    ///
    /// Every categorical column must be present; the absent-holiday label is
    /// always added to the holiday vocabulary.
    pub fn from_vocabulary<S: AsRef<str>>(
        vocabulary: &[(&str, Vec<S>)],
    ) -> Result<Self, SchemaBuildError> {
        let categorical = columns::CATEGORICAL
            .iter()
            .map(|name| {
                let (_, values) = vocabulary
                    .iter()
                    .find(|(column, _)| column == name)
                    .ok_or_else(|| SchemaBuildError::MissingColumn {
                        column: name.to_string(),
                    })?;
                let observed = values.iter().map(AsRef::as_ref);
                Ok(if *name == columns::HOLIDAY {
                    CategoricalColumn::from_observed(
                        name,
                        std::iter::once(ABSENT_HOLIDAY).chain(observed),
                    )
                } else {
                    CategoricalColumn::from_observed(name, observed)
                })
            })
            .collect::<Result<Vec<_>, SchemaBuildError>>()?;
        Ok(Self::assemble(
            categorical,
            InputBounds::default(),
            Vec::new(),
            0,
        ))
    }

    fn assemble(
        categorical: Vec<CategoricalColumn>,
        input_bounds: InputBounds,
        sample: Vec<NormalizedRecord>,
        row_count: usize,
    ) -> Self {
        let continuous: Vec<String> = columns::CONTINUOUS.iter().map(|c| c.to_string()).collect();
        let column_order = continuous
            .iter()
            .cloned()
            .chain(categorical.iter().flat_map(|group| {
                group.values.iter().map(|v| group.indicator_name(v))
            }))
            .collect();
        Self {
            continuous,
            categorical,
            column_order,
            absent_holiday: ABSENT_HOLIDAY.to_string(),
            input_bounds,
            sample,
            row_count,
        }
    }

    /// Every encoded column name, in predictor input order.
    pub fn full_column_order(&self) -> &[String] {
        &self.column_order
    }

    pub fn width(&self) -> usize {
        self.column_order.len()
    }

    pub fn continuous_columns(&self) -> &[String] {
        &self.continuous
    }

    pub fn categorical_columns(&self) -> &[CategoricalColumn] {
        &self.categorical
    }

    pub fn categorical(&self, name: &str) -> Option<&CategoricalColumn> {
        self.categorical.iter().find(|c| c.name == name)
    }

    pub fn absent_holiday(&self) -> &str {
        &self.absent_holiday
    }

    pub fn input_bounds(&self) -> InputBounds {
        self.input_bounds
    }

    /// Leading reference rows, normalized, as an example of the upload format.
    pub fn sample_rows(&self) -> &[NormalizedRecord] {
        &self.sample
    }

    /// Number of reference rows the schema was built from.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn form_options(&self) -> FormOptions {
        let first_seen = |name: &str| {
            self.categorical(name)
                .map(|c| c.first_seen.clone())
                .unwrap_or_default()
        };
        FormOptions {
            holidays: first_seen(columns::HOLIDAY),
            weather: first_seen(columns::WEATHER_MAIN),
            months: MONTHS.iter().map(|m| m.to_string()).collect(),
            weekdays: WEEKDAYS.iter().map(|d| d.to_string()).collect(),
            hours: calendar::hour_labels(),
            bounds: self.input_bounds,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

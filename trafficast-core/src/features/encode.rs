//! Schema alignment: one-hot encoding against the stored vocabulary.
//!
//! Column existence comes from the [`SchemaReference`] only, never from the
//! records being encoded, so a batch that happens to lack (or add) a category
//! still produces exactly the predictor's column layout.

use crate::data::schema::SchemaReference;
use crate::error::{NormalizationError, SchemaMismatchError};
use crate::features::normalize::NormalizedRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What to do with a categorical value absent from the reference vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
    /// Leave every indicator of that feature group at zero.
    #[default]
    ZeroFill,
    /// Fail the request.
    Reject,
}

impl std::fmt::Display for UnknownCategoryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroFill => write!(f, "zero_fill"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Dense row-major feature matrix in predictor column order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMatrix {
    columns: Vec<String>,
    data: Vec<f64>,
}

impl EncodedMatrix {
    /// Build from rows; `None` if any row length differs from the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Option<Self> {
        let width = columns.len();
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        Some(Self {
            columns,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// A matrix with the given columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            data: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        if self.columns.is_empty() {
            0
        } else {
            self.data.len() / self.columns.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        let width = self.width();
        self.data.get(index * width..(index + 1) * width)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks(self.width().max(1))
    }

    /// Value of a named column in a given row.
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.row(row).map(|r| r[col])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Verify this matrix matches the predictor's input contract.
    ///
    /// Width is always checked; column names are checked when the predictor
    /// publishes them.
    pub fn ensure_matches(
        &self,
        expected_width: usize,
        expected_names: Option<&[String]>,
    ) -> Result<(), SchemaMismatchError> {
        if self.width() != expected_width {
            return Err(SchemaMismatchError::Width {
                expected: expected_width,
                actual: self.width(),
            });
        }
        if let Some(names) = expected_names {
            if names.len() != self.width() {
                return Err(SchemaMismatchError::FeatureNameCount {
                    width: self.width(),
                    names: names.len(),
                });
            }
            if let Some((index, (expected, actual))) = names
                .iter()
                .zip(&self.columns)
                .enumerate()
                .find(|(_, (e, a))| e != a)
            {
                return Err(SchemaMismatchError::Column {
                    index,
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Rows per (field, value) that fell outside the reference vocabulary.
type UnknownTally = BTreeMap<(String, String), usize>;

/// Encodes normalized records into the schema's one-hot layout.
#[derive(Debug, Clone)]
pub struct Aligner {
    schema: Arc<SchemaReference>,
    group_offsets: Vec<usize>,
    policy: UnknownCategoryPolicy,
}

impl Aligner {
    pub fn new(schema: Arc<SchemaReference>, policy: UnknownCategoryPolicy) -> Self {
        let mut offset = schema.continuous_columns().len();
        let group_offsets = schema
            .categorical_columns()
            .iter()
            .map(|group| {
                let start = offset;
                offset += group.values.len();
                start
            })
            .collect();
        Self {
            schema,
            group_offsets,
            policy,
        }
    }

    pub fn schema(&self) -> &SchemaReference {
        &self.schema
    }

    pub fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }

    /// Encode `records` into an N-row matrix, row `i` corresponding to `records[i]`.
    ///
    /// Zero-filled unknown categories are reported once per field and value
    /// with the number of rows affected.
    pub fn align(&self, records: &[NormalizedRecord]) -> Result<EncodedMatrix, NormalizationError> {
        let (matrix, unknown) = self.encode(records)?;
        for ((field, value), rows) in &unknown {
            tracing::warn!(
                field = %field,
                value = %value,
                rows,
                "Unknown category encoded as all-zero indicators"
            );
        }
        tracing::debug!(
            rows = matrix.row_count(),
            width = matrix.width(),
            "Aligned records to schema"
        );
        Ok(matrix)
    }

    fn encode(
        &self,
        records: &[NormalizedRecord],
    ) -> Result<(EncodedMatrix, UnknownTally), NormalizationError> {
        let width = self.schema.width();
        let mut data = vec![0.0; records.len() * width];
        let mut unknown = UnknownTally::new();

        for (row, (record, out)) in records.iter().zip(data.chunks_mut(width.max(1))).enumerate() {
            let continuous = record.continuous();
            out[..continuous.len()].copy_from_slice(&continuous);

            for ((group, offset), value) in self
                .schema
                .categorical_columns()
                .iter()
                .zip(&self.group_offsets)
                .zip(record.categorical())
            {
                match group.index_of(value) {
                    Some(index) => out[offset + index] = 1.0,
                    None => match self.policy {
                        UnknownCategoryPolicy::ZeroFill => {
                            *unknown
                                .entry((group.name.clone(), value.to_string()))
                                .or_default() += 1;
                        }
                        UnknownCategoryPolicy::Reject => {
                            let err = NormalizationError::UnknownCategory {
                                field: group.name.clone(),
                                value: value.to_string(),
                            };
                            return Err(if records.len() > 1 { err.at_row(row) } else { err });
                        }
                    },
                }
            }
        }

        let matrix = EncodedMatrix {
            columns: self.schema.full_column_order().to_vec(),
            data,
        };
        Ok((matrix, unknown))
    }
}

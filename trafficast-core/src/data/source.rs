//! Tabular data sources: the reference dataset and batch uploads.

use crate::data::record::RawRecord;
use crate::error::DataError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// A batch of raw rows with the header they were read under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataBatch {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl DataBatch {
    pub fn new(columns: Vec<String>, rows: Vec<RawRecord>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }
}

/// Information about a data source for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceInfo {
    pub source_type: String,
    pub location: String,
    pub accessed_at: chrono::DateTime<chrono::Utc>,
    pub row_count: Option<usize>,
}

/// CSV file data source. Empty cells load as `null`.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: u8,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
        }
    }

    /// Load data from this source, optionally limiting the number of rows.
    pub fn load(&self, limit: Option<usize>) -> Result<DataBatch, DataError> {
        let file = std::fs::File::open(&self.path)?;
        let batch = read_csv(file, self.delimiter, limit)?;
        tracing::debug!(
            path = %self.path.display(),
            rows = batch.row_count(),
            columns = batch.column_count(),
            "Loaded CSV"
        );
        Ok(batch)
    }

    pub fn source_info(&self) -> DataSourceInfo {
        DataSourceInfo {
            source_type: "csv".to_string(),
            location: self.path.display().to_string(),
            accessed_at: chrono::Utc::now(),
            row_count: None,
        }
    }
}

/// Read CSV from any reader into a [`DataBatch`].
pub fn read_csv<R: Read>(
    reader: R,
    delimiter: u8,
    limit: Option<usize>,
) -> Result<DataBatch, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        if limit.is_some_and(|max| rows.len() >= max) {
            break;
        }
        let record = record?;
        if record.len() != columns.len() {
            return Err(DataError::MalformedRow {
                row: i,
                message: format!("expected {} fields, found {}", columns.len(), record.len()),
            });
        }
        let row = columns
            .iter()
            .zip(record.iter())
            .map(|(col, cell)| {
                let value = if cell.is_empty() {
                    Value::Null
                } else {
                    Value::String(cell.to_string())
                };
                (col.clone(), value)
            })
            .collect::<RawRecord>();
        rows.push(row);
    }

    Ok(DataBatch { columns, rows })
}

/// Write a header and string rows as CSV.
pub fn write_csv<W: Write>(
    writer: W,
    header: &[String],
    rows: &[Vec<String>],
) -> Result<(), DataError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write CSV to a file path, creating parent directories as needed.
pub fn write_csv_file(
    path: &Path,
    header: &[String],
    rows: &[Vec<String>],
) -> Result<(), DataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_csv(file, header, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::columns;

    const SAMPLE: &str = "\
holiday,temp,rain_1h,snow_1h,clouds_all,weather_main,date_time,traffic_volume
,288.28,0.0,0.0,40,Clouds,2012-10-02 09:00:00,5545
Columbus Day,289.36,0.0,0.0,75,Clouds,2012-10-08 10:00:00,4516
";

    #[test]
    fn test_data_batch_empty() {
        let batch = DataBatch::empty();
        assert_eq!(batch.row_count(), 0);
        assert_eq!(batch.column_count(), 0);
    }

    #[test]
    fn test_read_csv() {
        let batch = read_csv(SAMPLE.as_bytes(), b',', None).unwrap();
        assert_eq!(batch.column_count(), 8);
        assert_eq!(batch.row_count(), 2);
        assert!(batch.has_column(columns::DATE_TIME));
        assert!(!batch.rows[0].contains(columns::HOLIDAY));
        assert_eq!(
            batch.rows[1].get(columns::HOLIDAY),
            Some(&Value::from("Columbus Day"))
        );
    }

    #[test]
    fn test_read_csv_limit() {
        let batch = read_csv(SAMPLE.as_bytes(), b',', Some(1)).unwrap();
        assert_eq!(batch.row_count(), 1);
    }

    #[test]
    fn test_ragged_csv_is_rejected() {
        let text = "a,b\n1,2\n3\n";
        assert!(read_csv(text.as_bytes(), b',', None).is_err());
    }

    #[test]
    fn test_csv_source_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let header = vec!["a".to_string(), "b".to_string()];
        let rows = vec![vec!["1".to_string(), "x".to_string()]];
        write_csv_file(&path, &header, &rows).unwrap();

        let src = CsvSource::new(&path);
        let batch = src.load(None).unwrap();
        assert_eq!(batch.columns, header);
        assert_eq!(batch.rows[0].get("b"), Some(&Value::from("x")));
        assert_eq!(src.source_info().source_type, "csv");
    }
}

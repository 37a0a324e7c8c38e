//! Data layer: raw records, tabular sources and the schema reference.

pub mod record;
pub mod schema;
pub mod source;

pub use record::{RawRecord, columns};
pub use schema::{CategoricalColumn, FormOptions, SchemaReference};
pub use source::{CsvSource, DataBatch, DataSourceInfo};

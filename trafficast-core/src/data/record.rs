//! Raw input records and the column names shared by every stage.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Column names of the reference dataset and of batch uploads.
pub mod columns {
    pub const HOLIDAY: &str = "holiday";
    pub const TEMP: &str = "temp";
    pub const RAIN_1H: &str = "rain_1h";
    pub const SNOW_1H: &str = "snow_1h";
    pub const CLOUDS_ALL: &str = "clouds_all";
    pub const WEATHER_MAIN: &str = "weather_main";
    pub const DATE_TIME: &str = "date_time";
    pub const MONTH: &str = "month";
    pub const WEEKDAY: &str = "weekday";
    pub const HOUR: &str = "hour";
    pub const TARGET: &str = "traffic_volume";

    /// Continuous features, in encoded column order.
    pub const CONTINUOUS: [&str; 4] = [TEMP, RAIN_1H, SNOW_1H, CLOUDS_ALL];

    /// Categorical features, in encoded group order.
    pub const CATEGORICAL: [&str; 5] = [HOLIDAY, WEATHER_MAIN, MONTH, WEEKDAY, HOUR];

    /// Columns the reference dataset must provide.
    pub const REFERENCE_REQUIRED: [&str; 8] = [
        HOLIDAY,
        TEMP,
        RAIN_1H,
        SNOW_1H,
        CLOUDS_ALL,
        WEATHER_MAIN,
        DATE_TIME,
        TARGET,
    ];
}

/// A single raw input row: feature name to loosely typed value.
///
/// Values arrive as strings from CSV files and as numbers or strings from
/// form entry; the normalizer resolves both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    /// Returns the value for `field`, treating JSON `null` as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Render a raw value the way it would appear in a CSV cell.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! Feature normalization: raw records into the canonical engineered feature set.
//!
//! A [`NormalizedRecord`] always carries the four continuous features and the
//! five categorical labels (holiday, weather, month, weekday, hour) in the
//! exact textual form used by the schema reference. Hours are labels, not
//! numbers, so they one-hot encode instead of being treated as ordinal.
//!
//! Numeric ranges are an upstream contract: [`Normalizer`] only rejects
//! values that are missing, unparseable or non-finite. Form entry applies
//! [`InputBounds`] on top.

use crate::data::record::{RawRecord, columns, value_to_text};
use crate::error::NormalizationError;
use crate::features::calendar::{
    self, CalendarParts, canonical_hour, canonical_month, canonical_weekday,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Holiday label used when a record carries no holiday.
pub const ABSENT_HOLIDAY: &str = "None";

/// A record reduced to exactly the fields the encoder consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub holiday: String,
    pub temp: f64,
    pub rain_1h: f64,
    pub snow_1h: f64,
    pub clouds_all: f64,
    pub weather_main: String,
    pub month: String,
    pub weekday: String,
    pub hour: String,
}

impl NormalizedRecord {
    /// Continuous values in [`columns::CONTINUOUS`] order.
    pub fn continuous(&self) -> [f64; 4] {
        [self.temp, self.rain_1h, self.snow_1h, self.clouds_all]
    }

    /// Categorical labels in [`columns::CATEGORICAL`] order.
    pub fn categorical(&self) -> [&str; 5] {
        [
            &self.holiday,
            &self.weather_main,
            &self.month,
            &self.weekday,
            &self.hour,
        ]
    }

    pub fn categorical_value(&self, column: &str) -> Option<&str> {
        columns::CATEGORICAL
            .iter()
            .position(|c| *c == column)
            .map(|i| self.categorical()[i])
    }
}

/// Converts raw records into [`NormalizedRecord`]s.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    default_instant: Option<NaiveDateTime>,
}

impl Normalizer {
    /// A normalizer that requires every record to carry a timestamp or
    /// explicit month, weekday and hour fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// A normalizer that fills missing calendar fields from `instant`.
    /// Used for single form entries where "now" is the implicit context.
    pub fn with_default_instant(instant: NaiveDateTime) -> Self {
        Self {
            default_instant: Some(instant),
        }
    }

    pub fn normalize(&self, raw: &RawRecord) -> Result<NormalizedRecord, NormalizationError> {
        let calendar = self.resolve_calendar(raw)?;
        Ok(NormalizedRecord {
            holiday: holiday_label(raw),
            temp: number_field(raw, columns::TEMP)?,
            rain_1h: number_field(raw, columns::RAIN_1H)?,
            snow_1h: number_field(raw, columns::SNOW_1H)?,
            clouds_all: number_field(raw, columns::CLOUDS_ALL)?,
            weather_main: text_field(raw, columns::WEATHER_MAIN)?,
            month: calendar.month,
            weekday: calendar.weekday,
            hour: calendar.hour,
        })
    }

    /// Normalize a batch atomically: the first failing row rejects the whole batch.
    pub fn normalize_batch(
        &self,
        raws: &[RawRecord],
    ) -> Result<Vec<NormalizedRecord>, NormalizationError> {
        if raws.is_empty() {
            return Err(NormalizationError::EmptyBatch);
        }
        raws.iter()
            .enumerate()
            .map(|(i, raw)| self.normalize(raw).map_err(|e| e.at_row(i)))
            .collect()
    }

    fn resolve_calendar(&self, raw: &RawRecord) -> Result<CalendarParts, NormalizationError> {
        let explicit_month = optional_label(raw, columns::MONTH, |t| {
            canonical_month(t).map(str::to_string)
        })?;
        let explicit_weekday = optional_label(raw, columns::WEEKDAY, |t| {
            canonical_weekday(t).map(str::to_string)
        })?;
        let explicit_hour = optional_label(raw, columns::HOUR, canonical_hour)?;

        if let Some(value) = raw.get(columns::DATE_TIME) {
            let text = value_to_text(value);
            let dt = calendar::parse_timestamp(&text).ok_or_else(|| {
                NormalizationError::invalid(columns::DATE_TIME, &text, "unrecognised timestamp")
            })?;
            let derived = CalendarParts::from_datetime(&dt);
            check_consistent(columns::MONTH, explicit_month, &derived.month)?;
            check_consistent(columns::WEEKDAY, explicit_weekday, &derived.weekday)?;
            check_consistent(columns::HOUR, explicit_hour, &derived.hour)?;
            return Ok(derived);
        }

        let fallback = self.default_instant.as_ref().map(CalendarParts::from_datetime);
        let month = explicit_month
            .or_else(|| fallback.as_ref().map(|p| p.month.clone()))
            .ok_or_else(|| NormalizationError::missing(columns::MONTH))?;
        let weekday = explicit_weekday
            .or_else(|| fallback.as_ref().map(|p| p.weekday.clone()))
            .ok_or_else(|| NormalizationError::missing(columns::WEEKDAY))?;
        let hour = explicit_hour
            .or_else(|| fallback.as_ref().map(|p| p.hour.clone()))
            .ok_or_else(|| NormalizationError::missing(columns::HOUR))?;

        Ok(CalendarParts {
            month,
            weekday,
            hour,
        })
    }
}

fn holiday_label(raw: &RawRecord) -> String {
    let text = raw
        .get(columns::HOLIDAY)
        .map(value_to_text)
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("none") || text.eq_ignore_ascii_case("nan") {
        ABSENT_HOLIDAY.to_string()
    } else {
        text.to_string()
    }
}

fn number_field(raw: &RawRecord, field: &str) -> Result<f64, NormalizationError> {
    let value = raw
        .get(field)
        .ok_or_else(|| NormalizationError::missing(field))?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => {
            return Err(NormalizationError::missing(field));
        }
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(NormalizationError::invalid(
            field,
            value_to_text(value),
            "value is not finite",
        )),
        None => Err(NormalizationError::invalid(
            field,
            value_to_text(value),
            "expected a number",
        )),
    }
}

fn text_field(raw: &RawRecord, field: &str) -> Result<String, NormalizationError> {
    let text = raw
        .get(field)
        .map(value_to_text)
        .ok_or_else(|| NormalizationError::missing(field))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(NormalizationError::missing(field));
    }
    Ok(text.to_string())
}

fn optional_label(
    raw: &RawRecord,
    field: &str,
    canonical: impl Fn(&str) -> Option<String>,
) -> Result<Option<String>, NormalizationError> {
    let Some(value) = raw.get(field) else {
        return Ok(None);
    };
    let text = value_to_text(value);
    if text.trim().is_empty() {
        return Ok(None);
    }
    canonical(&text)
        .map(Some)
        .ok_or_else(|| NormalizationError::invalid(field, &text, "not a recognised label"))
}

fn check_consistent(
    field: &str,
    given: Option<String>,
    derived: &str,
) -> Result<(), NormalizationError> {
    match given {
        Some(given) if given != derived => Err(NormalizationError::InconsistentTimestamp {
            field: field.to_string(),
            given,
            derived: derived.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Closed numeric interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Accepted ranges for form-entered continuous features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputBounds {
    pub temp: Bounds,
    pub rain_1h: Bounds,
    pub snow_1h: Bounds,
    pub clouds_all: Bounds,
}

impl Default for InputBounds {
    fn default() -> Self {
        Self {
            temp: Bounds::new(245.0, 315.0),
            rain_1h: Bounds::new(0.0, f64::MAX),
            snow_1h: Bounds::new(0.0, f64::MAX),
            clouds_all: Bounds::new(0.0, 100.0),
        }
    }
}

impl InputBounds {
    pub fn check(&self, record: &NormalizedRecord) -> Result<(), NormalizationError> {
        let checks = [
            (columns::TEMP, record.temp, self.temp),
            (columns::RAIN_1H, record.rain_1h, self.rain_1h),
            (columns::SNOW_1H, record.snow_1h, self.snow_1h),
            (columns::CLOUDS_ALL, record.clouds_all, self.clouds_all),
        ];
        for (field, value, bounds) in checks {
            if !bounds.contains(value) {
                return Err(NormalizationError::OutOfRange {
                    field: field.to_string(),
                    value,
                    min: bounds.min,
                    max: bounds.max,
                });
            }
        }
        Ok(())
    }
}

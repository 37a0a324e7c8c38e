//! Calendar decomposition of timestamps into categorical labels.

use chrono::{DateTime, Datelike, Month, NaiveDate, NaiveDateTime, Timelike, Weekday};

/// Months in calendar order, as full English names.
pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Weekdays starting Monday, as full English names.
pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const TIMESTAMP_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts, read as midnight.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Month name, weekday name and hour label derived from one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarParts {
    pub month: String,
    pub weekday: String,
    pub hour: String,
}

impl CalendarParts {
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self {
            month: MONTHS[dt.month0() as usize].to_string(),
            weekday: weekday_name(dt.weekday()).to_string(),
            hour: dt.hour().to_string(),
        }
    }
}

/// Parse a timestamp in any of the accepted layouts. RFC 3339 inputs keep
/// their wall-clock time; the offset is discarded. A bare date is hour 0.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS.iter().find_map(|fmt| {
                NaiveDate::parse_from_str(text, fmt)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
        })
}

pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAYS[day.num_days_from_monday() as usize]
}

/// Canonical month name for a full name, abbreviation (any case) or 1-12.
pub fn canonical_month(text: &str) -> Option<&'static str> {
    let text = text.trim();
    if let Ok(n) = text.parse::<usize>() {
        return (1..=12).contains(&n).then(|| MONTHS[n - 1]);
    }
    text.parse::<Month>()
        .ok()
        .map(|m| MONTHS[m.number_from_month() as usize - 1])
}

/// Canonical weekday name for a full name or abbreviation (any case).
pub fn canonical_weekday(text: &str) -> Option<&'static str> {
    text.trim().parse::<Weekday>().ok().map(weekday_name)
}

/// Canonical hour label ("0".."23") for an integer-like text such as "5" or "05".
pub fn canonical_hour(text: &str) -> Option<String> {
    let text = text.trim();
    let hour = match text.parse::<u32>() {
        Ok(h) => h,
        Err(_) => {
            let f = text.parse::<f64>().ok()?;
            if f.fract() != 0.0 || f < 0.0 {
                return None;
            }
            f as u32
        }
    };
    (hour < 24).then(|| hour.to_string())
}

/// All hour labels in clock order.
pub fn hour_labels() -> Vec<String> {
    (0..24).map(|h| h.to_string()).collect()
}

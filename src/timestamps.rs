//! Timestamp normalization
//!
//! Every instant that reaches the store is UTC with the zone stripped
//! (`NaiveDateTime`). Local civil time is only used to compute display
//! ranges such as "today", and those ranges are handed back in UTC.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Storage format. Fixed-width so SQLite text comparison orders instants.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Unix values above this are milliseconds rather than seconds.
const MILLIS_THRESHOLD: f64 = 1e12;

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Current time in UTC.
pub fn utc_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Convert an offset-carrying instant to naive UTC.
pub fn to_utc<Tz: TimeZone>(dt: &DateTime<Tz>) -> NaiveDateTime {
    dt.with_timezone(&Utc).naive_utc()
}

/// Normalize a raw JSON timestamp value.
///
/// Numbers are Unix time (seconds, or milliseconds above 10^12), strings are
/// ISO 8601-ish. Anything unparseable becomes "now" so one bad value never
/// aborts a batch.
pub fn normalize(raw: &Value) -> NaiveDateTime {
    let parsed = match raw {
        Value::Number(n) => n.as_f64().and_then(from_unix),
        Value::String(s) => parse_str(s),
        _ => None,
    };
    parsed.unwrap_or_else(utc_now)
}

/// Unix seconds (or milliseconds) to UTC, rounded to the microsecond.
pub fn from_unix(value: f64) -> Option<NaiveDateTime> {
    if !value.is_finite() {
        return None;
    }
    let secs = if value > MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    let micros = (secs * 1e6).round() as i64;
    let whole = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1000) as u32;
    DateTime::<Utc>::from_timestamp(whole, nanos).map(|dt| dt.naive_utc())
}

/// Parse a timestamp string into naive UTC.
///
/// A trailing `Z` means `+00:00`, fractional digits past six are dropped
/// (not rounded), and a missing offset means the value is already UTC.
pub fn parse_str(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let zoned = match trimmed.strip_suffix('Z').or_else(|| trimmed.strip_suffix('z')) {
        Some(rest) => format!("{rest}+00:00"),
        None => trimmed.to_string(),
    };
    let text = truncate_fraction(&zoned);

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&text, format) {
            return Some(to_utc(&dt));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Keep at most six fractional-second digits.
fn truncate_fraction(text: &str) -> String {
    let Some(dot) = text.find('.') else {
        return text.to_string();
    };
    let digits = text[dot + 1..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .count();
    if digits <= 6 {
        return text.to_string();
    }
    format!("{}{}", &text[..dot + 7], &text[dot + 1 + digits..])
}

/// Render for storage.
pub fn to_storage(dt: &NaiveDateTime) -> String {
    dt.format(STORAGE_FORMAT).to_string()
}

/// Read back a stored value.
pub fn from_storage(text: &str) -> Option<NaiveDateTime> {
    parse_str(text)
}

/// UTC to local civil time, for display only. Never store the result.
pub fn utc_to_local(dt: NaiveDateTime) -> NaiveDateTime {
    Utc.from_utc_datetime(&dt).with_timezone(&Local).naive_local()
}

/// Local civil time to UTC, for building query bounds.
///
/// Ambiguous local times (clocks going back) take the earlier instant;
/// nonexistent ones (clocks going forward) are pushed past the gap.
pub fn local_to_utc(dt: NaiveDateTime) -> NaiveDateTime {
    Local
        .from_local_datetime(&dt)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(dt + Duration::hours(1))).earliest())
        .map(|local| local.naive_utc())
        .unwrap_or(dt)
}

/// Half-open UTC interval covering one local calendar day.
pub fn local_day_utc_range(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_time(chrono::NaiveTime::MIN);
    let end = start + Duration::days(1);
    (local_to_utc(start), local_to_utc(end))
}

/// Half-open UTC interval covering "today" in local time.
pub fn today_utc_range() -> (NaiveDateTime, NaiveDateTime) {
    local_day_utc_range(Local::now().date_naive())
}

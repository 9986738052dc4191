//! Normalisation of raw DICOM text values

use chrono::{NaiveDate, NaiveTime};

/// Renders a person name as `"Family, Given"`
///
/// Only the first value and the alphabetic component group are used.
/// Middle names follow the given name; prefix and suffix are dropped.
pub fn format_person_name(raw: &str) -> String {
    let first_value = raw.split('\\').next().unwrap_or_default();
    let alphabetic = first_value.split('=').next().unwrap_or_default();
    let mut parts = alphabetic.split('^').map(str::trim);

    let family = parts.next().unwrap_or_default();
    let given: Vec<&str> = parts.take(2).filter(|p| !p.is_empty()).collect();

    match (family.is_empty(), given.is_empty()) {
        (false, false) => format!("{}, {}", family, given.join(" ")),
        (false, true) => family.to_string(),
        (true, false) => given.join(" "),
        (true, true) => String::new(),
    }
}

/// Parses a DA value (`YYYYMMDD`, or already `YYYY-MM-DD`) into an ISO date
pub fn parse_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y.%m.%d"))
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// ISO date when parseable, the raw text otherwise
pub fn normalize_date(raw: &str) -> String {
    parse_date(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Parses a TM value (`HH`, `HHMM`, `HHMMSS[.F]` or `HH:MM:SS`) into `HH:MM:SS`
pub fn parse_time(raw: &str) -> Option<String> {
    let whole = raw.trim().split('.').next().unwrap_or_default().replace(':', "");
    if whole.is_empty() || whole.len() > 6 || whole.len() % 2 != 0 {
        return None;
    }
    let padded = format!("{:0<6}", whole);
    NaiveTime::parse_from_str(&padded, "%H%M%S")
        .ok()
        .map(|time| time.format("%H:%M:%S").to_string())
}

/// `HH:MM:SS` when parseable, the raw text otherwise
pub fn normalize_time(raw: &str) -> String {
    parse_time(raw).unwrap_or_else(|| raw.trim().to_string())
}

/// Parses the first component of a possibly multi-valued numeric string
pub fn parse_first<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.split('\\').next().and_then(|s| s.trim().parse().ok())
}

//! Publish-date resolution over loosely structured sidecar metadata.
//!
//! Sidecars in the wild carry dates under many key names and in many shapes:
//! epoch seconds, epoch milliseconds, compact `YYYYMMDD` strings, RFC 3339
//! timestamps, or `2023/4/5 10:00` style free text. The resolver scans the
//! document for a known date key, tries each representation in turn, and
//! normalizes the first hit to a millisecond UTC epoch.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// Normalized forms of key names that may hold a publish date.
const PUBLISH_DATE_KEYS: &[&str] = &[
    "created",
    "createdat",
    "date",
    "postdate",
    "posted",
    "postedat",
    "publishdate",
    "published",
    "publishedat",
    "publisheddate",
    "released",
    "releasedat",
    "releasedate",
    "release",
    "uploaddate",
    "uploadedat",
];

const MILLIS_EPOCH_FLOOR: f64 = 1_000_000_000_000.0;
const SECONDS_EPOCH_FLOOR: f64 = 1_000_000_000.0;

/// Find a publish date in the document: first among the top-level fields,
/// then one level down inside object-valued fields. Arrays are not entered.
/// Field order follows the parsed map's key order (sorted by `serde_json`),
/// so the result is deterministic for a given document.
pub fn resolve_published_at(doc: &Map<String, Value>) -> Option<i64> {
    if let Some(millis) = match_record(doc) {
        return Some(millis);
    }

    for value in doc.values() {
        if let Value::Object(nested) = value {
            if let Some(millis) = match_record(nested) {
                return Some(millis);
            }
        }
    }

    None
}

fn match_record(record: &Map<String, Value>) -> Option<i64> {
    for (key, value) in record {
        if !PUBLISH_DATE_KEYS.contains(&normalize_key(key).as_str()) {
            continue;
        }
        if let Some(millis) = parse_date_value(value) {
            return Some(millis);
        }
    }
    None
}

/// Lowercase and strip everything but ASCII alphanumerics, so that
/// "Upload_Date" and "uploadDate" match the same synonym entry.
fn normalize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

fn parse_date_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => normalize_timestamp(n.as_f64()?),
        Value::String(s) => parse_date_string(s.trim()),
        _ => None,
    }
}

fn parse_date_string(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }

    if text.chars().all(|c| c.is_ascii_digit()) {
        // Exactly eight digits reads as a compact calendar date, never as an
        // epoch, even when the calendar parts turn out to be invalid.
        if text.len() == 8 {
            let year = text[0..4].parse().ok()?;
            let month = text[4..6].parse().ok()?;
            let day = text[6..8].parse().ok()?;
            return build_utc(year, month, day, 0, 0, 0);
        }
        return normalize_timestamp(text.parse().ok()?);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.timestamp_millis());
    }

    parse_loose(text)
}

/// Fallback for `YYYY-MM-DD`-shaped strings with `-`, `/` or `.` separators
/// and an optional `HH[:MM[:SS]]` tail, all read as UTC.
fn parse_loose(text: &str) -> Option<i64> {
    let (date_part, time_part) = match text.find([' ', 'T']) {
        Some(at) => (&text[..at], Some(&text[at + 1..])),
        None => (text, None),
    };

    let mut fields = date_part.split(['-', '/', '.']);
    let year = int_field(fields.next()?, 4, 4)?;
    let month = int_field(fields.next()?, 1, 2)?;
    let day = int_field(fields.next()?, 1, 2)?;
    if fields.next().is_some() {
        return None;
    }

    let (hour, minute, second) = match time_part {
        Some(time) => {
            let mut parts = time.split(':');
            let hour = int_field(parts.next()?, 1, 2)?;
            let minute = parts.next().map(|p| int_field(p, 1, 2)).unwrap_or(Some(0))?;
            let second = parts.next().map(|p| int_field(p, 1, 2)).unwrap_or(Some(0))?;
            if parts.next().is_some() {
                return None;
            }
            (hour, minute, second)
        }
        None => (0, 0, 0),
    };

    build_utc(year as i32, month, day, hour, minute, second)
}

fn int_field(text: &str, min_len: usize, max_len: usize) -> Option<u32> {
    if text.len() < min_len || text.len() > max_len {
        return None;
    }
    if !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn build_utc(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<i64> {
    if year < 1000 || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .map(|dt| dt.timestamp_millis())
}

/// Disambiguate a bare number by magnitude: above the millisecond floor it
/// already is milliseconds, above the second floor it is seconds, anything
/// smaller is too ambiguous to trust.
fn normalize_timestamp(value: f64) -> Option<i64> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    if value > MILLIS_EPOCH_FLOOR {
        return Some(value.round() as i64);
    }
    if value > SECONDS_EPOCH_FLOOR {
        return Some((value * 1000.0).round() as i64);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const APR_5_2023_MS: i64 = 1_680_652_800_000;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn iso_date_string_resolves_to_utc_midnight() {
        let meta = doc(json!({ "released": "2023-04-05" }));
        assert_eq!(resolve_published_at(&meta), Some(APR_5_2023_MS));
    }

    #[test]
    fn compact_eight_digit_date() {
        let meta = doc(json!({ "uploadDate": "20230405" }));
        assert_eq!(resolve_published_at(&meta), Some(APR_5_2023_MS));
    }

    #[test]
    fn numeric_seconds_and_millis_agree() {
        let seconds = doc(json!({ "uploadDate": 1_680_652_800_i64 }));
        let millis = doc(json!({ "uploadDate": 1_680_652_800_000_i64 }));
        assert_eq!(resolve_published_at(&seconds), Some(APR_5_2023_MS));
        assert_eq!(resolve_published_at(&millis), Some(APR_5_2023_MS));
    }

    #[test]
    fn small_numbers_are_rejected() {
        let meta = doc(json!({ "date": 20230405 }));
        assert_eq!(resolve_published_at(&meta), None);
    }

    #[test]
    fn rfc3339_timestamp() {
        let meta = doc(json!({ "published_at": "2023-04-05T00:00:00Z" }));
        assert_eq!(resolve_published_at(&meta), Some(APR_5_2023_MS));
    }

    #[test]
    fn loose_separators_and_time_tail() {
        let meta = doc(json!({ "post_date": "2023/4/5 6:07:08" }));
        let expected = Utc
            .with_ymd_and_hms(2023, 4, 5, 6, 7, 8)
            .unwrap()
            .timestamp_millis();
        assert_eq!(resolve_published_at(&meta), Some(expected));

        let dotted = doc(json!({ "date": "2023.04.05" }));
        assert_eq!(resolve_published_at(&dotted), Some(APR_5_2023_MS));
    }

    #[test]
    fn key_normalization_matches_variants() {
        for key in ["Upload_Date", "uploadDate", "UPLOADDATE", "upload-date"] {
            let meta = doc(json!({ key: "2023-04-05" }));
            assert_eq!(resolve_published_at(&meta), Some(APR_5_2023_MS), "{key}");
        }
    }

    #[test]
    fn nested_objects_are_searched_one_level_deep() {
        let meta = doc(json!({
            "title": "t",
            "source": { "released": "2023-04-05" }
        }));
        assert_eq!(resolve_published_at(&meta), Some(APR_5_2023_MS));

        let too_deep = doc(json!({
            "source": { "inner": { "released": "2023-04-05" } }
        }));
        assert_eq!(resolve_published_at(&too_deep), None);
    }

    #[test]
    fn arrays_are_not_entered() {
        let meta = doc(json!({ "entries": [{ "released": "2023-04-05" }] }));
        assert_eq!(resolve_published_at(&meta), None);
    }

    #[test]
    fn top_level_match_wins_over_nested() {
        let meta = doc(json!({
            "released": "2024-01-01",
            "source": { "released": "2023-04-05" }
        }));
        let expected = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(resolve_published_at(&meta), Some(expected));
    }

    #[test]
    fn out_of_range_calendar_parts_are_rejected() {
        assert_eq!(resolve_published_at(&doc(json!({ "date": "0999-01-01" }))), None);
        assert_eq!(resolve_published_at(&doc(json!({ "date": "2023-13-01" }))), None);
        assert_eq!(resolve_published_at(&doc(json!({ "date": "2023-02-30" }))), None);
        assert_eq!(resolve_published_at(&doc(json!({ "date": "20231301" }))), None);
    }

    #[test]
    fn unmatched_keys_and_blank_values_yield_none() {
        assert_eq!(resolve_published_at(&doc(json!({ "title": "2023-04-05" }))), None);
        assert_eq!(resolve_published_at(&doc(json!({ "date": "  " }))), None);
        assert_eq!(resolve_published_at(&doc(json!({ "date": true }))), None);
    }
}

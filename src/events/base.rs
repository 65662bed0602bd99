use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::SourceError;
use crate::http::{backend_message, ApiResponse};
use crate::models::FREE_PRICE;
use crate::utils;

static NON_NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9.]").expect("valid price regex"));

pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strips surrounding quote characters some payloads wrap titles in.
pub fn clean_title(raw: &str) -> String {
    let unquoted = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”'));
    clean_text(unquoted)
}

/// Rejects non-2xx replies and bodies carrying `success: false`.
pub fn ensure_usable(source: &str, response: &ApiResponse) -> Result<(), SourceError> {
    if !response.is_ok() {
        return Err(SourceError::Status {
            origin: source.to_string(),
            status: response.status.as_u16(),
        });
    }
    if response.success_flag() == Some(false) {
        return Err(SourceError::Unsuccessful {
            origin: source.to_string(),
            message: backend_message(&response.body).unwrap_or_default(),
        });
    }
    Ok(())
}

pub fn object_at<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|inner| inner.is_object())
}

fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// First candidate field holding a non-empty string or number.
pub fn first_text(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(as_text)
}

pub fn numeric_id(record: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(|value| match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
}

/// Walks the candidate price fields in priority order. Zero-valued, empty
/// and missing candidates count as "no price"; if none remain the event is
/// free.
pub fn normalize_price(record: &Value, candidates: &[&str]) -> String {
    candidates
        .iter()
        .filter_map(|key| record.get(*key))
        .filter_map(as_text)
        .map(|text| {
            NON_NUMERIC_RE
                .replace_all(&text, "")
                .trim_matches('.')
                .to_string()
        })
        .find(|digits| digits.parse::<f64>().map(|v| v > 0.0).unwrap_or(false))
        .unwrap_or_else(|| FREE_PRICE.to_string())
}

/// Relative image paths are served from the upload directory.
pub fn rebase_image(upload_base: &str, raw: Option<String>) -> String {
    match raw {
        Some(path) if utils::is_absolute_url(&path) => path,
        Some(path) => utils::join_url(upload_base, &path),
        None => String::new(),
    }
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Renders backend dates for display; unrecognised formats pass through.
pub fn display_date(start: Option<&str>, end: Option<&str>) -> String {
    let Some(start_raw) = start.map(str::trim).filter(|s| !s.is_empty()) else {
        return String::new();
    };
    let Some(start_date) = parse_date(start_raw) else {
        return start_raw.to_string();
    };
    let full = |date: NaiveDate| date.format("%d %B %Y").to_string();

    match end.and_then(parse_date) {
        Some(end_date) if end_date > start_date => {
            if start_date.year() == end_date.year() && start_date.month() == end_date.month() {
                format!("{} - {}", start_date.format("%d"), full(end_date))
            } else {
                format!("{} - {}", full(start_date), full(end_date))
            }
        }
        _ => full(start_date),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CANDIDATES: &[&str] = &["price", "fees"];

    #[test]
    fn zero_like_prices_are_free() {
        for record in [
            json!({"price": "0"}),
            json!({"price": "00"}),
            json!({"price": ""}),
            json!({"price": null}),
            json!({}),
            json!({"price": 0}),
            json!({"price": "Free"}),
        ] {
            assert_eq!(normalize_price(&record, CANDIDATES), "FREE", "{record}");
        }
    }

    #[test]
    fn currency_symbols_and_separators_are_stripped() {
        assert_eq!(normalize_price(&json!({"price": "₹500"}), CANDIDATES), "500");
        assert_eq!(normalize_price(&json!({"price": " ₹ 2,500 "}), CANDIDATES), "2500");
        assert_eq!(normalize_price(&json!({"price": 1200}), CANDIDATES), "1200");
    }

    #[test]
    fn later_candidates_fill_in_for_missing_prices() {
        let record = json!({"price": "0", "fees": "Rs. 750"});
        assert_eq!(normalize_price(&record, CANDIDATES), "750");
    }

    #[test]
    fn titles_lose_wrapping_quotes() {
        assert_eq!(clean_title("\"Forensic Conclave 2025\""), "Forensic Conclave 2025");
        assert_eq!(clean_title("  'Cyber   Summit'  "), "Cyber Summit");
        assert_eq!(clean_title("Plain"), "Plain");
    }

    #[test]
    fn images_are_rebased_only_when_relative() {
        let base = "https://api.test/uploads";
        assert_eq!(
            rebase_image(base, Some("events/banner.jpg".to_string())),
            "https://api.test/uploads/events/banner.jpg"
        );
        assert_eq!(
            rebase_image(base, Some("https://cdn.test/a.png".to_string())),
            "https://cdn.test/a.png"
        );
        assert_eq!(rebase_image(base, None), "");
    }

    #[test]
    fn dates_are_formatted_for_display() {
        assert_eq!(display_date(Some("2025-03-14"), None), "14 March 2025");
        assert_eq!(
            display_date(Some("2025-03-14T09:30:00Z"), Some("2025-03-15")),
            "14 - 15 March 2025"
        );
        assert_eq!(
            display_date(Some("2025-03-30"), Some("2025-04-01")),
            "30 March 2025 - 01 April 2025"
        );
        assert_eq!(display_date(Some("Coming soon"), None), "Coming soon");
        assert_eq!(display_date(None, None), "");
    }

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        assert_eq!(numeric_id(&json!({"id": 42}), &["id"]), Some(42));
        assert_eq!(numeric_id(&json!({"event_id": "17"}), &["id", "event_id"]), Some(17));
        assert_eq!(numeric_id(&json!({"id": "abc"}), &["id"]), None);
    }
}

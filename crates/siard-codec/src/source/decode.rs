//! Text parsing and canonical rendering of driver values.
//!
//! Canonical forms:
//! - exact numerics in plain notation (`1.5E3` becomes `1500`)
//! - booleans as `true` / `false`
//! - dates as `YYYY-MM-DD`, times as `HH:MM:SS[.fraction]`
//! - timestamps as `YYYY-MM-DDTHH:MM:SS[.fraction]Z`, zone-aware ones converted to UTC
//! - times with zone as `HH:MM:SS[.fraction]+HH:MM`
//!
//! Every rendering is a fixed point: parsing the output again renders it
//! unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

use crate::error::{CodecError, Result};

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M",
];

pub fn parse_time_text(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

pub fn parse_timestamp_text(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date_text(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().or_else(|| {
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .map(|ts| ts.date())
    })
}

/// Hex text, optionally prefixed `\x` (PostgreSQL) or `0x`.
pub fn parse_blob_text(text: &str) -> Result<Vec<u8>> {
    let hex_str = text
        .strip_prefix("\\x")
        .or_else(|| text.strip_prefix("0x"))
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(hex_str).map_err(|e| CodecError::driver(format!("invalid binary value: {}", e)))
}

pub fn parse_bool_text(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "y" | "yes" => Some(true),
        "f" | "false" | "0" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// `true`/`false` for recognizable booleans, the text unchanged otherwise.
pub fn render_bool_text(text: String) -> String {
    match parse_bool_text(&text) {
        Some(b) => b.to_string(),
        None => text,
    }
}

/// Re-render exponent notation in plain form; other text is returned as is,
/// as is text that does not parse.
pub fn normalize_exact_numeric(text: String) -> String {
    if !text.contains(['e', 'E']) {
        return text;
    }
    match Decimal::from_scientific(text.trim()) {
        Ok(value) => value.to_string(),
        Err(_) => text,
    }
}

pub fn render_time(time: NaiveTime) -> String {
    time.to_string()
}

pub fn render_date(date: NaiveDate) -> String {
    date.to_string()
}

pub fn render_timestamp(ts: NaiveDateTime) -> String {
    ts.and_utc().to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Pad a bare `+HH` / `-HH` offset to `+HH:00` and insert the colon in
/// `+HHMM`. Text without a trailing offset is returned unchanged.
pub fn normalize_offset(text: &str) -> String {
    let text = text.trim();
    let sign_pos = match text.rfind(['+', '-']) {
        Some(pos) if pos > 0 => pos,
        _ => return text.to_string(),
    };
    let (head, offset) = text.split_at(sign_pos);
    let digits = &offset[1..];
    if !digits.chars().all(|c| c.is_ascii_digit() || c == ':') || head.ends_with(['e', 'E']) {
        return text.to_string();
    }
    match digits.len() {
        2 if digits.chars().all(|c| c.is_ascii_digit()) => format!("{}{}:00", head, offset),
        4 if digits.chars().all(|c| c.is_ascii_digit()) => {
            format!("{}{}{}:{}", head, &offset[..1], &digits[..2], &digits[2..])
        }
        _ => text.to_string(),
    }
}

/// Canonical text of a time-with-zone value.
pub fn normalize_time_with_zone(text: &str) -> String {
    normalize_offset(text)
}

/// Parse a zone-aware timestamp and render it as a UTC instant.
pub fn zoned_timestamp_instant(text: &str) -> Result<String> {
    let mut candidate = text.trim().replacen(' ', "T", 1);
    if candidate.ends_with(['z', 'Z']) {
        candidate.pop();
        candidate.push_str("+00:00");
    }
    let candidate = normalize_offset(&candidate);
    let parsed = DateTime::parse_from_rfc3339(&candidate).map_err(|e| {
        CodecError::driver(format!("invalid zone-aware timestamp {:?}: {}", text, e))
    })?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

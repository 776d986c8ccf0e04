//! Request validation, run before anything is loaded.

use crate::error::OfferDocError;
use chrono::{DateTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Display;

/// Stem used when a proposal has no usable name.
pub const DEFAULT_PROPOSAL_STEM: &str = "proposition";

/// Return the trimmed value, or `MissingField` when it is absent or blank.
pub fn require<'a>(field: &'static str, value: Option<&'a str>) -> Result<&'a str, OfferDocError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(OfferDocError::MissingField { field }),
    }
}

/// Reject documents over `limit` bytes.
pub fn check_file_size(size: usize, limit: usize) -> Result<(), OfferDocError> {
    if size > limit {
        return Err(OfferDocError::FileTooLarge { size, limit });
    }
    Ok(())
}

/// Only `.docx` packages can be loaded.
pub fn check_docx_extension(field: &'static str, name: &str) -> Result<(), OfferDocError> {
    if name.to_lowercase().ends_with(".docx") {
        Ok(())
    } else {
        Err(OfferDocError::InvalidInput {
            field,
            reason: format!("'{name}' is not a .docx file"),
        })
    }
}

static RE_UNSAFE_FILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).unwrap());

/// Strip path separators and shell-hostile characters from a file name.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned = strip_unsafe(name);
    if cleaned.is_empty() {
        "unnamed_file".to_string()
    } else {
        cleaned
    }
}

fn strip_unsafe(name: &str) -> String {
    let cleaned = RE_UNSAFE_FILE_CHARS.replace_all(name, "");
    cleaned
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Template file name from a request: separators stripped, `.docx` required.
pub fn template_file_name(field: &'static str, raw: &str) -> Result<String, OfferDocError> {
    let name = sanitize_file_name(require(field, Some(raw))?);
    check_docx_extension(field, &name)?;
    Ok(name)
}

/// `{name}_{YYYYMMDD_HHMM}`, the name reduced to `[A-Za-z0-9 _-]`.
///
/// A blank name, or the default name itself, gives `proposition_{stamp}`.
pub fn proposal_file_stem<Tz: TimeZone>(name: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    let stamp = now.format("%Y%m%d_%H%M");
    let safe: String = strip_unsafe(name)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let safe = safe.trim();
    if safe.is_empty() || safe.eq_ignore_ascii_case(DEFAULT_PROPOSAL_STEM) {
        format!("{DEFAULT_PROPOSAL_STEM}_{stamp}")
    } else {
        format!("{safe}_{stamp}")
    }
}

/// Signed links live between one hour and one week.
pub fn check_expiry_hours(hours: u32) -> Result<u32, OfferDocError> {
    if (1..=168).contains(&hours) {
        Ok(hours)
    } else {
        Err(OfferDocError::InvalidInput {
            field: "expiry_hours",
            reason: format!("{hours} is outside 1 to 168 (7 days)"),
        })
    }
}

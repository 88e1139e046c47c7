//! Company number normalization
//!
//! The record store keeps company numbers as users typed them. The registry
//! expects eight characters, and the common data-entry slip is a dropped
//! leading zero on a purely numeric number.

use regex::Regex;
use std::sync::LazyLock;

static SEVEN_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{7}$").unwrap());
static BLANK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s+$").unwrap());

/// Canonicalize a raw registry identifier for lookup.
///
/// - exactly seven ASCII digits: prepend `"0"`
/// - whitespace only: empty string
/// - anything else: unchanged
pub fn normalize_company_number(raw: &str) -> String {
    if SEVEN_DIGITS_RE.is_match(raw) {
        return format!("0{}", raw);
    }

    // TODO: confirm against registry ID formats whether internal spaces in
    // otherwise valid numbers ("SC 123456") should be stripped instead.
    if BLANK_RE.is_match(raw) {
        return String::new();
    }

    raw.to_string()
}

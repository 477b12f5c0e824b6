//! Reading numbers written with either a comma or a dot as the decimal separator.
//!
//! Both raw file formats come out of instruments configured with a European
//! locale, so every numeric field goes through [`parse_decimal`] or
//! [`first_decimal`] rather than `str::parse` directly.

use crate::error::NumericParseError;

/// Normalize a comma decimal separator to a dot and parse the result strictly.
///
/// Surrounding whitespace is ignored, but anything else that is not part of the
/// number is an error.
pub fn parse_decimal(token: &str) -> Result<f64, NumericParseError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(NumericParseError::Empty);
    }
    let normalized = token.replace(',', ".");
    normalized
        .parse::<f64>()
        .map_err(|_| NumericParseError::Malformed(token.to_string()))
}

/// Find the first unsigned decimal number embedded in `text`, e.g. the value in
/// `"##RETENTION_TIME= 12,5 s"`.
pub fn first_decimal(text: &str) -> Result<f64, NumericParseError> {
    let normalized = text.replace(',', ".");
    let bytes = normalized.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            start = Some(i);
            break;
        }
        if *b == b'.' && bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
            start = Some(i);
            break;
        }
    }
    let start = start.ok_or_else(|| NumericParseError::NotFound(text.to_string()))?;

    let mut seen_dot = false;
    let mut end = start;
    for (i, b) in bytes.iter().enumerate().skip(start) {
        if b.is_ascii_digit() {
            end = i + 1;
        } else if *b == b'.' && !seen_dot && bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit()) {
            seen_dot = true;
        } else {
            break;
        }
    }
    let found = &normalized[start..end];
    found
        .parse::<f64>()
        .map_err(|_| NumericParseError::Malformed(found.to_string()))
}

/// Round `value` to `decimals` places, half away from zero.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

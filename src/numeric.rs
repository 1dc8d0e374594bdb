//! Tolerant parsing of numeric cells extracted from scanned reports.
//!
//! Cells arrive from OCR/LLM extraction and are frequently dirty: thousands
//! separators, stray currency symbols, parenthesized negatives, or plain
//! garbage. Malformed content degrades to 0.0 rather than failing the run.

use log::debug;

/// Parse a raw textual cell into a float.
///
/// Rules:
/// - Empty string or the placeholders `-`/`--` parse as 0.0.
/// - Surrounding parentheses denote a negative magnitude.
/// - Commas are treated as thousands separators and stripped, along with any
///   remaining character outside `[0-9 e E . + -]`.
/// - Anything still unparseable yields 0.0. This function never errors.
pub fn parse_numeric(value: &str) -> f64 {
    let text = value.trim();
    if text.is_empty() || text == "-" || text == "--" {
        return 0.0;
    }

    let mut negative = false;
    let mut inner = text;
    if text.starts_with('(') && text.ends_with(')') {
        negative = true;
        inner = text[1..text.len() - 1].trim();
    }

    let cleaned: String = inner
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, 'e' | 'E' | '.' | '+' | '-'))
        .collect();
    if cleaned.is_empty() {
        debug!("Numeric cell '{}' degraded to 0.0", value);
        return 0.0;
    }

    let Ok(number) = cleaned.parse::<f64>() else {
        debug!("Numeric cell '{}' degraded to 0.0", value);
        return 0.0;
    };

    // Only force the sign when the parenthesized magnitude parsed positive;
    // content like "(-500)" must not flip back to positive.
    if negative && number > 0.0 {
        return -number;
    }
    number
}

/// Render a float back into a matrix cell, dropping a redundant `.0` tail so
/// integral values round-trip the way they appear in source tables.
pub fn format_numeric(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

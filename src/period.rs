//! Chronological ordering and merging of period column labels.
//!
//! Period labels are logically dates but arrive as arbitrary strings, most
//! commonly `DD.MM.YYYY`. Ordering is always computed from the parsed label,
//! never assumed from column position. Labels that cannot be parsed sort
//! after every parseable label and keep their original relative order.

use chrono::NaiveDate;

const PERIOD_DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Best-effort parse of a period label into a comparable date.
///
/// Tries the known formats first and falls back to splitting on `.`/`/`/`-`
/// and reading three numeric tokens as (day, month, year). Two-digit years
/// are promoted by adding 2000.
pub fn parse_period_key(label: &str) -> Option<NaiveDate> {
    let text = label.trim();
    if text.is_empty() {
        return None;
    }

    for format in PERIOD_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return promote_two_digit_year(date);
        }
    }

    let tokens: Vec<i32> = text
        .split(['.', '/', '-'])
        .filter_map(|part| part.parse::<i32>().ok())
        .collect();
    if tokens.len() != 3 {
        return None;
    }

    let (day, month, year) = (tokens[0], tokens[1], tokens[2]);
    let date = NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)?;
    promote_two_digit_year(date)
}

// Labels like `30.06.23` parse with a literal year 23; promote to 2023.
fn promote_two_digit_year(date: NaiveDate) -> Option<NaiveDate> {
    use chrono::Datelike;
    if (0..100).contains(&date.year()) {
        return NaiveDate::from_ymd_opt(date.year() + 2000, date.month(), date.day());
    }
    Some(date)
}

/// Sort key placing parseable labels first (chronologically) and unparseable
/// labels after them. Ties among unparseable labels are broken by the stable
/// sort, preserving encounter order.
fn period_sort_key(label: &str) -> (u8, NaiveDate) {
    match parse_period_key(label) {
        Some(date) => (0, date),
        None => (1, NaiveDate::MIN),
    }
}

/// Stable chronological sort of period labels.
pub fn sort_periods(labels: &mut [String]) {
    labels.sort_by_key(|label| period_sort_key(label));
}

/// Merge two period label sets into one deduplicated, chronologically sorted
/// sequence. Deduplication is by exact string match; labels unique to either
/// input are all preserved. Idempotent: merging a set with itself is a no-op.
pub fn merge_periods(existing: &[String], new_labels: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(existing.len() + new_labels.len());
    for label in existing.iter().chain(new_labels.iter()) {
        if !merged.iter().any(|seen| seen == label) {
            merged.push(label.clone());
        }
    }
    sort_periods(&mut merged);
    merged
}

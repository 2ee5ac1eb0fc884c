//! Field normalizers for raw upstream text.
//!
//! Every function here is total: a value that cannot be coerced becomes
//! `None` (or the [`UNKNOWN`] sentinel for [`normalize_unknown`]) instead of
//! an error, so one bad field never sinks the row it belongs to.

use chrono::NaiveDate;

/// Sentinel text for data the source could not supply.
///
/// The upstream is instructed to write this literal into empty cells, and
/// the merge engine substitutes it for an absent investor.
pub const UNKNOWN: &str = "Desconhecido";

type DateParser = fn(&str) -> Option<NaiveDate>;

/// Accepted date layouts, in priority order.
const DATE_PARSERS: [DateParser; 3] = [parse_iso_date, parse_year_month, parse_day_month_year];

fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// `YYYY-MM`, pinned to the first day of the month.
fn parse_year_month(s: &str) -> Option<NaiveDate> {
    if s.matches('-').count() != 1 {
        return None;
    }
    NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d").ok()
}

fn parse_day_month_year(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}

/// Parses a non-negative decimal integer.
///
/// Only ASCII digits are accepted after trimming; signs, separators and
/// values that overflow `i64` yield `None`.
pub fn normalize_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Parses a calendar date in one of the accepted layouts:
/// `YYYY-MM-DD`, `YYYY-MM` (day 1), then `DD/MM/YYYY`.
pub fn normalize_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_PARSERS.iter().find_map(|parse| parse(trimmed))
}

/// Flattens a bracketed pseudo-list such as `['VC1', "VC2"]` into
/// `VC1, VC2`. Text that does not start with `[` is returned unchanged.
pub fn normalize_investor_list(text: &str) -> String {
    if !text.trim_start().starts_with('[') {
        return text.to_string();
    }
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '\'' | '"'))
        .collect();
    stripped
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Returns the trimmed value, or [`UNKNOWN`] when it is missing or blank.
pub fn normalize_unknown(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Trims free text; blank text is absent.
pub fn normalize_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Case-folds a name and collapses internal whitespace runs to one space.
pub fn canonical_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

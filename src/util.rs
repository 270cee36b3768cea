// Small parsing and statistics helpers shared by the loader and cleaner.
use num_format::{Locale, ToFormattedString};

/// Parse a spreadsheet text cell as `f64`.
///
/// - Trims whitespace.
/// - Returns `None` for empty strings, the `..` placeholder, and anything
///   else that is not a plain number.
/// - Non-finite results (`NaN`, `inf`) are rejected too.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() || s == ".." {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

/// Round to 2 decimal places, ties to even.
pub fn round2(n: f64) -> f64 {
    (n * 100.0).round_ties_even() / 100.0
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

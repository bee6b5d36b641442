// Count parsing: "1.2M", "500,000", raw numbers -> integers
use crate::error::{Result, VidsiftError};

/// Parse a human-formatted count such as `"1.2M"`, `"500K"` or `"12,345"`.
///
/// Commas and whitespace are stripped and a trailing `K`/`M`/`B` multiplies the
/// numeric prefix by 1e3/1e6/1e9. Fractional results are truncated.
pub fn parse_count(text: &str) -> Result<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let (digits, multiplier) = match cleaned.chars().last() {
        Some('K') => (&cleaned[..cleaned.len() - 1], 1e3),
        Some('M') => (&cleaned[..cleaned.len() - 1], 1e6),
        Some('B') => (&cleaned[..cleaned.len() - 1], 1e9),
        _ => (cleaned.as_str(), 1.0),
    };

    let number: f64 = digits
        .parse()
        .map_err(|_| VidsiftError::Parsing(format!("Not a count: {:?}", text)))?;

    count_from_float(number * multiplier)
        .ok_or_else(|| VidsiftError::Parsing(format!("Count out of range: {:?}", text)))
}

/// Truncate a float to a non-negative integer count
pub fn count_from_float(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 && value < u64::MAX as f64 {
        Some(value.trunc() as u64)
    } else {
        None
    }
}

//! Lenient parsing of numbers and coordinates as the game prints them.

use crate::geo::Point;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no coordinate triple in {0:?}")]
    Coordinates(String),
}

fn int_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]?\d+").expect("valid regex"))
}

fn float_prefix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid regex")
    })
}

fn xyz_triple() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(-?[\d.]+)[,\s]+(-?[\d.]+)[,\s]+(-?[\d.]+)").expect("valid regex")
    })
}

fn strip_separators(text: &str) -> String {
    text.replace(',', "").trim().to_string()
}

/// Parses the leading integer of `text` after removing thousands separators.
///
/// `"1,234 ships"` yields `1234`; text without a leading number yields `None`.
pub fn parse_int_lenient(text: &str) -> Option<i64> {
    let cleaned = strip_separators(text);
    let matched = int_prefix().find(&cleaned)?;
    matched.as_str().parse::<i64>().ok()
}

/// Float counterpart of [`parse_int_lenient`]. Never returns NaN or infinity.
pub fn parse_float_lenient(text: &str) -> Option<f64> {
    let cleaned = strip_separators(text);
    let matched = float_prefix().find(&cleaned)?;
    matched
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Reads a `"x, y, z"` triple, tolerating trailing text such as `" global"`.
pub fn parse_coordinates(text: &str) -> Result<Point, ParseError> {
    let invalid = || ParseError::Coordinates(text.to_string());
    let captures = xyz_triple().captures(text).ok_or_else(invalid)?;
    let mut axes = [0.0_f64; 3];
    for (slot, axis) in axes.iter_mut().enumerate() {
        let raw = captures.get(slot + 1).ok_or_else(invalid)?.as_str();
        *axis = raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(invalid)?;
    }
    Ok(Point::new(axes[0], axes[1], axes[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_int_strips_separators_and_suffixes() {
        assert_eq!(parse_int_lenient("1,234"), Some(1234));
        assert_eq!(parse_int_lenient(" 12 ships"), Some(12));
        assert_eq!(parse_int_lenient("-7"), Some(-7));
        assert_eq!(parse_int_lenient("0"), Some(0));
        assert_eq!(parse_int_lenient(""), None);
        assert_eq!(parse_int_lenient("n/a"), None);
    }

    #[test]
    fn lenient_float_never_yields_nan() {
        assert_eq!(parse_float_lenient("12,500.5 t"), Some(12500.5));
        assert_eq!(parse_float_lenient(".5"), Some(0.5));
        assert_eq!(parse_float_lenient("NaN"), None);
        assert_eq!(parse_float_lenient("inf"), None);
        assert_eq!(parse_float_lenient("   "), None);
    }

    #[test]
    fn coordinates_accept_global_suffix() {
        let point = parse_coordinates("3949, -12, 7 global").expect("coordinates");
        assert_eq!(point, Point::new(3949.0, -12.0, 7.0));
        let spaced = parse_coordinates("1 2 3").expect("spaced coordinates");
        assert_eq!(spaced, Point::new(1.0, 2.0, 3.0));
        assert!(parse_coordinates("somewhere").is_err());
    }
}

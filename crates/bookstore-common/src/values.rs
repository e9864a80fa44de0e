//! Tolerant parsing of CSV cell values.
//!
//! Dataset exports are loosely typed: integer columns that contain blanks
//! were written as floats (`"2019.0"`), and missing values show up as any of
//! the usual NA markers. A malformed cell must never drop its row, so every
//! parser here takes a default and reports whether it had to fall back to it.

/// Cell contents treated as a missing value.
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Outcome of a parse-with-default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parsed<T> {
    /// The cell held a usable value
    Value(T),
    /// The cell was missing or malformed; this is the caller's default
    Defaulted(T),
}

impl<T> Parsed<T> {
    pub fn into_inner(self) -> T {
        match self {
            Parsed::Value(v) | Parsed::Defaulted(v) => v,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Parsed::Defaulted(_))
    }
}

/// Returns `None` for absent cells and NA markers, otherwise the raw cell.
pub fn non_null(raw: Option<&str>) -> Option<&str> {
    raw.filter(|s| !NA_TOKENS.contains(&s.trim()))
}

/// Like [`non_null`], trimmed, with blank strings also treated as missing.
pub fn non_blank(raw: Option<&str>) -> Option<&str> {
    non_null(raw).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_integral(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }

    // "2019.0" style cells; truncate toward zero
    let f = raw.parse::<f64>().ok()?;
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn parse_real(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

pub fn parse_int_or(raw: Option<&str>, default: i64) -> Parsed<i64> {
    match non_null(raw).and_then(parse_integral) {
        Some(v) => Parsed::Value(v),
        None => Parsed::Defaulted(default),
    }
}

pub fn parse_float_or(raw: Option<&str>, default: f64) -> Parsed<f64> {
    match non_null(raw).and_then(parse_real) {
        Some(v) => Parsed::Value(v),
        None => Parsed::Defaulted(default),
    }
}

pub fn parse_opt_int(raw: Option<&str>) -> Parsed<Option<i64>> {
    match non_null(raw).and_then(parse_integral) {
        Some(v) => Parsed::Value(Some(v)),
        None => Parsed::Defaulted(None),
    }
}

pub fn parse_opt_float(raw: Option<&str>) -> Parsed<Option<f64>> {
    match non_null(raw).and_then(parse_real) {
        Some(v) => Parsed::Value(Some(v)),
        None => Parsed::Defaulted(None),
    }
}

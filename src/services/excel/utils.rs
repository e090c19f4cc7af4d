use std::collections::HashSet;

use calamine::Data;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serializer;

use super::types::CellValue;

/// Decimal literal: optional sign, digits with optional fraction (or a bare
/// fraction), optional exponent.
static NUMERIC_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("numeric literal pattern is valid")
});

// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

const EMPTY_HEADER: &str = "__EMPTY";

pub fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::Bool(b) => CellValue::Boolean(*b),
        // serial day number, as stored in the file
        Data::DateTime(d) => CellValue::Number(d.as_f64()),
        Data::Empty => CellValue::Missing,
        other => CellValue::String(other.to_string()),
    }
}

/// Converts a value to a number when it has an unambiguous numeric reading.
///
/// Finite numbers pass through; strings must match the decimal literal
/// grammar after trimming. Booleans, empty or whitespace-only strings and
/// missing values never coerce.
pub fn coerce_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::String(s) => {
            let trimmed = s.trim();
            if NUMERIC_LITERAL.is_match(trimmed) {
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            } else {
                None
            }
        }
        _ => None,
    }
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Text used as a column key for a header-row cell.
pub fn header_text(cell: &CellValue) -> String {
    match cell {
        CellValue::Number(n) => format_number(*n),
        CellValue::String(s) => s.clone(),
        CellValue::Boolean(true) => "TRUE".to_string(),
        CellValue::Boolean(false) => "FALSE".to_string(),
        CellValue::Missing => String::new(),
    }
}

/// Makes `name` unique among `existing_names` by appending `_1`, `_2`, ...
/// Blank names become `__EMPTY`.
pub fn unique_header(name: &str, existing_names: &mut HashSet<String>) -> String {
    let base = if name.is_empty() { EMPTY_HEADER } else { name };

    let mut candidate = base.to_string();
    let mut counter = 1;
    while !existing_names.insert(candidate.clone()) {
        candidate = format!("{}_{}", base, counter);
        counter += 1;
    }

    candidate
}

/// Serializes integral values as JSON integers so `3.0` reads back as `3`.
pub fn serialize_number<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*n as i64)
    } else {
        serializer.serialize_f64(*n)
    }
}

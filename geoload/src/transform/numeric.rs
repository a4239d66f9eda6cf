//! Numeric handling: coercion of textual numbers, rounding and axis offsets.

use serde_json::{Number, Value};

use crate::config::{AxisOffsets, RoundingOrder};
use crate::models::{Axis, Record};

/// Parse text as a JSON number, keeping integers integral.
///
/// `"5"` → `5`, `"2.50"` → `2.5`, `"1e3"` → `1000.0`. Non-finite values
/// (`"nan"`, `"inf"`) are rejected.
pub fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::from(i));
    }
    text.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}

/// Numeric view of a scalar: numbers as-is, strings when they parse.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s).and_then(|v| v.as_f64()),
        _ => None,
    }
}

/// Convert a scalar to a JSON number, if it represents one.
pub fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Round half away from zero to `digits` decimal places.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Round numeric fields and apply per-axis offsets.
///
/// Every numeric field is rounded to `rounding_digits`; offsets only touch
/// the canonical axis fields. Strings and other scalars pass through.
/// Integer inputs stay integers when the result has no fractional part.
pub fn transform_numeric(
    mut record: Record,
    rounding_digits: Option<u32>,
    offsets: &AxisOffsets,
    order: RoundingOrder,
) -> Record {
    if rounding_digits.is_none() && offsets.is_empty() {
        return record;
    }

    for (field, value) in record.iter_mut() {
        let Value::Number(number) = &*value else {
            continue;
        };
        let offset = Axis::from_name(field)
            .filter(|axis| axis.name() == field.as_str())
            .and_then(|axis| offsets.get(axis));

        if let Some(updated) = transform_number(number, rounding_digits, offset, order) {
            *value = updated;
        }
    }

    record
}

fn transform_number(
    number: &Number,
    digits: Option<u32>,
    offset: Option<f64>,
    order: RoundingOrder,
) -> Option<Value> {
    let integral = number.is_i64() || number.is_u64();
    if integral && offset.is_none() {
        return None;
    }

    let raw = number.as_f64()?;
    let round = |v: f64| digits.map_or(v, |d| round_to(v, d));

    let result = match (order, offset) {
        (_, None) => round(raw),
        (RoundingOrder::RoundThenOffset, Some(offset)) => round(round(raw) + offset),
        (RoundingOrder::OffsetThenRound, Some(offset)) => round(raw + offset),
    };

    if integral && result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        return Some(Value::from(result as i64));
    }
    Number::from_f64(result).map(Value::Number)
}

//! "No data" sample filtering.
//!
//! Values are compared numerically whenever both sides are numbers (or
//! numeric strings), so `"0"`, `0`, `0.0`, `"0.0"` and `"00"` all match a
//! sentinel of `"0"`. Non-numeric values fall back to exact text equality.

use serde_json::Value;

use crate::config::TranscodeConfig;
use crate::models::{Axis, Record};
use crate::transform::numeric::as_f64;

/// Drops records whose value on one axis equals the sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct SentinelFilter {
    axis: Axis,
    sentinel: Value,
    tolerance: Option<f64>,
}

impl SentinelFilter {
    pub fn new(axis: Axis, sentinel: Value) -> Self {
        Self {
            axis,
            sentinel,
            tolerance: None,
        }
    }

    /// Match numeric values within `tolerance` instead of exactly.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Filter described by `config`, if it names a sentinel.
    pub fn from_config(config: &TranscodeConfig) -> Option<Self> {
        let sentinel = config.sentinel.clone()?;
        Some(Self {
            axis: config.sentinel_axis,
            sentinel,
            tolerance: config.sentinel_tolerance,
        })
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Whether `value` is the sentinel.
    pub fn matches(&self, value: &Value) -> bool {
        match (as_f64(value), as_f64(&self.sentinel)) {
            (Some(a), Some(b)) => match self.tolerance {
                Some(tolerance) => (a - b).abs() <= tolerance,
                None => a == b,
            },
            _ => match (scalar_text(value), scalar_text(&self.sentinel)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// `false` when the record should be dropped. Records without the axis are kept.
    pub fn keep(&self, record: &Record) -> bool {
        record
            .get_axis(self.axis)
            .map_or(true, |value| !self.matches(value))
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

/// Returns `false` (drop) when `record[axis]` equals `sentinel`.
pub fn filter_sentinel(record: &Record, axis: Axis, sentinel: &Value) -> bool {
    SentinelFilter::new(axis, sentinel.clone()).keep(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_z(z: Value) -> Record {
        vec![("x", json!(1)), ("y", json!(2)), ("z", z)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_numeric_equivalents_match_zero() {
        let sentinel = json!("0");
        for z in [json!("0"), json!(0), json!(0.0), json!("0.0"), json!("00"), json!(" 0 ")] {
            assert!(!filter_sentinel(&with_z(z.clone()), Axis::Z, &sentinel), "{} kept", z);
        }
    }

    #[test]
    fn test_non_sentinel_values_kept() {
        let sentinel = json!(0);
        for z in [json!("5"), json!(0.001), json!(-1), json!("n/a")] {
            assert!(filter_sentinel(&with_z(z.clone()), Axis::Z, &sentinel), "{} dropped", z);
        }
    }

    #[test]
    fn test_text_sentinel() {
        let sentinel = json!("NODATA");
        assert!(!filter_sentinel(&with_z(json!("NODATA")), Axis::Z, &sentinel));
        assert!(filter_sentinel(&with_z(json!("0")), Axis::Z, &sentinel));
    }

    #[test]
    fn test_tolerance() {
        let filter = SentinelFilter::new(Axis::Z, json!(-9999)).with_tolerance(0.5);
        assert!(!filter.keep(&with_z(json!(-9999.25))));
        assert!(filter.keep(&with_z(json!(-9998))));
    }

    #[test]
    fn test_missing_axis_is_kept() {
        let record: Record = vec![("x", json!(1))].into_iter().collect();
        assert!(filter_sentinel(&record, Axis::Z, &json!(0)));
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filter = SentinelFilter::new(Axis::Z, json!("0"));
        let records = vec![
            with_z(json!("0")),
            with_z(json!("5")),
            with_z(json!(0.0)),
            with_z(json!(12)),
        ];

        let once: Vec<Record> = records.into_iter().filter(|r| filter.keep(r)).collect();
        let twice: Vec<Record> = once.clone().into_iter().filter(|r| filter.keep(r)).collect();
        assert_eq!(once.len(), 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_from_config() {
        assert!(SentinelFilter::from_config(&TranscodeConfig::default()).is_none());

        let config = TranscodeConfig::default().with_sentinel(Axis::Y, json!(0));
        let filter = SentinelFilter::from_config(&config).unwrap();
        assert_eq!(filter.axis(), Axis::Y);
    }
}

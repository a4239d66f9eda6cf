//! Row Transcoder executor.
//!
//! Runs every record through `remap → filter → coerce → check → transform`
//! and collects the survivors into one [`CollectionDocument`]. Either the
//! whole document is produced or an error is returned; nothing partial.

use serde::Serialize;
use serde_json::Value;

use super::aliases::remap_fields;
use super::document::build_document;
use super::numeric::{coerce_number, transform_numeric};
use super::sentinel::SentinelFilter;
use crate::config::TranscodeConfig;
use crate::error::{TranscodeError, TranscodeResult};
use crate::models::{Axis, CollectionDocument, Record};

/// Counters for one transcoder run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranscodeStats {
    /// Records read from the input sequence
    pub read: usize,
    /// Records written to the document
    pub kept: usize,
    /// Records dropped by the sentinel filter
    pub dropped: usize,
}

impl TranscodeStats {
    pub fn summary(&self) -> String {
        format!(
            "Read {} records, kept {}, dropped {} as no-data",
            self.read, self.kept, self.dropped
        )
    }
}

/// Result of a successful transcoder run.
#[derive(Debug, Clone)]
pub struct Transcoded {
    pub document: CollectionDocument,
    pub stats: TranscodeStats,
}

/// Transcode an in-memory record sequence.
///
/// # Example
/// ```
/// use geoload::{transcode, Axis, AxisAliases, TranscodeConfig};
/// use serde_json::json;
///
/// let rows = vec![
///     json!({"lon": 10, "lat": 20, "elev": "0"}),
///     json!({"lon": 11, "lat": 21, "elev": "5"}),
/// ];
/// let config = TranscodeConfig::new("points")
///     .with_aliases(AxisAliases::identity()
///         .with(Axis::X, "lon")
///         .with(Axis::Y, "lat")
///         .with(Axis::Z, "elev"))
///     .with_sentinel(Axis::Z, json!("0"));
///
/// let records = rows.into_iter().filter_map(geoload::Record::from_value);
/// let out = transcode(records, &config).unwrap();
/// assert_eq!(out.document.to_json().unwrap(), r#"{"points":[{"x":11,"y":21,"z":5}]}"#);
/// ```
pub fn transcode<I>(records: I, config: &TranscodeConfig) -> TranscodeResult<Transcoded>
where
    I: IntoIterator<Item = Record>,
{
    try_transcode(records.into_iter().map(Ok), config)
}

/// Transcode a fallible record sequence (e.g. a streaming file reader).
///
/// The first read error or transcoder error aborts the run.
pub fn try_transcode<I, E>(records: I, config: &TranscodeConfig) -> Result<Transcoded, E>
where
    I: IntoIterator<Item = Result<Record, E>>,
    E: From<TranscodeError>,
{
    config.validate()?;
    let filter = SentinelFilter::from_config(config);

    let mut stats = TranscodeStats::default();
    let mut kept = Vec::new();

    for (row, record) in records.into_iter().enumerate() {
        let record = record?;
        stats.read += 1;

        match transcode_record(record, row, config, filter.as_ref())? {
            Some(record) => kept.push(record),
            None => stats.dropped += 1,
        }
    }

    let document = build_document(kept, &config.collection_key)?;
    stats.kept = document.len();

    Ok(Transcoded { document, stats })
}

/// Run one record through the pipeline. `Ok(None)` means filtered out.
pub fn transcode_record(
    record: Record,
    row: usize,
    config: &TranscodeConfig,
    filter: Option<&SentinelFilter>,
) -> TranscodeResult<Option<Record>> {
    let mut record = remap_fields(record, &config.axis_aliases)?;

    // No-data rows are dropped before their values are validated
    if let Some(filter) = filter {
        if !filter.keep(&record) {
            return Ok(None);
        }
    }

    coerce_axes(&mut record, row)?;

    for axis in &config.required_axes {
        if !record.contains(axis.name()) {
            return Err(TranscodeError::MissingField {
                row,
                field: missing_field_name(*axis, config),
            });
        }
    }

    Ok(Some(transform_numeric(
        record,
        config.rounding_digits,
        &config.axis_offsets,
        config.rounding_order,
    )))
}

/// Turn axis values into JSON numbers. Blank values count as absent.
fn coerce_axes(record: &mut Record, row: usize) -> TranscodeResult<()> {
    for axis in Axis::ALL {
        let Some(value) = record.get_axis(axis) else {
            continue;
        };

        if is_blank(value) {
            record.remove(axis.name());
            continue;
        }

        let number = coerce_number(value).ok_or_else(|| TranscodeError::InvalidNumber {
            row,
            field: axis.name().to_string(),
            value: value_text(value),
        })?;
        record.insert(axis.name(), number);
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Name the field as the input knows it: `z (elev)` when aliased.
fn missing_field_name(axis: Axis, config: &TranscodeConfig) -> String {
    match config.axis_aliases.get(axis) {
        Some(source) if source != axis.name() => format!("{} ({})", axis, source),
        _ => axis.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AxisAliases, RoundingOrder};
    use serde_json::json;

    fn records(values: Vec<Value>) -> Vec<Record> {
        values.into_iter().filter_map(Record::from_value).collect()
    }

    fn lonlat_config() -> TranscodeConfig {
        TranscodeConfig::new("points").with_aliases(
            AxisAliases::identity()
                .with(Axis::X, "lon")
                .with(Axis::Y, "lat")
                .with(Axis::Z, "elev"),
        )
    }

    #[test]
    fn test_sentinel_scenario() {
        let input = records(vec![
            json!({"lon": 10, "lat": 20, "elev": "0"}),
            json!({"lon": 11, "lat": 21, "elev": "5"}),
        ]);
        let config = lonlat_config().with_sentinel(Axis::Z, json!("0"));

        let out = transcode(input, &config).unwrap();

        assert_eq!(
            out.document.to_value(),
            json!({"points": [{"x": 11, "y": 21, "z": 5}]})
        );
        assert_eq!(
            out.stats,
            TranscodeStats {
                read: 2,
                kept: 1,
                dropped: 1
            }
        );
    }

    #[test]
    fn test_rounding_and_offset_scenario() {
        let input = records(vec![json!({"x": 10.12345, "y": 20.6789, "z": 30.555})]);
        let config = TranscodeConfig::new("points")
            .with_rounding(2)
            .with_offset(Axis::Z, -28.0);

        let out = transcode(input.clone(), &config).unwrap();
        assert_eq!(
            out.document.to_value(),
            json!({"points": [{"x": 10.12, "y": 20.68, "z": 2.56}]})
        );

        let offset_first = config.with_rounding_order(RoundingOrder::OffsetThenRound);
        let out = transcode(input, &offset_first).unwrap();
        assert_eq!(
            out.document.to_value(),
            json!({"points": [{"x": 10.12, "y": 20.68, "z": 2.55}]})
        );
    }

    #[test]
    fn test_text_sentinel_drops_non_numeric_rows() {
        let input = records(vec![
            json!({"lon": 10, "lat": 20, "elev": "NODATA"}),
            json!({"lon": 11, "lat": 21, "elev": "5"}),
        ]);
        let config = lonlat_config().with_sentinel(Axis::Z, json!("NODATA"));

        let out = transcode(input, &config).unwrap();
        assert_eq!(
            out.document.to_value(),
            json!({"points": [{"x": 11, "y": 21, "z": 5}]})
        );
        assert_eq!(out.stats.dropped, 1);
    }

    #[test]
    fn test_sentinel_row_with_missing_axis_is_dropped() {
        let input = records(vec![
            json!({"lon": "", "lat": 20, "elev": "0"}),
            json!({"lon": 11, "lat": 21, "elev": "5"}),
        ]);
        let config = lonlat_config().with_sentinel(Axis::Z, json!(0));

        let out = transcode(input, &config).unwrap();
        assert_eq!(out.document.len(), 1);
        assert_eq!(out.stats.dropped, 1);
    }

    #[test]
    fn test_empty_input() {
        let out = transcode(Vec::new(), &TranscodeConfig::new("points")).unwrap();
        assert_eq!(out.document.to_json().unwrap(), r#"{"points":[]}"#);
        assert_eq!(out.stats, TranscodeStats::default());
    }

    #[test]
    fn test_missing_field_names_source() {
        let input = records(vec![
            json!({"lon": 10, "lat": 20, "elev": 1}),
            json!({"lon": 11, "lat": 21}),
        ]);

        let err = transcode(input, &lonlat_config()).unwrap_err();
        match err {
            TranscodeError::MissingField { row, field } => {
                assert_eq!(row, 1);
                assert_eq!(field, "z (elev)");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_blank_axis_counts_as_missing() {
        let input = records(vec![json!({"x": "1", "y": "2", "z": " "})]);
        let err = transcode(input, &TranscodeConfig::default()).unwrap_err();
        assert!(matches!(err, TranscodeError::MissingField { .. }));
    }

    #[test]
    fn test_optional_axis() {
        let input = records(vec![json!({"x": "1", "y": "2", "z": ""})]);
        let config = TranscodeConfig::default().with_required_axes([Axis::X, Axis::Y]);

        let out = transcode(input, &config).unwrap();
        assert_eq!(out.document.to_value(), json!({"points": [{"x": 1, "y": 2}]}));
    }

    #[test]
    fn test_non_numeric_axis() {
        let input = records(vec![json!({"x": "1", "y": "north", "z": "3"})]);
        let err = transcode(input, &TranscodeConfig::default()).unwrap_err();
        match err {
            TranscodeError::InvalidNumber { row, field, value } => {
                assert_eq!(row, 0);
                assert_eq!(field, "y");
                assert_eq!(value, "north");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_attributes_pass_through() {
        let input = records(vec![json!({"id": "A-1", "x": "1.5", "y": "2", "z": "3", "note": "dry"})]);
        let out = transcode(input, &TranscodeConfig::default()).unwrap();

        assert_eq!(
            out.document.to_json().unwrap(),
            r#"{"points":[{"id":"A-1","x":1.5,"y":2,"z":3,"note":"dry"}]}"#
        );
    }

    #[test]
    fn test_invalid_config_fails_before_reading() {
        let config = TranscodeConfig::new("");
        let input = records(vec![json!({"x": 1, "y": 2, "z": 3})]);
        assert!(matches!(
            transcode(input, &config),
            Err(TranscodeError::Configuration(_))
        ));
    }

    #[test]
    fn test_read_error_aborts() {
        #[derive(Debug)]
        enum ReadError {
            Broken,
            Transcode,
        }
        impl From<TranscodeError> for ReadError {
            fn from(_: TranscodeError) -> Self {
                ReadError::Transcode
            }
        }

        let ok: Record = vec![("x", json!(1)), ("y", json!(2)), ("z", json!(3))]
            .into_iter()
            .collect();
        let rows = vec![Ok(ok), Err(ReadError::Broken)];

        let result = try_transcode(rows, &TranscodeConfig::default());
        assert!(matches!(result, Err(ReadError::Broken)));
    }

    #[test]
    fn test_parsed_output_matches_transformed_records() {
        let input = records(vec![
            json!({"lon": "10.123", "lat": "20.987", "elev": "100.4", "site": "a"}),
            json!({"lon": "11.5", "lat": "21.25", "elev": "0", "site": "b"}),
            json!({"lon": "12", "lat": "22", "elev": "7.777", "site": "c"}),
        ]);
        let config = lonlat_config()
            .with_sentinel(Axis::Z, json!(0))
            .with_rounding(1);

        let expected: Vec<Record> = input
            .iter()
            .cloned()
            .enumerate()
            .filter_map(|(row, r)| {
                let filter = SentinelFilter::from_config(&config);
                transcode_record(r, row, &config, filter.as_ref()).unwrap()
            })
            .collect();

        let out = transcode(input, &config).unwrap();
        let parsed = CollectionDocument::from_json(&out.document.to_json().unwrap()).unwrap();

        assert_eq!(parsed.records().len(), expected.len());
        for (got, want) in parsed.records().iter().zip(&expected) {
            for axis in Axis::ALL {
                let got = got.get_axis(axis).and_then(Value::as_f64).unwrap();
                let want = want.get_axis(axis).and_then(Value::as_f64).unwrap();
                assert!((got - want).abs() < 0.05);
            }
            assert_eq!(got.get("site"), want.get("site"));
        }
    }
}

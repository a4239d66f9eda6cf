//! Assembly of the final Collection Document.

use serde_json::Value;

use crate::error::{TranscodeError, TranscodeResult};
use crate::models::{CollectionDocument, Record};

/// Wrap records into `{collection_key: [record, ...]}`.
///
/// An empty sequence yields an empty collection. Fails with
/// [`TranscodeError::Serialization`] when a record holds an array or object,
/// and with [`TranscodeError::Configuration`] on a blank key.
pub fn build_document<I>(records: I, collection_key: &str) -> TranscodeResult<CollectionDocument>
where
    I: IntoIterator<Item = Record>,
{
    if collection_key.trim().is_empty() {
        return Err(TranscodeError::Configuration(
            "collection key must not be empty".into(),
        ));
    }

    let records = records
        .into_iter()
        .enumerate()
        .map(|(row, record)| ensure_scalars(row, record))
        .collect::<TranscodeResult<Vec<_>>>()?;

    Ok(CollectionDocument::new(collection_key.to_string(), records))
}

fn ensure_scalars(row: usize, record: Record) -> TranscodeResult<Record> {
    for (field, value) in record.iter() {
        let kind = match value {
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            _ => continue,
        };
        return Err(TranscodeError::Serialization(format!(
            "record {} field '{}' holds a nested {}",
            row, field, kind
        )));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_collection() {
        let doc = build_document(Vec::new(), "points").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.to_json().unwrap(), r#"{"points":[]}"#);
    }

    #[test]
    fn test_strings_are_escaped() {
        let record: Record = vec![
            ("x", json!(1)),
            ("label", json!("say \"hi\"\nnow")),
        ]
        .into_iter()
        .collect();

        let json = build_document(vec![record], "points")
            .unwrap()
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"points":[{"x":1,"label":"say \"hi\"\nnow"}]}"#);
        assert!(serde_json::from_str::<Value>(&json).is_ok());
    }

    #[test]
    fn test_nested_value_rejected() {
        let ok: Record = vec![("x", json!(1))].into_iter().collect();
        let nested: Record = vec![("x", json!(1)), ("tags", json!(["a", "b"]))]
            .into_iter()
            .collect();

        let err = build_document(vec![ok, nested], "points").unwrap_err();
        assert!(matches!(err, TranscodeError::Serialization(_)));
        assert!(err.to_string().contains("record 1"));
        assert!(err.to_string().contains("tags"));
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(
            build_document(Vec::new(), ""),
            Err(TranscodeError::Configuration(_))
        ));
    }

    #[test]
    fn test_round_trip() {
        let records: Vec<Record> = (0..3)
            .map(|i| {
                vec![
                    ("x", json!(10.5 + i as f64)),
                    ("y", json!(i)),
                    ("name", json!(format!("p{}", i))),
                ]
                .into_iter()
                .collect()
            })
            .collect();

        let doc = build_document(records.clone(), "samples").unwrap();
        let parsed = crate::models::CollectionDocument::from_json(&doc.to_json().unwrap()).unwrap();

        assert_eq!(parsed.key(), "samples");
        assert_eq!(parsed.records(), records.as_slice());
    }
}

//! Field renaming from source names to canonical axis names.

use serde_json::Map;
use std::collections::HashMap;

use crate::config::AxisAliases;
use crate::error::{TranscodeError, TranscodeResult};
use crate::models::Record;

/// Rename aliased fields to their canonical axis names.
///
/// Fields keep their position; unaliased fields pass through unchanged.
/// Fails with [`TranscodeError::Configuration`] when the alias map is
/// ambiguous or when two fields of this record would end up with the same
/// name (e.g. `lon` aliased to `x` on a record that already has an `x`).
pub fn remap_fields(record: Record, aliases: &AxisAliases) -> TranscodeResult<Record> {
    if aliases.is_identity() {
        return Ok(record);
    }
    aliases.validate()?;

    let mut remapped = Map::new();
    let mut origins: HashMap<String, String> = HashMap::new();

    for (field, value) in record {
        let name = match aliases.axis_for(&field) {
            Some(axis) => axis.name().to_string(),
            None => field.clone(),
        };

        if let Some(previous) = origins.insert(name.clone(), field.clone()) {
            return Err(TranscodeError::Configuration(format!(
                "fields '{}' and '{}' both map to '{}'",
                previous, field, name
            )));
        }
        remapped.insert(name, value);
    }

    Ok(Record::from(remapped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Axis;
    use serde_json::json;

    fn lonlat() -> AxisAliases {
        AxisAliases::identity()
            .with(Axis::X, "lon")
            .with(Axis::Y, "lat")
            .with(Axis::Z, "elev")
    }

    #[test]
    fn test_renames_and_keeps_order() {
        let record: Record = vec![
            ("name", json!("well-1")),
            ("lon", json!(10)),
            ("lat", json!(20)),
            ("elev", json!("5")),
        ]
        .into_iter()
        .collect();

        let out = remap_fields(record, &lonlat()).unwrap();
        let fields: Vec<&String> = out.fields().collect();
        assert_eq!(fields, vec!["name", "x", "y", "z"]);
        assert_eq!(out.get("z"), Some(&json!("5")));
        assert_eq!(out.get("name"), Some(&json!("well-1")));
    }

    #[test]
    fn test_identity_passes_through() {
        let record: Record = vec![("lon", json!(1)), ("x", json!(2))].into_iter().collect();
        let out = remap_fields(record.clone(), &AxisAliases::identity()).unwrap();
        assert_eq!(out, record);
    }

    #[test]
    fn test_aliased_subset_is_bijective() {
        let record: Record = vec![
            ("lon", json!(1)),
            ("lat", json!(2)),
            ("elev", json!(3)),
            ("id", json!(4)),
        ]
        .into_iter()
        .collect();

        let out = remap_fields(record.clone(), &lonlat()).unwrap();
        assert_eq!(out.len(), record.len());
        for (axis, source) in lonlat().pairs() {
            assert_eq!(out.get(axis.name()), record.get(source));
        }
        assert_eq!(out.get("id"), record.get("id"));
    }

    #[test]
    fn test_collision_with_existing_field() {
        let record: Record = vec![("lon", json!(1)), ("x", json!(2))].into_iter().collect();
        let aliases = AxisAliases::identity().with(Axis::X, "lon");

        let err = remap_fields(record, &aliases).unwrap_err();
        assert!(matches!(err, TranscodeError::Configuration(_)));
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_swapped_axes_do_not_collide() {
        let record: Record = vec![("x", json!(1)), ("y", json!(2))].into_iter().collect();
        let aliases = AxisAliases::identity()
            .with(Axis::X, "y")
            .with(Axis::Y, "x");

        let out = remap_fields(record, &aliases).unwrap();
        assert_eq!(out.get("x"), Some(&json!(2)));
        assert_eq!(out.get("y"), Some(&json!(1)));
    }

    #[test]
    fn test_ambiguous_alias_map() {
        let record: Record = vec![("lon", json!(1))].into_iter().collect();
        let aliases = AxisAliases::identity()
            .with(Axis::X, "lon")
            .with(Axis::Z, "lon");

        assert!(matches!(
            remap_fields(record, &aliases),
            Err(TranscodeError::Configuration(_))
        ));
    }
}

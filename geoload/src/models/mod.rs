//! Domain models shared across the conversion pipeline.
//!
//! - [`Axis`] - canonical coordinate axes (`x`, `y`, `z`)
//! - [`Record`] - one geometric sample as an ordered field map
//! - [`CollectionDocument`] - the final `{ key: [record, ...] }` artifact

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{TranscodeError, TranscodeResult};

// =============================================================================
// Axis
// =============================================================================

/// A canonical coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in output order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Canonical field name used in output records.
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }

    /// Parse a canonical axis name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "x" => Some(Axis::X),
            "y" => Some(Axis::Y),
            "z" => Some(Axis::Z),
            _ => None,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Axis::from_name(s).ok_or_else(|| format!("unknown axis '{}' (expected x, y or z)", s))
    }
}

// =============================================================================
// Record
// =============================================================================

/// One geometric sample: an ordered mapping from field name to scalar value.
///
/// Field order is the insertion order, which is also the order fields are
/// written in the output document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a record from a JSON value. Returns `None` unless it is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_axis(&self, axis: Axis) -> Option<&Value> {
        self.0.get(axis.name())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Insert or replace a field. A replaced field keeps its position.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    /// Remove a field, keeping the relative order of the remaining ones.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.shift_remove(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.0.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = serde_json::map::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// =============================================================================
// Collection Document
// =============================================================================

/// The output artifact: records grouped under a single collection key.
///
/// Built once by [`crate::transform::build_document`] and never mutated
/// afterwards. Serializes as `{"<key>": [record, ...]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDocument {
    key: String,
    records: Vec<Record>,
}

impl CollectionDocument {
    pub(crate) fn new(key: String, records: Vec<Record>) -> Self {
        Self { key, records }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Compact JSON rendering.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Indented JSON rendering.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_value(&self) -> Value {
        let items = self.records.iter().cloned().map(Value::from).collect();
        let mut root = Map::new();
        root.insert(self.key.clone(), Value::Array(items));
        Value::Object(root)
    }

    /// Parse a rendered document back into its key and records.
    pub fn from_json(json: &str) -> TranscodeResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| TranscodeError::Serialization(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> TranscodeResult<Self> {
        let root = match value {
            Value::Object(root) if root.len() == 1 => root,
            _ => {
                return Err(TranscodeError::Serialization(
                    "document must be an object with exactly one collection key".into(),
                ))
            }
        };

        let Some((key, items)) = root.into_iter().next() else {
            return Err(TranscodeError::Serialization("document is empty".into()));
        };

        let Value::Array(items) = items else {
            return Err(TranscodeError::Serialization(format!(
                "collection '{}' is not an array",
                key
            )));
        };

        let records = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                Record::from_value(item).ok_or_else(|| {
                    TranscodeError::Serialization(format!(
                        "element {} of '{}' is not an object",
                        i, key
                    ))
                })
            })
            .collect::<TranscodeResult<Vec<_>>>()?;

        Ok(Self { key, records })
    }
}

impl Serialize for CollectionDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.records)?;
        map.end()
    }
}

//! Transcoder configuration and per-file sidecar loading.
//!
//! [`TranscodeConfig`] is a plain value handed to the transcoder at call time;
//! nothing in [`crate::transform`] reads files or the environment.
//!
//! Sidecar files sit next to the input and share its stem (`dem.tif` →
//! `dem.yml`). They hold one entry per input file, keyed by file name or stem:
//!
//! ```yaml
//! trek_drilldata.csv:
//!   srs: 4326
//!   x_field: lon
//!   y_field: lat
//!   z_field: elev
//!   geom: points
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult, TranscodeError, TranscodeResult};
use crate::models::Axis;

/// Collection key used when none is configured.
pub const DEFAULT_COLLECTION_KEY: &str = "points";

/// Largest supported rounding precision.
pub const MAX_ROUNDING_DIGITS: u32 = 15;

// =============================================================================
// Axis aliases and offsets
// =============================================================================

/// Maps source field names onto the canonical axes.
///
/// An empty map is the identity: records pass through with their own names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisAliases {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<String>,
}

impl AxisAliases {
    pub fn identity() -> Self {
        Self::default()
    }

    /// Set the source field for an axis.
    pub fn with(mut self, axis: Axis, source: impl Into<String>) -> Self {
        *self.slot_mut(axis) = Some(source.into());
        self
    }

    pub fn get(&self, axis: Axis) -> Option<&str> {
        match axis {
            Axis::X => self.x.as_deref(),
            Axis::Y => self.y.as_deref(),
            Axis::Z => self.z.as_deref(),
        }
    }

    fn slot_mut(&mut self, axis: Axis) -> &mut Option<String> {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }

    /// Configured `(axis, source field)` pairs in axis order.
    pub fn pairs(&self) -> impl Iterator<Item = (Axis, &str)> {
        Axis::ALL
            .into_iter()
            .filter_map(|axis| self.get(axis).map(|source| (axis, source)))
    }

    /// The axis a source field is renamed to, if any.
    pub fn axis_for(&self, field: &str) -> Option<Axis> {
        self.pairs()
            .find(|(_, source)| *source == field)
            .map(|(axis, _)| axis)
    }

    /// Reject maps where one source field feeds two axes, or a source is blank.
    pub fn validate(&self) -> TranscodeResult<()> {
        let mut seen: HashMap<&str, Axis> = HashMap::new();
        for (axis, source) in self.pairs() {
            if source.trim().is_empty() {
                return Err(TranscodeError::Configuration(format!(
                    "alias for axis '{}' is blank",
                    axis
                )));
            }
            if let Some(previous) = seen.insert(source, axis) {
                return Err(TranscodeError::Configuration(format!(
                    "field '{}' is aliased to both '{}' and '{}'",
                    source, previous, axis
                )));
            }
        }
        Ok(())
    }
}

/// Additive per-axis corrections (e.g. a vertical datum bias on `z`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisOffsets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl AxisOffsets {
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn set(&mut self, axis: Axis, offset: f64) {
        match axis {
            Axis::X => self.x = Some(offset),
            Axis::Y => self.y = Some(offset),
            Axis::Z => self.z = Some(offset),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }
}

/// Whether rounding happens before or after the offset is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingOrder {
    /// Round the source value, add the offset, normalize to the same precision.
    #[default]
    RoundThenOffset,
    /// Add the offset to the raw value, then round.
    OffsetThenRound,
}

// =============================================================================
// Transcoder configuration
// =============================================================================

/// Everything the Row Transcoder needs for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Name of the collection in the output document.
    #[serde(default = "default_collection_key")]
    pub collection_key: String,

    /// Source field → canonical axis mapping.
    #[serde(default)]
    pub axis_aliases: AxisAliases,

    /// Value marking a "no data" sample.
    #[serde(default)]
    pub sentinel: Option<Value>,

    /// Axis the sentinel is compared against.
    #[serde(default = "default_sentinel_axis")]
    pub sentinel_axis: Axis,

    /// Absolute tolerance for numeric sentinel matches (exact when absent).
    #[serde(default)]
    pub sentinel_tolerance: Option<f64>,

    /// Decimal places kept on numeric fields.
    #[serde(default)]
    pub rounding_digits: Option<u32>,

    #[serde(default)]
    pub rounding_order: RoundingOrder,

    #[serde(default)]
    pub axis_offsets: AxisOffsets,

    /// Axes every record must carry after remapping.
    #[serde(default = "default_required_axes")]
    pub required_axes: Vec<Axis>,
}

fn default_collection_key() -> String {
    DEFAULT_COLLECTION_KEY.to_string()
}

fn default_sentinel_axis() -> Axis {
    Axis::Z
}

fn default_required_axes() -> Vec<Axis> {
    Axis::ALL.to_vec()
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            collection_key: default_collection_key(),
            axis_aliases: AxisAliases::identity(),
            sentinel: None,
            sentinel_axis: default_sentinel_axis(),
            sentinel_tolerance: None,
            rounding_digits: None,
            rounding_order: RoundingOrder::default(),
            axis_offsets: AxisOffsets::default(),
            required_axes: default_required_axes(),
        }
    }
}

impl TranscodeConfig {
    pub fn new(collection_key: impl Into<String>) -> Self {
        Self {
            collection_key: collection_key.into(),
            ..Self::default()
        }
    }

    pub fn with_aliases(mut self, aliases: AxisAliases) -> Self {
        self.axis_aliases = aliases;
        self
    }

    pub fn with_sentinel(mut self, axis: Axis, sentinel: Value) -> Self {
        self.sentinel_axis = axis;
        self.sentinel = Some(sentinel);
        self
    }

    pub fn with_sentinel_tolerance(mut self, tolerance: f64) -> Self {
        self.sentinel_tolerance = Some(tolerance);
        self
    }

    pub fn with_rounding(mut self, digits: u32) -> Self {
        self.rounding_digits = Some(digits);
        self
    }

    pub fn with_rounding_order(mut self, order: RoundingOrder) -> Self {
        self.rounding_order = order;
        self
    }

    pub fn with_offset(mut self, axis: Axis, offset: f64) -> Self {
        self.axis_offsets.set(axis, offset);
        self
    }

    pub fn with_required_axes(mut self, axes: impl IntoIterator<Item = Axis>) -> Self {
        self.required_axes = axes.into_iter().collect();
        self
    }

    /// Check the configuration before any record is processed.
    pub fn validate(&self) -> TranscodeResult<()> {
        if self.collection_key.trim().is_empty() {
            return Err(TranscodeError::Configuration(
                "collection key must not be empty".into(),
            ));
        }

        self.axis_aliases.validate()?;

        if let Some(tolerance) = self.sentinel_tolerance {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(TranscodeError::Configuration(format!(
                    "sentinel tolerance must be a non-negative number, got {}",
                    tolerance
                )));
            }
        }

        if matches!(self.sentinel, Some(Value::Array(_)) | Some(Value::Object(_))) {
            return Err(TranscodeError::Configuration(
                "sentinel must be a scalar value".into(),
            ));
        }

        if let Some(digits) = self.rounding_digits {
            if digits > MAX_ROUNDING_DIGITS {
                return Err(TranscodeError::Configuration(format!(
                    "rounding digits must be at most {}, got {}",
                    MAX_ROUNDING_DIGITS, digits
                )));
            }
        }

        for axis in Axis::ALL {
            if let Some(offset) = self.axis_offsets.get(axis) {
                if !offset.is_finite() {
                    return Err(TranscodeError::Configuration(format!(
                        "offset for axis '{}' is not finite",
                        axis
                    )));
                }
            }
        }

        Ok(())
    }
}

// =============================================================================
// Sidecar files
// =============================================================================

/// Spatial reference as written in sidecars: `4326` or `"EPSG:4326"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SrsSpec {
    Epsg(u32),
    Named(String),
}

impl SrsSpec {
    /// Normalized form accepted by GDAL (`EPSG:4326`, or the name as given).
    pub fn to_srs_string(&self) -> String {
        match self {
            SrsSpec::Epsg(code) => format!("EPSG:{}", code),
            SrsSpec::Named(name) => {
                let name = name.trim();
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
                    format!("EPSG:{}", name)
                } else {
                    name.to_string()
                }
            }
        }
    }
}

/// One input file's settings inside a sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarEntry {
    #[serde(default)]
    pub srs: Option<SrsSpec>,
    #[serde(default)]
    pub x_field: Option<String>,
    #[serde(default)]
    pub y_field: Option<String>,
    #[serde(default)]
    pub z_field: Option<String>,
    /// Collection key of the output document.
    #[serde(default)]
    pub geom: Option<String>,
    #[serde(default)]
    pub sentinel: Option<Value>,
    #[serde(default)]
    pub sentinel_tolerance: Option<f64>,
    #[serde(default)]
    pub rounding_digits: Option<u32>,
    #[serde(default)]
    pub x_offset: Option<f64>,
    #[serde(default)]
    pub y_offset: Option<f64>,
    #[serde(default)]
    pub z_offset: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
}

impl SidecarEntry {
    /// Layer this entry's settings over `config`.
    pub fn apply_to(&self, config: &mut TranscodeConfig) {
        Layer {
            collection_key: self.geom.as_deref(),
            fields: [&self.x_field, &self.y_field, &self.z_field],
            sentinel: self.sentinel.as_ref(),
            sentinel_tolerance: self.sentinel_tolerance,
            rounding_digits: self.rounding_digits,
            offsets: [self.x_offset, self.y_offset, self.z_offset],
        }
        .apply_to(config);
    }
}

/// Settings shared by sidecar entries and command-line overrides.
/// Per-axis arrays follow [`Axis::ALL`].
struct Layer<'a> {
    collection_key: Option<&'a str>,
    fields: [&'a Option<String>; 3],
    sentinel: Option<&'a Value>,
    sentinel_tolerance: Option<f64>,
    rounding_digits: Option<u32>,
    offsets: [Option<f64>; 3],
}

impl Layer<'_> {
    fn apply_to(self, config: &mut TranscodeConfig) {
        if let Some(key) = self.collection_key {
            config.collection_key = key.to_string();
        }

        for (axis, field) in Axis::ALL.into_iter().zip(self.fields) {
            if let Some(field) = field {
                *config.axis_aliases.slot_mut(axis) = Some(field.clone());
            }
        }

        if let Some(sentinel) = self.sentinel {
            config.sentinel = Some(sentinel.clone());
        }
        if self.sentinel_tolerance.is_some() {
            config.sentinel_tolerance = self.sentinel_tolerance;
        }
        if self.rounding_digits.is_some() {
            config.rounding_digits = self.rounding_digits;
        }

        for (axis, offset) in Axis::ALL.into_iter().zip(self.offsets) {
            if let Some(offset) = offset {
                config.axis_offsets.set(axis, offset);
            }
        }
    }
}

/// A parsed sidecar file: entries keyed by input file name or stem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SidecarConfig {
    entries: BTreeMap<String, SidecarEntry>,
}

impl SidecarConfig {
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Candidate sidecar paths for an input, in lookup order.
    pub fn candidate_paths(input: &Path) -> [PathBuf; 2] {
        [input.with_extension("yml"), input.with_extension("yaml")]
    }

    /// Entry for the given input, matched by file name first, then stem.
    pub fn entry_for(&self, input: &Path) -> Option<&SidecarEntry> {
        let file_name = input.file_name().and_then(|s| s.to_str());
        let stem = input.file_stem().and_then(|s| s.to_str());
        file_name
            .and_then(|name| self.entries.get(name))
            .or_else(|| stem.and_then(|stem| self.entries.get(stem)))
    }

    /// Load the sidecar entry for `input`.
    ///
    /// Returns `Ok(None)` when no sidecar file exists, and
    /// [`ConfigError::MissingEntry`] when one exists without a matching entry.
    pub fn load_for(input: &Path) -> ConfigResult<Option<(PathBuf, SidecarEntry)>> {
        let Some(path) = Self::candidate_paths(input)
            .into_iter()
            .find(|p| p.is_file())
        else {
            return Ok(None);
        };

        let sidecar = Self::from_file(&path)?;
        match sidecar.entry_for(input) {
            Some(entry) => Ok(Some((path, entry.clone()))),
            None => {
                let key = input
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Err(ConfigError::MissingEntry { file: path, key })
            }
        }
    }
}

// =============================================================================
// Resolution: defaults < sidecar < command line
// =============================================================================

/// Settings given explicitly by the caller (command-line flags).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub collection_key: Option<String>,
    pub x_field: Option<String>,
    pub y_field: Option<String>,
    pub z_field: Option<String>,
    pub sentinel: Option<Value>,
    pub sentinel_axis: Option<Axis>,
    pub sentinel_tolerance: Option<f64>,
    pub rounding_digits: Option<u32>,
    pub offset_first: bool,
    pub x_offset: Option<f64>,
    pub y_offset: Option<f64>,
    pub z_offset: Option<f64>,
    pub source_srs: Option<String>,
}

impl Overrides {
    pub fn apply_to(&self, config: &mut TranscodeConfig) {
        Layer {
            collection_key: self.collection_key.as_deref(),
            fields: [&self.x_field, &self.y_field, &self.z_field],
            sentinel: self.sentinel.as_ref(),
            sentinel_tolerance: self.sentinel_tolerance,
            rounding_digits: self.rounding_digits,
            offsets: [self.x_offset, self.y_offset, self.z_offset],
        }
        .apply_to(config);

        if let Some(axis) = self.sentinel_axis {
            config.sentinel_axis = axis;
        }
        if self.offset_first {
            config.rounding_order = RoundingOrder::OffsetThenRound;
        }
    }
}

/// The effective settings for one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub transcode: TranscodeConfig,
    /// Source spatial reference, when known.
    pub source_srs: Option<String>,
    /// Sidecar file the settings were read from.
    pub sidecar: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
}

/// Merge `base`, the input's sidecar (when `use_sidecar`), and `overrides`.
pub fn resolve(
    input: &Path,
    base: TranscodeConfig,
    overrides: &Overrides,
    use_sidecar: bool,
) -> ConfigResult<ResolvedConfig> {
    let mut transcode = base;
    let mut source_srs = None;
    let mut sidecar = None;
    let mut units = None;

    if use_sidecar {
        if let Some((path, entry)) = SidecarConfig::load_for(input)? {
            entry.apply_to(&mut transcode);
            source_srs = entry.srs.as_ref().map(SrsSpec::to_srs_string);
            units = entry.units.clone();
            sidecar = Some(path);
        }
    }

    overrides.apply_to(&mut transcode);
    if let Some(ref srs) = overrides.source_srs {
        source_srs = Some(SrsSpec::Named(srs.clone()).to_srs_string());
    }

    transcode
        .validate()
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    Ok(ResolvedConfig {
        transcode,
        source_srs,
        sidecar,
        units,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const SIDECAR: &str = r#"
trek_drilldata.csv:
  srs: 4326
  x_field: lon
  y_field: lat
  z_field: elev
  geom: drillholes
  z_offset: -28
dem:
  srs: "EPSG:32611"
  sentinel: 0
"#;

    #[test]
    fn test_aliases_reject_shared_source() {
        let aliases = AxisAliases::identity()
            .with(Axis::X, "lon")
            .with(Axis::Y, "lon");
        let err = aliases.validate().unwrap_err();
        assert!(matches!(err, TranscodeError::Configuration(_)));
        assert!(err.to_string().contains("lon"));
    }

    #[test]
    fn test_aliases_lookup() {
        let aliases = AxisAliases::identity()
            .with(Axis::X, "lon")
            .with(Axis::Z, "elev");
        assert_eq!(aliases.axis_for("elev"), Some(Axis::Z));
        assert_eq!(aliases.axis_for("lat"), None);
        assert!(!aliases.is_identity());
        assert!(AxisAliases::identity().is_identity());
    }

    #[test]
    fn test_validate_rejects_empty_key_and_bad_digits() {
        assert!(TranscodeConfig::new("  ").validate().is_err());
        assert!(TranscodeConfig::default().with_rounding(16).validate().is_err());
        assert!(TranscodeConfig::default()
            .with_sentinel_tolerance(-0.1)
            .validate()
            .is_err());
        assert!(TranscodeConfig::default().with_rounding(2).validate().is_ok());
    }

    #[test]
    fn test_sidecar_lookup_by_file_name_and_stem() {
        let sidecar = SidecarConfig::from_yaml_str(SIDECAR).unwrap();

        let csv = sidecar
            .entry_for(Path::new("/data/trek_drilldata.csv"))
            .unwrap();
        assert_eq!(csv.x_field.as_deref(), Some("lon"));
        assert_eq!(csv.srs, Some(SrsSpec::Epsg(4326)));

        let dem = sidecar.entry_for(Path::new("/data/dem.tif")).unwrap();
        assert_eq!(dem.sentinel, Some(json!(0)));
        assert_eq!(
            dem.srs.as_ref().map(SrsSpec::to_srs_string).as_deref(),
            Some("EPSG:32611")
        );

        assert!(sidecar.entry_for(Path::new("other.csv")).is_none());
    }

    #[test]
    fn test_sidecar_entry_applies_settings() {
        let sidecar = SidecarConfig::from_yaml_str(SIDECAR).unwrap();
        let entry = sidecar
            .entry_for(Path::new("trek_drilldata.csv"))
            .unwrap();

        let mut config = TranscodeConfig::default();
        entry.apply_to(&mut config);

        assert_eq!(config.collection_key, "drillholes");
        assert_eq!(config.axis_aliases.get(Axis::Y), Some("lat"));
        assert_eq!(config.axis_offsets.z, Some(-28.0));
    }

    #[test]
    fn test_overrides_layer_over_sidecar_entry() {
        let sidecar = SidecarConfig::from_yaml_str(SIDECAR).unwrap();
        let entry = sidecar
            .entry_for(Path::new("trek_drilldata.csv"))
            .unwrap();
        let overrides = Overrides {
            x_field: Some("easting".into()),
            sentinel: Some(json!("NODATA")),
            sentinel_axis: Some(Axis::Y),
            z_offset: Some(5.0),
            offset_first: true,
            ..Overrides::default()
        };

        let mut config = TranscodeConfig::default();
        entry.apply_to(&mut config);
        overrides.apply_to(&mut config);

        assert_eq!(config.collection_key, "drillholes");
        assert_eq!(config.axis_aliases.get(Axis::X), Some("easting"));
        assert_eq!(config.axis_aliases.get(Axis::Z), Some("elev"));
        assert_eq!(config.sentinel, Some(json!("NODATA")));
        assert_eq!(config.sentinel_axis, Axis::Y);
        assert_eq!(config.axis_offsets.z, Some(5.0));
        assert_eq!(config.rounding_order, RoundingOrder::OffsetThenRound);
    }

    #[test]
    fn test_srs_normalization() {
        assert_eq!(SrsSpec::Epsg(3857).to_srs_string(), "EPSG:3857");
        assert_eq!(SrsSpec::Named("4326".into()).to_srs_string(), "EPSG:4326");
        assert_eq!(
            SrsSpec::Named("+proj=longlat".into()).to_srs_string(),
            "+proj=longlat"
        );
    }

    #[test]
    fn test_resolve_prefers_overrides_over_sidecar() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("trek_drilldata.csv");
        fs::write(&input, "lon,lat,elev\n").unwrap();
        fs::write(dir.path().join("trek_drilldata.yml"), SIDECAR).unwrap();

        let overrides = Overrides {
            collection_key: Some("holes".into()),
            rounding_digits: Some(2),
            ..Overrides::default()
        };
        let resolved = resolve(&input, TranscodeConfig::default(), &overrides, true).unwrap();

        assert_eq!(resolved.transcode.collection_key, "holes");
        assert_eq!(resolved.transcode.rounding_digits, Some(2));
        assert_eq!(resolved.transcode.axis_aliases.get(Axis::X), Some("lon"));
        assert_eq!(resolved.source_srs.as_deref(), Some("EPSG:4326"));
        assert_eq!(
            resolved.sidecar,
            Some(dir.path().join("trek_drilldata.yml"))
        );
    }

    #[test]
    fn test_resolve_without_sidecar_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("plain.csv");

        let resolved = resolve(
            &input,
            TranscodeConfig::default(),
            &Overrides::default(),
            true,
        )
        .unwrap();
        assert!(resolved.sidecar.is_none());
        assert_eq!(resolved.transcode, TranscodeConfig::default());
    }

    #[test]
    fn test_resolve_missing_entry() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("elsewhere.csv");
        fs::write(dir.path().join("elsewhere.yml"), SIDECAR).unwrap();

        let err = resolve(
            &input,
            TranscodeConfig::default(),
            &Overrides::default(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEntry { .. }));
    }

    #[test]
    fn test_resolve_rejects_ambiguous_overrides() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("plain.csv");
        let overrides = Overrides {
            x_field: Some("lon".into()),
            y_field: Some("lon".into()),
            ..Overrides::default()
        };

        let err = resolve(&input, TranscodeConfig::default(), &overrides, false).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

//! # geoload - geospatial rows to JSON point collections
//!
//! geoload turns tabular geospatial inputs (CSV tables, XYZ dumps, rasters
//! through GDAL) into a single JSON document `{"<key>": [{"x", "y", "z", ...}]}`
//! ready for loading into a 3D scene.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV / TIF  │────▶│   Parser    │────▶│  Transcoder │────▶│  JSON doc   │
//! │  (+ .yml)   │     │ (GDAL, auto)│     │ (alias, nd) │     │ {key: [..]} │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use geoload::{transcode, Record, TranscodeConfig};
//! use serde_json::json;
//!
//! let rows = vec![json!({"x": 1, "y": 2, "z": 3})];
//! let records = rows.into_iter().filter_map(Record::from_value);
//! let out = transcode(records, &TranscodeConfig::default()).unwrap();
//! assert_eq!(out.document.to_json().unwrap(), r#"{"points":[{"x":1,"y":2,"z":3}]}"#);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Records, axes and the Collection Document
//! - [`config`] - Transcoder settings and sidecar YAML
//! - [`parser`] - CSV and XYZ readers
//! - [`transform`] - Row Transcoder and file pipeline
//! - [`reproject`] - GDAL command-line tools
//! - [`logs`] - Run log

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// External tools
pub mod reproject;

// Logging
pub mod logs;

pub use transform::pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    CsvError,
    PipelineError,
    ReprojectError,
    TranscodeError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Axis,
    CollectionDocument,
    Record,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{
    resolve,
    AxisAliases,
    AxisOffsets,
    Overrides,
    ResolvedConfig,
    RoundingOrder,
    SidecarConfig,
    SidecarEntry,
    TranscodeConfig,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    csv_to_records,
    decode_content,
    detect_delimiter,
    detect_encoding,
    parse_bytes_auto,
    parse_csv_file_auto,
    xyz_to_records,
    ParseResult,
    XyzReader,
};

// =============================================================================
// Re-exports - Transcoder
// =============================================================================

pub use transform::{
    build_document,
    filter_sentinel,
    remap_fields,
    transcode,
    transform_numeric,
    try_transcode,
    SentinelFilter,
    TranscodeStats,
    Transcoded,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    convert_csv,
    convert_heightmap,
    convert_raster,
    convert_xyz,
    write_document,
    ConversionReport,
    ConvertOptions,
};

// =============================================================================
// Re-exports - Reprojection
// =============================================================================

pub use reproject::{GdalTools, Reprojector};

//! Transformation module.
//!
//! This module handles rows to Collection Document transcoding:
//! - Aliases: source field names to canonical `x`/`y`/`z`
//! - Sentinel: "no data" sample filtering
//! - Numeric: coercion, rounding and axis offsets
//! - Document: final `{key: [records]}` assembly
//! - Executor: the per-record pipeline tying the steps together
//! - Pipeline: file-level conversions (CSV, XYZ, raster, heightmap)

pub mod aliases;
pub mod document;
pub mod executor;
pub mod numeric;
pub mod pipeline;
pub mod sentinel;

pub use aliases::remap_fields;
pub use document::build_document;
pub use executor::{transcode, transcode_record, try_transcode, TranscodeStats, Transcoded};
pub use numeric::{parse_number, round_to, transform_numeric};
pub use sentinel::{filter_sentinel, SentinelFilter};
pub use pipeline::*;

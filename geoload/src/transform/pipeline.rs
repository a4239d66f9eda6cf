//! High-level pipeline API for file conversions.
//!
//! Each entry point resolves the effective configuration for one input
//! (defaults, sidecar YAML, explicit overrides), reads its rows, runs the
//! transcoder and writes the Collection Document next to the input.
//!
//! # Example
//!
//! ```rust,no_run
//! use geoload::pipeline::{convert_csv, ConvertOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = convert_csv(Path::new("trek_drilldata.csv"), &ConvertOptions::default())?;
//!     println!("Wrote {}", report.output.display());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use serde_json::json;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::executor::{transcode, try_transcode, TranscodeStats, Transcoded};
use crate::config::{resolve, Overrides, ResolvedConfig, TranscodeConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::models::{Axis, CollectionDocument};
use crate::parser::{parse_csv_file_auto, XyzReader};
use crate::reproject::{Reprojector, DEFAULT_TARGET_SRS, HEIGHTMAP_SIZE};

/// Options shared by every conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Settings used when neither the sidecar nor the overrides say otherwise
    pub base: TranscodeConfig,

    /// Explicit settings, applied last
    pub overrides: Overrides,

    /// Read `<stem>.yml` / `<stem>.yaml` next to the input
    pub use_sidecar: bool,

    /// Output path (default: next to the input)
    pub output: Option<PathBuf>,

    /// Spatial reference rasters are warped into
    pub target_srs: String,

    /// Edge length of exported heightmaps
    pub heightmap_size: u32,

    /// Leave reprojected rasters and XYZ dumps on disk
    pub keep_intermediates: bool,

    /// Indent the JSON output
    pub pretty: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            base: TranscodeConfig::default(),
            overrides: Overrides::default(),
            use_sidecar: true,
            output: None,
            target_srs: DEFAULT_TARGET_SRS.to_string(),
            heightmap_size: HEIGHTMAP_SIZE,
            keep_intermediates: false,
            pretty: false,
        }
    }
}

impl ConvertOptions {
    /// Effective configuration for `input` under these options.
    pub fn resolve_for(&self, input: &Path) -> PipelineResult<ResolvedConfig> {
        Ok(resolve(
            input,
            self.base.clone(),
            &self.overrides,
            self.use_sidecar,
        )?)
    }

    /// Like [`resolve_for`](Self::resolve_for), with the raster no-data
    /// sentinel (`0` on `z`) as the default.
    pub fn resolve_for_raster(&self, input: &Path) -> PipelineResult<ResolvedConfig> {
        Ok(resolve(
            input,
            raster_base(&self.base),
            &self.overrides,
            self.use_sidecar,
        )?)
    }
}

/// Result of one file conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Transcoder counters (absent for heightmap exports)
    pub stats: Option<TranscodeStats>,
    /// Source spatial reference used, when known
    pub source_srs: Option<String>,
    /// Scratch files deleted after the run
    pub removed_intermediates: Vec<PathBuf>,
}

// =============================================================================
// Conversions
// =============================================================================

/// Convert a delimited text file to a Collection Document.
pub fn convert_csv(input: &Path, options: &ConvertOptions) -> PipelineResult<ConversionReport> {
    log_info(format!("📖 Reading {}", input.display()));
    let resolved = options.resolve_for(input)?;
    log_resolved(&resolved);

    let parsed = parse_csv_file_auto(input)?;
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!(
        "Detected separator: '{}'",
        format_delimiter(parsed.delimiter)
    ));
    log_success(format!(
        "Read {} rows, {} columns",
        parsed.records.len(),
        parsed.headers.len()
    ));

    let transcoded = transcode(parsed.records, &resolved.transcode)?;
    let output = output_path(input, options, "json");
    finish_document(input, output, transcoded, options, resolved)
}

/// Convert an `x y z` point dump to a Collection Document.
pub fn convert_xyz(input: &Path, options: &ConvertOptions) -> PipelineResult<ConversionReport> {
    log_info(format!("📖 Reading {}", input.display()));
    let resolved = options.resolve_for(input)?;
    log_resolved(&resolved);

    let transcoded = transcode_xyz(input, &resolved.transcode)?;
    let output = output_path(input, options, "json");
    finish_document(input, output, transcoded, options, resolved)
}

/// Convert a raster to a Collection Document of its samples.
///
/// The raster is warped into `options.target_srs` first when its source
/// reference is known and differs. Samples equal to `0` on `z` (the raster
/// no-data value) are dropped unless another sentinel is configured.
pub fn convert_raster<R>(
    input: &Path,
    options: &ConvertOptions,
    tools: &R,
) -> PipelineResult<ConversionReport>
where
    R: Reprojector + ?Sized,
{
    log_info(format!("🗺️  Reading raster {}", input.display()));
    let resolved = options.resolve_for_raster(input)?;
    log_resolved(&resolved);

    let mut scratch = Intermediates::new(options.keep_intermediates);

    let raster = match resolved.source_srs.as_deref() {
        Some(source) if !same_srs(source, &options.target_srs) => {
            log_info(format!("🔄 Reprojecting {} → {}", source, options.target_srs));
            let warped = tools.reproject(input, Some(source), &options.target_srs)?;
            scratch.track(&warped);
            warped
        }
        Some(_) => input.to_path_buf(),
        None => {
            log_warning("Source SRS unknown, using raster coordinates as-is");
            input.to_path_buf()
        }
    };

    log_info("⚙️  Exporting samples...");
    let xyz = tools.to_xyz(&raster)?;
    scratch.track(&xyz);

    let transcoded = transcode_xyz(&xyz, &resolved.transcode)?;
    let output = output_path(input, options, "json");
    let report = finish_document(input, output, transcoded, options, resolved)?;

    Ok(ConversionReport {
        removed_intermediates: scratch.finish(),
        ..report
    })
}

/// Export a raster as a square UInt16 ENVI heightmap in the target SRS.
///
/// Stale `<stem>.raw*` and `<stem>.hdr` outputs are removed first; the
/// reprojected raster is deleted afterwards.
pub fn convert_heightmap<R>(
    input: &Path,
    options: &ConvertOptions,
    tools: &R,
) -> PipelineResult<ConversionReport>
where
    R: Reprojector + ?Sized,
{
    log_info(format!("🏔️  Exporting heightmap for {}", input.display()));
    let resolved = options.resolve_for(input)?;
    if resolved.source_srs.is_none() {
        log_warning("Source SRS unknown, relying on the raster's georeferencing");
    }

    let output = output_path(input, options, "raw");
    for stale in remove_stale_outputs(&output)? {
        log_info_indent(format!("removed stale {}", stale.display()), 1);
    }

    let mut scratch = Intermediates::new(options.keep_intermediates);

    log_info(format!("🔄 Reprojecting → {}", options.target_srs));
    let warped = tools.reproject(input, resolved.source_srs.as_deref(), &options.target_srs)?;
    scratch.track(&warped);

    let size = options.heightmap_size;
    log_info(format!("⚙️  Translating to {}x{} UInt16", size, size));
    let output = tools.to_heightmap(&warped, &output, size)?;
    log_success(format!("💾 Heightmap written to {}", output.display()));

    Ok(ConversionReport {
        input: input.to_path_buf(),
        output,
        stats: None,
        source_srs: resolved.source_srs,
        removed_intermediates: scratch.finish(),
    })
}

// =============================================================================
// Output
// =============================================================================

/// Write `document` to `path` atomically.
///
/// The JSON goes to a temporary file in the same directory which is then
/// renamed over `path`; a failure leaves any previous file untouched.
pub fn write_document(
    document: &CollectionDocument,
    path: &Path,
    pretty: bool,
) -> PipelineResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        if pretty {
            serde_json::to_writer_pretty(&mut writer, document)?;
        } else {
            serde_json::to_writer(&mut writer, document)?;
        }
        writer.write_all(b"\n")?;
        writer.flush()?;
    }

    tmp.persist(path).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}

/// `<dir>/<stem>.<extension>` next to the input.
pub fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    input.with_extension(extension)
}

fn output_path(input: &Path, options: &ConvertOptions, extension: &str) -> PathBuf {
    options
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input, extension))
}

/// Delete `<stem>.raw*` and `<stem>.hdr` files beside `output`.
pub fn remove_stale_outputs(output: &Path) -> PipelineResult<Vec<PathBuf>> {
    let Some(stem) = output.file_stem().and_then(|s| s.to_str()) else {
        return Ok(Vec::new());
    };
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let raw_prefix = format!("{}.raw", stem);
    let header = format!("{}.hdr", stem);

    let mut removed = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        if (name.starts_with(&raw_prefix) || name == header) && path.is_file() {
            fs::remove_file(&path)?;
            removed.push(path);
        }
    }
    removed.sort();
    Ok(removed)
}

// =============================================================================
// Scratch files
// =============================================================================

/// Tracks intermediate files and deletes them when dropped.
///
/// Cleanup runs on success and on early error returns alike, unless the
/// guard was created with `keep`.
#[derive(Debug)]
pub struct Intermediates {
    paths: Vec<PathBuf>,
    keep: bool,
}

impl Intermediates {
    pub fn new(keep: bool) -> Self {
        Self {
            paths: Vec::new(),
            keep,
        }
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Clean up now and report which files were deleted.
    pub fn finish(mut self) -> Vec<PathBuf> {
        self.cleanup()
    }

    fn cleanup(&mut self) -> Vec<PathBuf> {
        if self.keep {
            for path in self.paths.drain(..) {
                log_info_indent(format!("kept {}", path.display()), 1);
            }
            return Vec::new();
        }

        self.paths
            .drain(..)
            .filter(|path| fs::remove_file(path).is_ok())
            .collect()
    }
}

impl Drop for Intermediates {
    fn drop(&mut self) {
        self.cleanup();
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn transcode_xyz(path: &Path, config: &TranscodeConfig) -> PipelineResult<Transcoded> {
    let reader = XyzReader::open(path)?;
    try_transcode(reader.map(|row| row.map_err(PipelineError::from)), config)
}

fn finish_document(
    input: &Path,
    output: PathBuf,
    transcoded: Transcoded,
    options: &ConvertOptions,
    resolved: ResolvedConfig,
) -> PipelineResult<ConversionReport> {
    let Transcoded { document, stats } = transcoded;

    log_success(stats.summary());
    if document.is_empty() {
        log_warning("No records left, writing an empty collection");
    }

    write_document(&document, &output, options.pretty)?;
    log_success(format!(
        "💾 {} records under \"{}\" written to {}",
        document.len(),
        document.key(),
        output.display()
    ));

    Ok(ConversionReport {
        input: input.to_path_buf(),
        output,
        stats: Some(stats),
        source_srs: resolved.source_srs,
        removed_intermediates: Vec::new(),
    })
}

/// Raster dumps mark no-data samples with `0` on `z`.
fn raster_base(base: &TranscodeConfig) -> TranscodeConfig {
    if base.sentinel.is_some() {
        return base.clone();
    }
    base.clone().with_sentinel(Axis::Z, json!(0))
}

fn same_srs(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn log_resolved(resolved: &ResolvedConfig) {
    if let Some(ref sidecar) = resolved.sidecar {
        log_info_indent(format!("settings from {}", sidecar.display()), 1);
    }
    for (axis, source) in resolved.transcode.axis_aliases.pairs() {
        log_info_indent(format!("{} → {}", source, axis), 1);
    }
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

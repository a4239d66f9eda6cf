//! geoload CLI - Convert geospatial rows to JSON point collections
//!
//! # Commands
//!
//! ```bash
//! geoload csv trek_drilldata.csv        # CSV table → trek_drilldata.json
//! geoload xyz dem.xyz                   # x y z dump → dem.json
//! geoload tif dem.tif                   # raster samples → dem.json (via GDAL)
//! geoload raw dem.tif                   # raster → 2049x2049 UInt16 heightmap
//! geoload config trek_drilldata.csv     # show the effective settings
//! ```
//!
//! Per-file settings are read from `<stem>.yml` next to the input; flags
//! override them.

use clap::{Args, Parser, Subcommand};
use geoload::logs::{self, log_error, log_info_indent, log_success, LOG_SINK};
use geoload::models::Axis;
use geoload::reproject::HEIGHTMAP_SIZE;
use geoload::transform::numeric::parse_number;
use geoload::{
    convert_csv, convert_heightmap, convert_raster, convert_xyz, ConversionReport,
    ConvertOptions, GdalTools, Overrides,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the default target SRS.
const TARGET_SRS_ENV: &str = "GEOLOAD_TARGET_SRS";

#[derive(Parser)]
#[command(name = "geoload")]
#[command(version)]
#[command(about = "Convert geospatial rows to JSON point collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Write the run log as JSON to this file
    #[arg(long, global = true)]
    log_json: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV table
    Csv {
        /// Input CSV file
        input: PathBuf,

        #[command(flatten)]
        args: ConvertArgs,
    },

    /// Convert an `x y z` point dump
    Xyz {
        /// Input XYZ file
        input: PathBuf,

        #[command(flatten)]
        args: ConvertArgs,
    },

    /// Convert raster samples to points (requires GDAL)
    Tif {
        /// Input raster (GeoTIFF)
        input: PathBuf,

        #[command(flatten)]
        args: ConvertArgs,
    },

    /// Export a raster as a UInt16 ENVI heightmap (requires GDAL)
    Raw {
        /// Input raster (GeoTIFF)
        input: PathBuf,

        #[command(flatten)]
        args: HeightmapArgs,
    },

    /// Print the effective settings for an input as JSON
    Config {
        /// Input file
        input: PathBuf,

        #[command(flatten)]
        args: ConvertArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct ConvertArgs {
    /// Output file (default: next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the collection in the output document
    #[arg(long)]
    collection_key: Option<String>,

    /// Source field holding x
    #[arg(long)]
    x_field: Option<String>,

    /// Source field holding y
    #[arg(long)]
    y_field: Option<String>,

    /// Source field holding z
    #[arg(long)]
    z_field: Option<String>,

    /// "No data" value; matching records are dropped
    #[arg(long)]
    sentinel: Option<String>,

    /// Axis compared against the sentinel
    #[arg(long)]
    sentinel_axis: Option<Axis>,

    /// Numeric tolerance for sentinel matches
    #[arg(long)]
    sentinel_tolerance: Option<f64>,

    /// Decimal places kept on numeric fields
    #[arg(long = "round")]
    round: Option<u32>,

    /// Apply offsets before rounding instead of after
    #[arg(long)]
    offset_first: bool,

    /// Added to x (may be negative)
    #[arg(long, allow_hyphen_values = true)]
    x_offset: Option<f64>,

    /// Added to y (may be negative)
    #[arg(long, allow_hyphen_values = true)]
    y_offset: Option<f64>,

    /// Added to z (may be negative)
    #[arg(long, allow_hyphen_values = true)]
    z_offset: Option<f64>,

    /// Source spatial reference (e.g. 4326 or EPSG:26912)
    #[arg(long)]
    srs: Option<String>,

    /// Target spatial reference for rasters (default: EPSG:3857)
    #[arg(long)]
    target_srs: Option<String>,

    /// Keep reprojected rasters and XYZ dumps
    #[arg(long)]
    keep_intermediates: bool,

    /// Ignore the `<stem>.yml` sidecar
    #[arg(long)]
    no_sidecar: bool,

    /// Indent the JSON output
    #[arg(long)]
    pretty: bool,
}

impl ConvertArgs {
    fn to_options(&self) -> ConvertOptions {
        let defaults = ConvertOptions::default();
        let target_srs = target_srs(self.target_srs.as_deref(), &defaults);

        ConvertOptions {
            overrides: Overrides {
                collection_key: self.collection_key.clone(),
                x_field: self.x_field.clone(),
                y_field: self.y_field.clone(),
                z_field: self.z_field.clone(),
                sentinel: self.sentinel.as_deref().map(sentinel_value),
                sentinel_axis: self.sentinel_axis,
                sentinel_tolerance: self.sentinel_tolerance,
                rounding_digits: self.round,
                offset_first: self.offset_first,
                x_offset: self.x_offset,
                y_offset: self.y_offset,
                z_offset: self.z_offset,
                source_srs: self.srs.clone(),
            },
            use_sidecar: !self.no_sidecar,
            output: self.output.clone(),
            target_srs,
            keep_intermediates: self.keep_intermediates,
            pretty: self.pretty,
            ..defaults
        }
    }
}

/// Flags of the `raw` subcommand. The export writes no point document, so
/// only the raster settings apply.
#[derive(Args, Debug, Clone)]
struct HeightmapArgs {
    /// Output file (default: `<stem>.raw` next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Source spatial reference (e.g. 4326 or EPSG:26912)
    #[arg(long)]
    srs: Option<String>,

    /// Target spatial reference (default: EPSG:3857)
    #[arg(long)]
    target_srs: Option<String>,

    /// Heightmap edge length in pixels
    #[arg(long, default_value_t = HEIGHTMAP_SIZE)]
    size: u32,

    /// Keep the reprojected raster
    #[arg(long)]
    keep_intermediates: bool,

    /// Ignore the `<stem>.yml` sidecar
    #[arg(long)]
    no_sidecar: bool,
}

impl HeightmapArgs {
    fn to_options(&self) -> ConvertOptions {
        let defaults = ConvertOptions::default();
        let target_srs = target_srs(self.target_srs.as_deref(), &defaults);

        ConvertOptions {
            overrides: Overrides {
                source_srs: self.srs.clone(),
                ..Overrides::default()
            },
            use_sidecar: !self.no_sidecar,
            output: self.output.clone(),
            target_srs,
            heightmap_size: self.size,
            keep_intermediates: self.keep_intermediates,
            ..defaults
        }
    }
}

/// Flag, then `GEOLOAD_TARGET_SRS`, then the built-in default.
fn target_srs(flag: Option<&str>, defaults: &ConvertOptions) -> String {
    flag.map(str::to_string)
        .or_else(|| std::env::var(TARGET_SRS_ENV).ok())
        .unwrap_or_else(|| defaults.target_srs.clone())
}

/// `--sentinel 0` is the number 0; anything non-numeric stays text.
fn sentinel_value(raw: &str) -> Value {
    parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string()))
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logs::set_quiet(cli.quiet);

    let result = match cli.command {
        Commands::Csv { input, args } => cmd_convert(&input, &args, Format::Csv),
        Commands::Xyz { input, args } => cmd_convert(&input, &args, Format::Xyz),
        Commands::Tif { input, args } => cmd_convert(&input, &args, Format::Raster),
        Commands::Raw { input, args } => cmd_heightmap(&input, &args),
        Commands::Config { input, args } => cmd_config(&input, &args),
    };

    // Record the failure in the run log without echoing it twice
    if let (Err(e), true) = (&result, cli.log_json.is_some()) {
        logs::set_quiet(true);
        log_error(e.to_string());
    }

    if let Some(ref path) = cli.log_json {
        if let Err(e) = write_log(path) {
            eprintln!("⚠️  Could not write log to {}: {}", path.display(), e);
        }
    }

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Csv,
    Xyz,
    Raster,
}

fn cmd_convert(
    input: &Path,
    args: &ConvertArgs,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.to_options();
    let tools = GdalTools::from_env();

    let report = match format {
        Format::Csv => convert_csv(input, &options)?,
        Format::Xyz => convert_xyz(input, &options)?,
        Format::Raster => convert_raster(input, &options, &tools)?,
    };

    print_report(&report);
    Ok(())
}

fn cmd_heightmap(input: &Path, args: &HeightmapArgs) -> Result<(), Box<dyn std::error::Error>> {
    let report = convert_heightmap(input, &args.to_options(), &GdalTools::from_env())?;
    print_report(&report);
    Ok(())
}

fn cmd_config(input: &Path, args: &ConvertArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.to_options();
    let resolved = if is_raster(input) {
        options.resolve_for_raster(input)?
    } else {
        options.resolve_for(input)?
    };

    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

fn is_raster(input: &Path) -> bool {
    input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "tif" | "tiff"))
        .unwrap_or(false)
}

fn print_report(report: &ConversionReport) {
    for path in &report.removed_intermediates {
        log_info_indent(format!("🗑️  removed {}", path.display()), 1);
    }
    log_success(format!("✨ Done: {}", report.output.display()));
}

fn write_log(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, LOG_SINK.to_json()?)?;
    Ok(())
}

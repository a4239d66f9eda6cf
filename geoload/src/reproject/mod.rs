//! Raster reprojection and export through the GDAL command-line tools.
//!
//! The pipeline only sees the [`Reprojector`] trait; [`GdalTools`] is the
//! implementation that shells out to `gdalwarp` and `gdal_translate`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use uuid::Uuid;

use crate::error::{ReprojectError, ReprojectResult};
use crate::logs::log_info_indent;

/// Spatial reference used when none is requested.
pub const DEFAULT_TARGET_SRS: &str = "EPSG:3857";

/// Edge length of exported heightmaps, in pixels.
pub const HEIGHTMAP_SIZE: u32 = 2049;

/// Overrides the `gdalwarp` binary.
pub const GDALWARP_ENV: &str = "GEOLOAD_GDALWARP";

/// Overrides the `gdal_translate` binary.
pub const GDAL_TRANSLATE_ENV: &str = "GEOLOAD_GDAL_TRANSLATE";

/// Raster operations the conversions depend on.
pub trait Reprojector {
    /// Warp `input` into `target_srs`. `source_srs` of `None` trusts the
    /// raster's own georeferencing. Returns the new raster's path.
    fn reproject(
        &self,
        input: &Path,
        source_srs: Option<&str>,
        target_srs: &str,
    ) -> ReprojectResult<PathBuf>;

    /// Dump `input` as `x y z` text lines, no-data samples written as `0`.
    fn to_xyz(&self, input: &Path) -> ReprojectResult<PathBuf>;

    /// Export `input` as a `size`×`size` UInt16 ENVI heightmap at `output`.
    fn to_heightmap(&self, input: &Path, output: &Path, size: u32) -> ReprojectResult<PathBuf>;
}

/// [`Reprojector`] backed by the GDAL binaries.
#[derive(Debug, Clone)]
pub struct GdalTools {
    gdalwarp: PathBuf,
    gdal_translate: PathBuf,
}

impl Default for GdalTools {
    fn default() -> Self {
        Self {
            gdalwarp: PathBuf::from("gdalwarp"),
            gdal_translate: PathBuf::from("gdal_translate"),
        }
    }
}

impl GdalTools {
    pub fn new(gdalwarp: impl Into<PathBuf>, gdal_translate: impl Into<PathBuf>) -> Self {
        Self {
            gdalwarp: gdalwarp.into(),
            gdal_translate: gdal_translate.into(),
        }
    }

    /// Binaries from `GEOLOAD_GDALWARP` / `GEOLOAD_GDAL_TRANSLATE`, else from `PATH`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            gdalwarp: std::env::var_os(GDALWARP_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.gdalwarp),
            gdal_translate: std::env::var_os(GDAL_TRANSLATE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.gdal_translate),
        }
    }

    pub fn warp_args(
        input: &Path,
        source_srs: Option<&str>,
        target_srs: &str,
        output: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["--config", "GDAL_CACHEMAX", "1000", "-wm", "1000", "-overwrite"]
            .iter()
            .map(OsString::from)
            .collect();
        if let Some(srs) = source_srs {
            args.push("-s_srs".into());
            args.push(srs.into());
        }
        args.push("-t_srs".into());
        args.push(target_srs.into());
        args.push(input.into());
        args.push(output.into());
        args
    }

    pub fn xyz_args(input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-of", "XYZ", "-a_nodata", "0"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.into());
        args.push(output.into());
        args
    }

    pub fn heightmap_args(input: &Path, output: &Path, size: u32) -> Vec<OsString> {
        let size = size.to_string();
        let mut args: Vec<OsString> = [
            "-ot", "UInt16", "-scale", "-of", "ENVI", "-outsize", size.as_str(), size.as_str(), "-a_nodata",
            "0",
        ]
        .iter()
        .map(OsString::from)
        .collect();
        args.push(input.into());
        args.push(output.into());
        args
    }

    fn run(&self, tool: &Path, args: &[OsString], output: &Path) -> ReprojectResult<PathBuf> {
        let name = tool.display().to_string();
        log_info_indent(
            format!(
                "$ {} {}",
                name,
                args.iter()
                    .map(|a| a.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
            1,
        );

        let result = Command::new(tool)
            .args(args)
            .output()
            .map_err(|source| ReprojectError::Spawn {
                tool: name.clone(),
                source,
            })?;

        if !result.status.success() {
            // A failed run can leave a truncated file behind
            if output.exists() {
                let _ = std::fs::remove_file(output);
            }
            return Err(ReprojectError::ToolFailed {
                tool: name,
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        if !output.exists() {
            return Err(ReprojectError::MissingOutput(output.to_path_buf()));
        }
        Ok(output.to_path_buf())
    }
}

impl Reprojector for GdalTools {
    fn reproject(
        &self,
        input: &Path,
        source_srs: Option<&str>,
        target_srs: &str,
    ) -> ReprojectResult<PathBuf> {
        let output = intermediate_path(input, &srs_tag(target_srs), "tif");
        let args = Self::warp_args(input, source_srs, target_srs, &output);
        self.run(&self.gdalwarp, &args, &output)
    }

    fn to_xyz(&self, input: &Path) -> ReprojectResult<PathBuf> {
        let output = intermediate_path(input, "xyz", "xyz");
        let args = Self::xyz_args(input, &output);
        self.run(&self.gdal_translate, &args, &output)
    }

    fn to_heightmap(&self, input: &Path, output: &Path, size: u32) -> ReprojectResult<PathBuf> {
        let args = Self::heightmap_args(input, output, size);
        self.run(&self.gdal_translate, &args, output)
    }
}

/// Scratch file next to `input`: `<stem>_<tag>_<uuid8>.<ext>`.
pub fn intermediate_path(input: &Path, tag: &str, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "raster".to_string());
    let id = Uuid::new_v4().simple().to_string();
    let name = format!("{}_{}_{}.{}", stem, tag, &id[..8], extension);
    input.with_file_name(name)
}

/// `EPSG:3857` → `3857`, anything else reduced to alphanumerics.
fn srs_tag(srs: &str) -> String {
    let tag: String = srs
        .trim_start_matches("EPSG:")
        .trim_start_matches("epsg:")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if tag.is_empty() {
        "warped".to_string()
    } else {
        tag.to_lowercase()
    }
}

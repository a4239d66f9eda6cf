//! Error types for the geoload conversion pipeline.
//!
//! - [`CsvError`] - row parsing errors (CSV and XYZ inputs)
//! - [`TranscodeError`] - Row Transcoder errors
//! - [`ConfigError`] - sidecar configuration errors
//! - [`ReprojectError`] - external GDAL tool errors
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Lower-level errors convert into [`PipelineError`] through `From`,
//! so `?` works across module boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Row Parsing Errors
// =============================================================================

/// Errors while reading rows from a CSV or XYZ input.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read the input.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    /// The input holds no data at all.
    #[error("Input file is empty")]
    EmptyFile,

    /// The header row is missing or blank.
    #[error("No headers found in CSV")]
    NoHeaders,

    /// A row could not be parsed.
    #[error("Line {line}: {message}")]
    Parse { line: u64, message: String },
}

impl CsvError {
    pub fn parse(line: u64, message: impl Into<String>) -> Self {
        CsvError::Parse {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(io) => CsvError::Io(io),
            kind => CsvError::parse(line, format!("{:?}", kind)),
        }
    }
}

// =============================================================================
// Transcoder Errors
// =============================================================================

/// Errors raised by the Row Transcoder.
///
/// `row` is the zero-based position of the record in the input sequence.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Ambiguous or invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A record lacks a required axis field.
    #[error("Record {row} is missing field '{field}'")]
    MissingField { row: usize, field: String },

    /// An axis field holds a value that is not a number.
    #[error("Record {row}: field '{field}' is not numeric (value '{value}')")]
    InvalidNumber {
        row: usize,
        field: String,
        value: String,
    },

    /// A value cannot be represented in the output document.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading the per-file sidecar configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the sidecar file.
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The sidecar is not valid YAML for the expected shape.
    #[error("Config YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The sidecar exists but has no entry for the input file.
    #[error("No entry '{key}' in {}", file.display())]
    MissingEntry { file: PathBuf, key: String },

    /// A setting has an unusable value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Reprojection Errors
// =============================================================================

/// Errors from the external geospatial tools.
#[derive(Debug, Error)]
pub enum ReprojectError {
    /// The tool binary could not be started.
    #[error("Cannot run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited with a failure status.
    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The tool reported success but its output file is absent.
    #[error("Expected output not produced: {}", .0.display())]
    MissingOutput(PathBuf),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level conversion errors returned by [`crate::transform::pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Row parsing error.
    #[error("Parse error: {0}")]
    Csv(#[from] CsvError),

    /// Transcoder error.
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// External tool error.
    #[error("Reprojection error: {0}")]
    Reproject(#[from] ReprojectError),

    /// Output serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error around the input or output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for row parsing.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for transcoder operations.
pub type TranscodeResult<T> = Result<T, TranscodeError>;

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for external tool calls.
pub type ReprojectResult<T> = Result<T, ReprojectError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let transcode_err = TranscodeError::MissingField {
            row: 3,
            field: "z".into(),
        };
        let pipeline_err: PipelineError = transcode_err.into();
        let msg = pipeline_err.to_string();
        assert!(msg.contains("Record 3"));
        assert!(msg.contains("'z'"));
    }

    #[test]
    fn test_tool_failure_format() {
        let err = ReprojectError::ToolFailed {
            tool: "gdalwarp".into(),
            status: "exit status: 1".into(),
            stderr: "ERROR 4: dem.tif: No such file".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("gdalwarp"));
        assert!(msg.contains("No such file"));
    }

    #[test]
    fn test_missing_entry_names_file_and_key() {
        let err = ConfigError::MissingEntry {
            file: PathBuf::from("/data/dem.yml"),
            key: "dem.tif".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("dem.tif"));
        assert!(msg.contains("/data/dem.yml"));
    }
}

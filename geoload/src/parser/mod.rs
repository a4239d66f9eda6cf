//! Row readers for tabular inputs.
//!
//! - CSV with encoding and delimiter auto-detection → [`Record`]s of strings
//! - XYZ point dumps (`gdal_translate -of XYZ`) → [`Record`]s `{x, y, z}`
//!
//! No field renaming or filtering happens here; that is the transcoder's job.

use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::models::{Axis, Record};
use crate::transform::numeric::parse_number;

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows, one record per data line
    pub records: Vec<Record>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => String::from_utf8_lossy(bytes).into_owned(),
        },
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Values are trimmed and kept as strings. Short rows are padded with `""`,
/// extra columns are ignored, blank lines are skipped.
///
/// # Example
/// ```
/// use geoload::parser::csv_to_records;
///
/// let rows = csv_to_records("lon;lat\n10;20", ';').unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].get("lat").unwrap(), "20");
/// ```
pub fn csv_to_records(content: &str, delimiter: char) -> CsvResult<Vec<Record>> {
    parse_string_with_metadata(content, delimiter, "utf-8".to_string()).map(|r| r.records)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_string_with_metadata(&content, delimiter, encoding)
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse CSV text with an explicit delimiter and return metadata.
pub fn parse_string_with_metadata(
    content: &str,
    delimiter: char,
    encoding: String,
) -> CsvResult<ParseResult> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = u8::try_from(delimiter)
        .map_err(|_| CsvError::parse(1, format!("unsupported delimiter '{}'", delimiter)))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        let record: Record = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = row.get(i).unwrap_or("");
                (header.clone(), Value::String(value.to_string()))
            })
            .collect();
        records.push(record);
    }

    Ok(ParseResult {
        records,
        encoding,
        delimiter: char::from(delimiter),
        headers,
    })
}

// =============================================================================
// XYZ point dumps
// =============================================================================

/// Streaming reader over `x y z` lines, as written by the GDAL XYZ driver.
///
/// Yields one record per non-blank line with numeric `x`, `y`, `z` fields.
/// Columns may be separated by whitespace or commas.
pub struct XyzReader<R> {
    lines: std::io::Lines<R>,
    line: u64,
}

impl XyzReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> CsvResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> XyzReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }
}

impl<R: BufRead> Iterator for XyzReader<R> {
    type Item = CsvResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(CsvError::Io(e))),
            };
            self.line += 1;

            if line.trim().is_empty() {
                continue;
            }
            return Some(parse_xyz_line(&line, self.line));
        }
    }
}

/// Parse one `x y z` line.
pub fn parse_xyz_line(line: &str, line_number: u64) -> CsvResult<Record> {
    let columns: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();

    if columns.len() != 3 {
        return Err(CsvError::parse(
            line_number,
            format!("expected 3 columns, found {}", columns.len()),
        ));
    }

    Axis::ALL
        .into_iter()
        .zip(columns)
        .map(|(axis, raw)| {
            parse_number(raw)
                .map(|value| (axis.name(), value))
                .ok_or_else(|| {
                    CsvError::parse(
                        line_number,
                        format!("column '{}' is not a number: '{}'", axis, raw),
                    )
                })
        })
        .collect()
}

/// Parse a whole XYZ text into records.
pub fn xyz_to_records(content: &str) -> CsvResult<Vec<Record>> {
    XyzReader::new(content.as_bytes()).collect()
}

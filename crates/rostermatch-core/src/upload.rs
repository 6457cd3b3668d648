use std::path::{Path, PathBuf};

use tracing::debug;

use crate::encoding::{read_to_string_with_fallback, TextEncoding};
use crate::error::Result;
use crate::phone::normalize_phone;

pub const DEFAULT_UPLOAD_DELIMITER: u8 = b',';

/// One observed number plus the file it came from. The source is provenance
/// for diagnostics only and never reaches the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub number: String,
    pub source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub delimiter: u8,
    /// Header names accepted as the phone-bearing column, matched
    /// case-insensitively. No match falls back to column 0.
    pub phone_columns: Vec<String>,
    pub encodings: Vec<TextEncoding>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_UPLOAD_DELIMITER,
            phone_columns: vec![
                "number".to_string(),
                "phone".to_string(),
                "f_extension".to_string(),
            ],
            encodings: TextEncoding::DEFAULT_ORDER.to_vec(),
        }
    }
}

/// Extract upload numbers from `path`. `.txt` files are one raw number per
/// line; anything else is a delimited table with a header. Malformed rows are
/// skipped, only decode exhaustion errors out.
pub fn read_upload(path: &Path, options: &UploadOptions) -> Result<Vec<UploadRecord>> {
    let text = read_to_string_with_fallback(path, &options.encodings)?;
    if is_line_oriented(path) {
        Ok(read_lines(path, &text))
    } else {
        read_table(path, &text, options)
    }
}

fn is_line_oriented(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

fn read_lines(path: &Path, text: &str) -> Vec<UploadRecord> {
    let mut numbers = Vec::new();
    for line in text.lines() {
        let raw = line.trim();
        if raw.is_empty() {
            debug!(path = %path.display(), "blank upload line, skipped");
            continue;
        }
        match normalize_phone(raw) {
            Some(number) => numbers.push(UploadRecord {
                number,
                source: path.to_path_buf(),
            }),
            None => {
                debug!(path = %path.display(), value = raw, "invalid upload number, skipped");
            }
        }
    }
    numbers
}

fn read_table(path: &Path, text: &str, options: &UploadOptions) -> Result<Vec<UploadRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => {
            debug!(path = %path.display(), "empty upload file");
            return Ok(Vec::new());
        }
    };

    let phone_column = header
        .iter()
        .position(|field| {
            options
                .phone_columns
                .iter()
                .any(|name| name.eq_ignore_ascii_case(field))
        })
        .unwrap_or_else(|| {
            debug!(path = %path.display(), "no phone column in header, using column 0");
            0
        });

    let mut numbers = Vec::new();
    for result in records {
        let record = result?;
        let cell = record.get(phone_column).unwrap_or("").trim();
        if cell.is_empty() {
            debug!(path = %path.display(), "empty upload cell, skipped");
            continue;
        }
        match normalize_phone(cell) {
            Some(number) => numbers.push(UploadRecord {
                number,
                source: path.to_path_buf(),
            }),
            None => {
                debug!(path = %path.display(), value = cell, "invalid upload number, skipped");
            }
        }
    }
    Ok(numbers)
}

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::encoding::{read_to_string_with_fallback, TextEncoding};
use crate::error::{CoreError, Result};
use crate::phone::normalize_phone;

pub const DEFAULT_ROSTER_DELIMITER: u8 = b';';
pub const DEFAULT_PHONE_DELIMITERS: [char; 2] = [';', '#'];
pub const DEFAULT_MIN_PHONE_DIGITS: usize = 6;

/// One person attached to a canonical number. `enabled` is passthrough text,
/// never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRecord {
    pub display_name: String,
    pub email: String,
    pub enabled: String,
}

/// Canonical number -> records, bucket order = file order.
pub type RosterIndex = HashMap<String, Vec<RosterRecord>>;

/// A roster row whose phone sub-token failed normalization or the length
/// check, kept as the quoted reconstruction of the whole original row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnomalyRecord {
    pub raw_row: String,
}

/// Names of the four required roster columns. Presence is validated, order is
/// not; positions are resolved from the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterColumns {
    pub display_name: String,
    pub phone: String,
    pub email: String,
    pub enabled: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            display_name: "DisplayName".to_string(),
            phone: "telephoneNumber".to_string(),
            email: "mail".to_string(),
            enabled: "Enabled".to_string(),
        }
    }
}

impl RosterColumns {
    fn required(&self) -> Vec<String> {
        vec![
            self.display_name.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.enabled.clone(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct RosterOptions {
    pub delimiter: u8,
    pub columns: RosterColumns,
    /// Candidate sub-number delimiters, tried in order; first one present in
    /// the phone field wins.
    pub phone_delimiters: Vec<char>,
    pub min_phone_digits: usize,
    pub encodings: Vec<TextEncoding>,
}

impl Default for RosterOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_ROSTER_DELIMITER,
            columns: RosterColumns::default(),
            phone_delimiters: DEFAULT_PHONE_DELIMITERS.to_vec(),
            min_phone_digits: DEFAULT_MIN_PHONE_DIGITS,
            encodings: TextEncoding::DEFAULT_ORDER.to_vec(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RosterOutcome {
    pub index: RosterIndex,
    pub anomalies: Vec<AnomalyRecord>,
}

struct ColumnIndices {
    display_name: usize,
    phone: usize,
    email: usize,
    enabled: usize,
}

impl ColumnIndices {
    fn span(&self) -> usize {
        self.display_name
            .max(self.phone)
            .max(self.email)
            .max(self.enabled)
            + 1
    }
}

/// Parse the roster export into a number-keyed multi-map. Decode exhaustion
/// and header problems are hard errors; malformed phone sub-tokens become
/// [`AnomalyRecord`]s and short or phoneless rows are skipped.
pub fn parse_roster(path: &Path, options: &RosterOptions) -> Result<RosterOutcome> {
    let text = read_to_string_with_fallback(path, &options.encodings)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?,
        None => {
            return Err(CoreError::Format {
                path: path.to_path_buf(),
                expected: options.columns.required(),
                found: Vec::new(),
            })
        }
    };
    let indices = resolve_columns(&header, &options.columns, path)?;
    let span = indices.span();

    let mut outcome = RosterOutcome::default();
    for result in records {
        let record = result?;
        if record.len() < span {
            debug!(row = ?record, "roster row too short, skipped");
            continue;
        }

        let display_name = &record[indices.display_name];
        let phone_field = &record[indices.phone];
        let email = &record[indices.email];
        let enabled = &record[indices.enabled];
        if phone_field.is_empty() {
            continue;
        }

        for token in split_phone_field(phone_field, &options.phone_delimiters) {
            if token.trim().is_empty() {
                debug!(row = ?record, "blank phone sub-token, skipped");
                continue;
            }
            match normalize_phone(token) {
                Some(number) if number.len() >= options.min_phone_digits => {
                    outcome
                        .index
                        .entry(number)
                        .or_default()
                        .push(RosterRecord {
                            display_name: display_name.to_string(),
                            email: email.to_string(),
                            enabled: enabled.to_string(),
                        });
                }
                _ => {
                    debug!(token, "invalid roster number, recording anomaly");
                    outcome.anomalies.push(AnomalyRecord {
                        raw_row: format!(
                            "\"{display_name}\";\"{phone_field}\";\"{email}\";\"{enabled}\""
                        ),
                    });
                }
            }
        }
    }

    Ok(outcome)
}

fn resolve_columns(
    header: &csv::StringRecord,
    columns: &RosterColumns,
    path: &Path,
) -> Result<ColumnIndices> {
    let cleaned: Vec<String> = header.iter().map(clean_header_field).collect();
    debug!(header = ?cleaned, "roster header");

    let find = |name: &str| cleaned.iter().position(|field| field == name);
    match (
        find(&columns.display_name),
        find(&columns.phone),
        find(&columns.email),
        find(&columns.enabled),
    ) {
        (Some(display_name), Some(phone), Some(email), Some(enabled)) => Ok(ColumnIndices {
            display_name,
            phone,
            email,
            enabled,
        }),
        _ => Err(CoreError::Format {
            path: path.to_path_buf(),
            expected: columns.required(),
            found: cleaned,
        }),
    }
}

// Header fields may carry byte-order-mark residue or literal quotes when the
// export quoting disagrees with the configured delimiter.
fn clean_header_field(field: &str) -> String {
    field
        .trim()
        .trim_matches('\u{feff}')
        .trim_matches('"')
        .to_string()
}

fn split_phone_field<'a>(field: &'a str, delimiters: &[char]) -> Vec<&'a str> {
    for &delimiter in delimiters {
        if field.contains(delimiter) {
            return field.split(delimiter).collect();
        }
    }
    vec![field]
}

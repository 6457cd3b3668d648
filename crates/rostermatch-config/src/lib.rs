use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rostermatch_core::{ReportOptions, RosterOptions, TextEncoding, UploadOptions};
use serde::Deserialize;
use thiserror::Error;

const APP_DIR: &str = "rostermatch";
const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_REPORT_PREFIX: &str = "output";
pub const DEFAULT_MAX_ANOMALY_LOGS: usize = 5;

/// Fully resolved runtime configuration: the core pipeline options plus the
/// directory layout and report/log conventions.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub roster: RosterOptions,
    pub upload: UploadOptions,
    pub report: ReportOptions,
    pub report_prefix: String,
    pub uploads_dir: PathBuf,
    pub results_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub max_anomaly_logs: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            roster: RosterOptions::default(),
            upload: UploadOptions::default(),
            report: ReportOptions::default(),
            report_prefix: DEFAULT_REPORT_PREFIX.to_string(),
            uploads_dir: PathBuf::from("data/phone_data"),
            results_dir: PathBuf::from("data/results"),
            archive_dir: PathBuf::from("data/archive"),
            logs_dir: PathBuf::from("logs"),
            max_anomaly_logs: DEFAULT_MAX_ANOMALY_LOGS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing home directory")]
    MissingHomeDir,
    #[error("invalid config path: {0}")]
    InvalidConfigPath(PathBuf),
    #[error("config file not found: {0}")]
    MissingConfigFile(PathBuf),
    #[error("delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(String),
    #[error("phone delimiter must be a single character, got {0:?}")]
    InvalidPhoneDelimiter(String),
    #[error("unknown encoding name: {0:?}")]
    UnknownEncoding(String),
    #[error("encodings list cannot be empty")]
    EmptyEncodings,
    #[error("column name for {0} cannot be empty")]
    EmptyColumnName(&'static str),
    #[error("upload phone column list cannot be empty")]
    EmptyUploadColumns,
    #[error("report needs exactly 4 column names, got {0}")]
    InvalidReportColumns(usize),
    #[error("min_phone_digits must be at least 1")]
    InvalidMinPhoneDigits,
    #[error("max_anomaly_logs must be at least 1")]
    InvalidMaxAnomalyLogs,
    #[error("file mode {0:o} has bits outside 0o777")]
    InvalidFileMode(u32),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    report_prefix: Option<String>,
    uploads_dir: Option<PathBuf>,
    results_dir: Option<PathBuf>,
    archive_dir: Option<PathBuf>,
    logs_dir: Option<PathBuf>,
    max_anomaly_logs: Option<usize>,
    encodings: Option<Vec<String>>,
    roster: Option<RosterFile>,
    upload: Option<UploadFile>,
    report: Option<ReportFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RosterFile {
    delimiter: Option<String>,
    display_name_column: Option<String>,
    phone_column: Option<String>,
    email_column: Option<String>,
    enabled_column: Option<String>,
    phone_delimiters: Option<Vec<String>>,
    min_phone_digits: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UploadFile {
    delimiter: Option<String>,
    phone_columns: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReportFile {
    delimiter: Option<String>,
    columns: Option<Vec<String>>,
    file_mode: Option<u32>,
}

/// Load configuration, merging an optional TOML file over the defaults.
///
/// Without an explicit path the file is looked up under the XDG config
/// directory and its absence is fine; an explicit `--config` path must exist.
pub fn load(config_path: Option<PathBuf>) -> Result<AppConfig> {
    let required = config_path.is_some();
    let path = match resolve_config_path(config_path) {
        Ok(path) => path,
        Err(ConfigError::MissingHomeDir) if !required => return Ok(AppConfig::default()),
        Err(ConfigError::InvalidConfigPath(_)) if !required => return Ok(AppConfig::default()),
        Err(err) => return Err(err),
    };
    match load_at_path(&path, required)? {
        Some(config) => Ok(config),
        None => Ok(AppConfig::default()),
    }
}

pub fn resolve_config_path(custom: Option<PathBuf>) -> Result<PathBuf> {
    match custom {
        Some(path) => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidConfigPath(path));
            }
            Ok(path)
        }
        None => {
            let base = if let Some(dir) = env::var_os("XDG_CONFIG_HOME") {
                let path = PathBuf::from(dir);
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidConfigPath(path));
                }
                path
            } else {
                let home = dirs::home_dir().ok_or(ConfigError::MissingHomeDir)?;
                home.join(".config")
            };
            Ok(base.join(APP_DIR).join(CONFIG_FILENAME))
        }
    }
}

fn load_at_path(path: &Path, required: bool) -> Result<Option<AppConfig>> {
    if !path.exists() {
        if required {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: ConfigFile = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(merge_config(parsed)?))
}

fn merge_config(parsed: ConfigFile) -> Result<AppConfig> {
    let mut config = AppConfig::default();

    if let Some(prefix) = parsed.report_prefix {
        config.report_prefix = prefix;
    }
    if let Some(dir) = parsed.uploads_dir {
        config.uploads_dir = dir;
    }
    if let Some(dir) = parsed.results_dir {
        config.results_dir = dir;
    }
    if let Some(dir) = parsed.archive_dir {
        config.archive_dir = dir;
    }
    if let Some(dir) = parsed.logs_dir {
        config.logs_dir = dir;
    }
    if let Some(max_logs) = parsed.max_anomaly_logs {
        if max_logs == 0 {
            return Err(ConfigError::InvalidMaxAnomalyLogs);
        }
        config.max_anomaly_logs = max_logs;
    }
    if let Some(names) = parsed.encodings {
        let encodings = parse_encodings(&names)?;
        config.roster.encodings = encodings.clone();
        config.upload.encodings = encodings;
    }

    if let Some(roster) = parsed.roster {
        if let Some(raw) = roster.delimiter {
            config.roster.delimiter = parse_delimiter(&raw)?;
        }
        if let Some(name) = roster.display_name_column {
            config.roster.columns.display_name = require_column(name, "display name")?;
        }
        if let Some(name) = roster.phone_column {
            config.roster.columns.phone = require_column(name, "phone")?;
        }
        if let Some(name) = roster.email_column {
            config.roster.columns.email = require_column(name, "email")?;
        }
        if let Some(name) = roster.enabled_column {
            config.roster.columns.enabled = require_column(name, "enabled")?;
        }
        if let Some(raw) = roster.phone_delimiters {
            config.roster.phone_delimiters = parse_phone_delimiters(&raw)?;
        }
        if let Some(min_digits) = roster.min_phone_digits {
            if min_digits == 0 {
                return Err(ConfigError::InvalidMinPhoneDigits);
            }
            config.roster.min_phone_digits = min_digits;
        }
    }

    if let Some(upload) = parsed.upload {
        if let Some(raw) = upload.delimiter {
            config.upload.delimiter = parse_delimiter(&raw)?;
        }
        if let Some(columns) = upload.phone_columns {
            if columns.is_empty() {
                return Err(ConfigError::EmptyUploadColumns);
            }
            config.upload.phone_columns = columns;
        }
    }

    if let Some(report) = parsed.report {
        if let Some(raw) = report.delimiter {
            config.report.delimiter = parse_delimiter(&raw)?;
        }
        if let Some(columns) = report.columns {
            let count = columns.len();
            let columns: [String; 4] = columns
                .try_into()
                .map_err(|_| ConfigError::InvalidReportColumns(count))?;
            config.report.columns = columns;
        }
        if let Some(mode) = report.file_mode {
            if mode & !0o777 != 0 {
                return Err(ConfigError::InvalidFileMode(mode));
            }
            config.report.file_mode = mode;
        }
    }

    Ok(config)
}

fn parse_delimiter(raw: &str) -> Result<u8> {
    let mut bytes = raw.bytes();
    match (bytes.next(), bytes.next()) {
        (Some(byte), None) => Ok(byte),
        _ => Err(ConfigError::InvalidDelimiter(raw.to_string())),
    }
}

fn parse_phone_delimiters(raw: &[String]) -> Result<Vec<char>> {
    raw.iter()
        .map(|value| {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Ok(ch),
                _ => Err(ConfigError::InvalidPhoneDelimiter(value.clone())),
            }
        })
        .collect()
}

fn parse_encodings(names: &[String]) -> Result<Vec<TextEncoding>> {
    if names.is_empty() {
        return Err(ConfigError::EmptyEncodings);
    }
    names
        .iter()
        .map(|name| {
            TextEncoding::parse(name).ok_or_else(|| ConfigError::UnknownEncoding(name.clone()))
        })
        .collect()
}

fn require_column(name: String, field: &'static str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(ConfigError::EmptyColumnName(field));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::{load_at_path, merge_config, ConfigError, ConfigFile};
    use rostermatch_core::TextEncoding;
    use std::fs;
    use tempfile::TempDir;

    fn parse(contents: &str) -> ConfigFile {
        toml::from_str(contents).expect("parse toml")
    }

    #[test]
    fn merge_config_applies_values() {
        let parsed = parse(
            "report_prefix = \"matched\"\n\
             max_anomaly_logs = 9\n\
             encodings = [\"utf-8\", \"windows-1251\"]\n\
             [roster]\n\
             delimiter = \",\"\n\
             phone_column = \"tel\"\n\
             min_phone_digits = 4\n\
             [report]\n\
             file_mode = 0o644\n",
        );
        let merged = merge_config(parsed).expect("merge");
        assert_eq!(merged.report_prefix, "matched");
        assert_eq!(merged.max_anomaly_logs, 9);
        assert_eq!(
            merged.roster.encodings,
            vec![TextEncoding::Utf8, TextEncoding::Windows1251]
        );
        assert_eq!(merged.roster.delimiter, b',');
        assert_eq!(merged.roster.columns.phone, "tel");
        assert_eq!(merged.roster.columns.email, "mail");
        assert_eq!(merged.roster.min_phone_digits, 4);
        assert_eq!(merged.report.file_mode, 0o644);
    }

    #[test]
    fn merge_config_rejects_wide_delimiters() {
        let parsed = parse("[roster]\ndelimiter = \";;\"\n");
        let err = merge_config(parsed).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDelimiter(_)));
    }

    #[test]
    fn merge_config_rejects_unknown_encodings() {
        let parsed = parse("encodings = [\"koi8-r\"]\n");
        let err = merge_config(parsed).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownEncoding(_)));
    }

    #[test]
    fn merge_config_rejects_wrong_report_column_count() {
        let parsed = parse("[report]\ncolumns = [\"a\", \"b\"]\n");
        let err = merge_config(parsed).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidReportColumns(2)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "no_such_key = 1\n").expect("write config");

        let err = load_at_path(&path, true).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_at_path_requires_file_when_requested() {
        let temp = TempDir::new().expect("tempdir");
        let missing = temp.path().join("config.toml");
        let err = load_at_path(&missing, true).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfigFile(_)));
    }

    #[test]
    fn load_at_path_parses_toml() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "uploads_dir = \"incoming\"\n").expect("write config");

        let config = load_at_path(&path, true).expect("load").expect("config");
        assert_eq!(config.uploads_dir, std::path::PathBuf::from("incoming"));
    }
}

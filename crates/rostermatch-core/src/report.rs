use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::matching::MatchRow;

pub const DEFAULT_REPORT_DELIMITER: u8 = b',';
pub const DEFAULT_FILE_MODE: u32 = 0o666;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub delimiter: u8,
    /// Header names for number, full name, email and the active flag, in that
    /// order.
    pub columns: [String; 4],
    pub file_mode: u32,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_REPORT_DELIMITER,
            columns: [
                "Номер".to_string(),
                "ФИО".to_string(),
                "email".to_string(),
                "Активный".to_string(),
            ],
            file_mode: DEFAULT_FILE_MODE,
        }
    }
}

/// Write the report sorted by number (string order, stable so ties keep match
/// order) and return the data-row count. The file is written next to the
/// destination and renamed onto it; an interrupted run never leaves a partial
/// report at the final path.
pub fn write_report(rows: &[MatchRow], path: &Path, options: &ReportOptions) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut sorted: Vec<&MatchRow> = rows.iter().collect();
    sorted.sort_by(|a, b| a.number.cmp(&b.number));

    let tmp_path = temp_path(path);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_path(&tmp_path)?;
    writer.write_record(&options.columns)?;
    for row in &sorted {
        writer.write_record([&row.number, &row.display_name, &row.email, &row.enabled])?;
    }
    writer.flush()?;
    drop(writer);

    fs::rename(&tmp_path, path)?;
    set_file_mode(path, options.file_mode)?;
    debug!(path = %path.display(), rows = sorted.len(), "report written");
    Ok(sorted.len())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(unix)]
fn set_file_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

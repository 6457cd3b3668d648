use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context as _, Result};
use chrono::Local;
use rostermatch_core::AnomalyRecord;
use tracing::warn;

const ANOMALY_LOG_PREFIX: &str = "anomalies_";

/// Append one line per anomaly, each wrapping the reconstructed roster row.
pub fn write_anomaly_log(
    logs_dir: &Path,
    run_stamp: &str,
    anomalies: &[AnomalyRecord],
    file_mode: u32,
) -> Result<PathBuf> {
    fs::create_dir_all(logs_dir)
        .with_context(|| format!("create logs dir {}", logs_dir.display()))?;
    let path = logs_dir.join(format!("{ANOMALY_LOG_PREFIX}{run_stamp}.log"));
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open anomaly log {}", path.display()))?;

    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    for anomaly in anomalies {
        writeln!(file, "[{stamp}] invalid number in row: {}", anomaly.raw_row)?;
    }
    set_file_mode(&path, file_mode)?;
    Ok(path)
}

/// Drop the oldest anomaly logs so that, counting this run's file, at most
/// `keep` remain. Removal failures are logged and ignored.
pub fn prune_anomaly_logs(logs_dir: &Path, keep: usize) {
    let Ok(entries) = fs::read_dir(logs_dir) else {
        return;
    };
    let mut logs: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name().to_str().is_some_and(|name| {
                name.starts_with(ANOMALY_LOG_PREFIX) && name.ends_with(".log")
            })
        })
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|meta| meta.modified()).ok()?;
            Some((modified, entry.path()))
        })
        .collect();
    logs.sort();

    while logs.len() >= keep {
        let (_, path) = logs.remove(0);
        if let Err(err) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %err, "failed to prune old anomaly log");
        }
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use rostermatch_core::AnomalyRecord;
    use tempfile::TempDir;

    #[test]
    fn anomaly_log_wraps_each_row() {
        let temp = TempDir::new().expect("temp dir");
        let anomalies = vec![
            AnomalyRecord {
                raw_row: "\"Ivanov Ivan\";\"12\";\"ivanov@x.com\";\"True\"".to_string(),
            },
            AnomalyRecord {
                raw_row: "\"Petrov Petr\";\"ext\";\"petrov@x.com\";\"False\"".to_string(),
            },
        ];

        let path = write_anomaly_log(temp.path(), "2024-01-01_00-00-00", &anomalies, 0o666)
            .expect("write log");
        let contents = fs::read_to_string(&path).expect("read log");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"Ivanov Ivan\";\"12\";\"ivanov@x.com\";\"True\""));
        assert!(lines[1].contains("invalid number in row"));
    }

    #[test]
    fn prune_keeps_room_for_the_next_log() {
        let temp = TempDir::new().expect("temp dir");
        for i in 0..6 {
            fs::write(temp.path().join(format!("anomalies_{i}.log")), "x").expect("write");
        }
        fs::write(temp.path().join("unrelated.log"), "x").expect("write");

        prune_anomaly_logs(temp.path(), 5);

        let remaining = fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("anomalies_"))
            })
            .count();
        assert_eq!(remaining, 4);
        assert!(temp.path().join("unrelated.log").exists());
    }
}

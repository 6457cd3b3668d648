mod error;
mod files;
mod logs;

use std::collections::HashSet;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context as _, Result};
use chrono::Local;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::{exit_code_for, nothing_to_do, report_error};
use rostermatch_config as config;
use rostermatch_core::{match_phones, parse_roster, read_upload, write_report, UploadRecord};

const RUN_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

#[derive(Debug, Parser)]
#[command(
    name = "rostermatch",
    version,
    about = "Reconcile uploaded phone numbers against a roster export"
)]
struct Cli {
    /// Path to the roster export file
    roster: PathBuf,
    /// Directory scanned for upload files (overrides config)
    #[arg(long)]
    uploads_dir: Option<PathBuf>,
    /// Directory receiving the report (overrides config)
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Explicit config file path
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
    /// Leave consumed upload files where they are
    #[arg(long)]
    no_archive: bool,
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    upload_files: usize,
    numbers_read: usize,
    unique_numbers: usize,
    matched_rows: usize,
    unmatched_rows: usize,
    anomalies: usize,
    rows_written: usize,
    extra_rows: usize,
    report_path: PathBuf,
    elapsed_seconds: u64,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    init_logging(verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, verbose);
            exit_code_for(&err)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let started = Instant::now();
    let app_config = config::load(cli.config.clone()).with_context(|| "load config")?;

    let uploads_dir = cli
        .uploads_dir
        .unwrap_or_else(|| app_config.uploads_dir.clone());
    let results_dir = cli
        .out_dir
        .unwrap_or_else(|| app_config.results_dir.clone());
    let run_stamp = Local::now().format(RUN_STAMP_FORMAT).to_string();

    logs::prune_anomaly_logs(&app_config.logs_dir, app_config.max_anomaly_logs);

    let upload_files = files::find_upload_files(
        &uploads_dir,
        &[results_dir.clone(), app_config.archive_dir.clone()],
    );
    info!(count = upload_files.len(), dir = %uploads_dir.display(), "upload files found");
    if upload_files.is_empty() {
        return Err(nothing_to_do(format!(
            "no upload files in {}",
            uploads_dir.display()
        )));
    }

    let mut uploads: Vec<UploadRecord> = Vec::new();
    let mut consumed = 0usize;
    for path in &upload_files {
        match read_upload(path, &app_config.upload) {
            Ok(records) => {
                info!(path = %path.display(), count = records.len(), "upload file read");
                uploads.extend(records);
                consumed += 1;
                if !cli.no_archive {
                    if let Err(err) = files::archive_upload(path, &app_config.archive_dir) {
                        error!(path = %path.display(), error = %err, "archive failed");
                    }
                }
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "upload file skipped");
            }
        }
    }
    info!(total = uploads.len(), "upload numbers collected");

    let outcome = parse_roster(&cli.roster, &app_config.roster)
        .with_context(|| format!("parse roster {}", cli.roster.display()))?;
    info!(keys = outcome.index.len(), "unique roster numbers indexed");
    if !outcome.anomalies.is_empty() {
        info!(count = outcome.anomalies.len(), "roster anomalies recorded");
        match logs::write_anomaly_log(
            &app_config.logs_dir,
            &run_stamp,
            &outcome.anomalies,
            app_config.report.file_mode,
        ) {
            Ok(path) => debug!(path = %path.display(), "anomaly log written"),
            Err(err) => error!(error = %err, "anomaly log write failed"),
        }
    }

    let rows = match_phones(&uploads, &outcome.index);
    let matched_rows = rows.iter().filter(|row| row.is_matched()).count();
    let unmatched_rows = rows.len() - matched_rows;

    let report_path = results_dir.join(format!("{run_stamp}_{}.csv", app_config.report_prefix));
    let rows_written = write_report(&rows, &report_path, &app_config.report)
        .with_context(|| format!("write report {}", report_path.display()))?;

    let unique_numbers = uploads
        .iter()
        .map(|record| record.number.as_str())
        .collect::<HashSet<_>>()
        .len();
    let summary = RunSummary {
        upload_files: consumed,
        numbers_read: uploads.len(),
        unique_numbers,
        matched_rows,
        unmatched_rows,
        anomalies: outcome.anomalies.len(),
        rows_written,
        extra_rows: rows_written.saturating_sub(unique_numbers),
        report_path,
        elapsed_seconds: started.elapsed().as_secs(),
    };
    if cli.json {
        print_json(&summary)?;
    } else {
        report_summary(&summary);
    }
    Ok(())
}

fn report_summary(summary: &RunSummary) {
    info!(
        matched = summary.matched_rows,
        unmatched = summary.unmatched_rows,
        anomalies = summary.anomalies,
        "match results"
    );
    if summary.extra_rows > 0 {
        info!(
            rows = summary.rows_written,
            extra = summary.extra_rows,
            "report rows written (extras from duplicate roster records)"
        );
    } else {
        info!(rows = summary.rows_written, "report rows written");
    }
    info!(
        path = %summary.report_path.display(),
        elapsed = summary.elapsed_seconds,
        "run complete"
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

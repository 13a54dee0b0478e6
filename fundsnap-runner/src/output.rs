//! Run artifacts: history journal, latest view, text report, validation report.
//!
//! The history journal is append-only: one row per fund per run, header only
//! when the file is created. Everything else is rewritten on every run.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use fundsnap_core::{format_decimal, FundSnapshot, Period, ValidationSummary};

use crate::config::OutputConfig;

/// Marker printed for a period without a computed return.
pub const NO_DATA: &str = "brak danych";
/// Marker printed for a missing NAV or as-of date.
pub const MISSING: &str = "brak";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Errors from writing artifacts.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to serialize validation report: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> OutputError + '_ {
    move |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Locations of every artifact a run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub history: PathBuf,
    pub latest: PathBuf,
    pub report: PathBuf,
    pub validation_json: PathBuf,
    pub validation_text: PathBuf,
}

impl OutputPaths {
    pub fn new(data_dir: &Path, output_dir: &Path) -> Self {
        Self {
            history: data_dir.join("history.csv"),
            latest: data_dir.join("latest.csv"),
            report: output_dir.join("report.txt"),
            validation_json: output_dir.join("validation.json"),
            validation_text: output_dir.join("validation.txt"),
        }
    }

    /// Create every parent directory.
    pub fn ensure_dirs(&self) -> Result<(), OutputError> {
        for path in [
            &self.history,
            &self.latest,
            &self.report,
            &self.validation_json,
            &self.validation_text,
        ] {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
        }
        Ok(())
    }
}

impl From<&OutputConfig> for OutputPaths {
    fn from(config: &OutputConfig) -> Self {
        Self::new(&config.data_dir, &config.output_dir)
    }
}

// ── CSV views ────────────────────────────────────────────────────────

/// Columns shared by the history journal and the latest view.
pub fn snapshot_header(periods: &[Period]) -> Vec<String> {
    let mut header: Vec<String> = ["timestamp_utc", "fund_name", "as_of", "nav"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(periods.iter().map(|p| p.column_name()));
    header
}

/// One CSV row. Absent values are empty cells.
pub fn snapshot_record(snapshot: &FundSnapshot, periods: &[Period]) -> Vec<String> {
    let mut record = vec![
        snapshot.generated_at.format(TIMESTAMP_FORMAT).to_string(),
        snapshot.fund_name.clone(),
        snapshot.as_of.clone().unwrap_or_default(),
        snapshot.nav.map(format_decimal).unwrap_or_default(),
    ];
    record.extend(
        periods
            .iter()
            .map(|p| snapshot.return_for(*p).map(|r| r.display()).unwrap_or_default()),
    );
    record
}

/// Append one snapshot to the history journal. The header is written only
/// when the file does not exist yet (or is empty).
pub fn append_history(
    path: &Path,
    snapshot: &FundSnapshot,
    periods: &[Period],
) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let is_new = match fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == io::ErrorKind::NotFound => true,
        Err(e) => return Err(io_err(path)(e)),
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err(path))?;
    let mut wtr = csv::Writer::from_writer(file);
    if is_new {
        wtr.write_record(snapshot_header(periods))
            .map_err(csv_err(path))?;
    }
    wtr.write_record(snapshot_record(snapshot, periods))
        .map_err(csv_err(path))?;
    wtr.flush().map_err(io_err(path))?;

    debug!(path = %path.display(), fund = %snapshot.fund_name, "appended history row");
    Ok(())
}

/// Rewrite the latest view with one row per fund.
pub fn write_latest(
    path: &Path,
    snapshots: &[FundSnapshot],
    periods: &[Period],
) -> Result<(), OutputError> {
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err(path))?;
    wtr.write_record(snapshot_header(periods))
        .map_err(csv_err(path))?;
    for snapshot in snapshots {
        wtr.write_record(snapshot_record(snapshot, periods))
            .map_err(csv_err(path))?;
    }
    wtr.flush().map_err(io_err(path))?;
    Ok(())
}

// ── Text report ──────────────────────────────────────────────────────

/// Human-readable snapshot report.
pub fn render_report(
    snapshots: &[FundSnapshot],
    periods: &[Period],
    currency: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "UNIQA – snapshot danych (miesięczny)");
    let _ = writeln!(
        out,
        "Wygenerowano (UTC): {}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    let _ = writeln!(out);

    for snapshot in snapshots {
        let nav = snapshot
            .nav
            .map(format_decimal)
            .unwrap_or_else(|| MISSING.to_string());
        let _ = writeln!(out, "- {}", snapshot.fund_name);
        let _ = writeln!(
            out,
            "  As of: {}",
            snapshot.as_of.as_deref().unwrap_or(MISSING)
        );
        let _ = writeln!(out, "  NAV: {nav} {currency}");
        for period in periods {
            let value = snapshot
                .return_for(*period)
                .map(|r| r.display())
                .unwrap_or_else(|| NO_DATA.to_string());
            let _ = writeln!(out, "  {period}: {value}");
        }
        let _ = writeln!(out);
    }
    out
}

pub fn write_report(path: &Path, report: &str) -> Result<(), OutputError> {
    fs::write(path, report).map_err(io_err(path))
}

/// Write the validation summary as pretty JSON and as text.
pub fn write_validation(
    paths: &OutputPaths,
    summary: &ValidationSummary,
    periods: &[Period],
) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&paths.validation_json, json).map_err(io_err(&paths.validation_json))?;
    fs::write(&paths.validation_text, summary.render_text(periods))
        .map_err(io_err(&paths.validation_text))?;
    Ok(())
}

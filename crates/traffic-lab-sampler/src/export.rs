use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Local};
use tracing::{error, info};
use traffic_lab_abstract::ReportOptions;

use crate::metrics::MetricsTable;
use crate::report::SimulationReport;

pub const RESULTS_PREFIX: &str = "simulation_results";

const CSV_HEADER: &str = "edge_id,avg_vehicles,max_vehicles,avg_speed,avg_occupancy";

/// `<prefix>_<YYYYmmdd_HHMMSS>.<ext>`
pub fn timestamped_name(prefix: &str, ext: &str, at: &DateTime<Local>) -> String {
    format!("{prefix}_{}.{ext}", at.format("%Y%m%d_%H%M%S"))
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// One row per edge in table order; occupancy stays a fraction.
pub fn render_csv(table: &MetricsTable) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for (id, m) in table.iter() {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            csv_field(id),
            m.avg_vehicles,
            m.max_vehicles,
            m.avg_speed,
            m.avg_occupancy
        ));
    }
    out
}

pub fn write_csv(path: &Path, table: &MetricsTable) -> anyhow::Result<()> {
    fs::write(path, render_csv(table))
        .with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_json(path: &Path, report: &SimulationReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedFiles {
    pub csv: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

/// Write the enabled result files into `options.out_dir`, creating it if needed.
///
/// A failed file does not stop the other one from being written; the first
/// failure is returned once both were attempted.
pub fn export(
    report: &SimulationReport,
    options: &ReportOptions,
    at: &DateTime<Local>,
) -> anyhow::Result<ExportedFiles> {
    let mut files = ExportedFiles::default();
    if !options.csv && !options.json {
        return Ok(files);
    }
    fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("failed to create {}", options.out_dir.display()))?;

    let mut failure = None;
    if options.csv {
        let path = options.out_dir.join(timestamped_name(RESULTS_PREFIX, "csv", at));
        files.csv = record(write_csv(&path, &report.edge_metrics), path, &mut failure);
    }
    if options.json {
        let path = options.out_dir.join(timestamped_name(RESULTS_PREFIX, "json", at));
        files.json = record(write_json(&path, report), path, &mut failure);
    }
    match failure {
        Some(err) => Err(err),
        None => Ok(files),
    }
}

fn record(
    written: anyhow::Result<()>,
    path: PathBuf,
    failure: &mut Option<anyhow::Error>,
) -> Option<PathBuf> {
    match written {
        Ok(()) => {
            info!("Results exported to {}", path.display());
            Some(path)
        }
        Err(err) => {
            error!("Export failed: {err:#}");
            failure.get_or_insert(err);
            None
        }
    }
}

//! End-of-run artifacts written to the run directory.
use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;

use cirno_core::RunReport;
use cirno_prometheus::PrometheusMetrics;

pub const TASK_PAIR_FILE: &str = "cirno_task_pair.log";
pub const REPORT_FILE: &str = "report.json";

/// One `label,command,state` line per task, in submission order.
pub fn write_task_pairs(run_dir: &Path, report: &RunReport) -> anyhow::Result<PathBuf> {
    let path = run_dir.join(TASK_PAIR_FILE);
    let file = fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for task in &report.tasks {
        writeln!(out, "{},{},{}", task.label, task.command, task.state)?;
    }
    out.flush()?;
    Ok(path)
}

pub fn write_json(run_dir: &Path, report: &RunReport) -> anyhow::Result<PathBuf> {
    let path = run_dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

pub fn write_metrics(path: &Path, metrics: &PrometheusMetrics) -> anyhow::Result<()> {
    let text = metrics.encode_text().context("encode metrics")?;
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}

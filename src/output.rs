use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::types::ScanReport;

/// Longest banner snippet shown in the console table.
const BANNER_SNIPPET: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    /// `.csv` (any case) selects CSV; everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => OutputFormat::Csv,
            _ => OutputFormat::Json,
        }
    }
}

/// Write the report to `path`, choosing the format from its extension.
pub fn write_report(path: &Path, report: &ScanReport) -> Result<OutputFormat> {
    let format = OutputFormat::from_path(path);
    let file = File::create(path)
        .with_context(|| format!("failed to create output file: {}", path.display()))?;
    match format {
        OutputFormat::Json => write_json(file, report)?,
        OutputFormat::Csv => write_csv(file, report)?,
    }
    Ok(format)
}

pub fn write_json<W: Write>(writer: W, report: &ScanReport) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// One row per port: `port,state,service,banner,probe_ms,error`.
pub fn write_csv<W: Write>(writer: W, report: &ScanReport) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["port", "state", "service", "banner", "probe_ms", "error"])?;
    for r in &report.results {
        wtr.write_record([
            r.port.to_string(),
            r.state.to_string(),
            r.service.clone().unwrap_or_default(),
            r.banner.clone().unwrap_or_default(),
            r.probe_duration.as_millis().to_string(),
            r.error.clone().unwrap_or_default(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Print a summary and a table of results to stdout. Only open ports unless `all`.
pub fn print_report(report: &ScanReport, all: bool) {
    println!(
        "\nScan complete for {} ({}){}",
        report.host,
        report.resolved_address,
        if report.cancelled { " [cancelled early]" } else { "" }
    );
    println!(
        "Duration: {:.2}s | Open ports: {} | Scanned: {}",
        report.total_duration.as_secs_f64(),
        report.open_count,
        report.results.len()
    );

    let rows: Vec<_> = report
        .results
        .iter()
        .filter(|r| all || r.is_open())
        .collect();
    if rows.is_empty() {
        return;
    }

    let mut service_w = "service".len();
    for r in &rows {
        service_w = service_w.max(r.service.as_deref().map_or(0, str::len));
    }
    let port_w = 5usize;
    let state_w = "timed_out".len();
    let lat_w = "probe_ms".len();

    println!();
    println!(
        "{:>port_w$}  {:<state_w$}  {:<service_w$}  {:>lat_w$}  banner",
        "port", "state", "service", "probe_ms",
    );
    println!(
        "{:->port_w$}  {:-<state_w$}  {:-<service_w$}  {:->lat_w$}  {:-<6}",
        "", "", "", "", "",
    );
    for r in rows {
        let detail = r
            .banner
            .as_deref()
            .or(r.error.as_deref())
            .map(banner_snippet)
            .unwrap_or_default();
        println!(
            "{:>port_w$}  {:<state_w$}  {:<service_w$}  {:>lat_w$}  {}",
            r.port,
            r.state.as_str(),
            r.service.as_deref().unwrap_or("-"),
            r.probe_duration.as_millis(),
            detail,
        );
    }
}

/// Single-line, length-limited view of a banner for the console.
fn banner_snippet(text: &str) -> String {
    let flat = text.replace('\n', "\\n").replace('\r', "\\r");
    match flat.char_indices().nth(BANNER_SNIPPET) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

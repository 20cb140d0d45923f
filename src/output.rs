use std::io::{self, Write};

use serde::Serialize;

use crate::app::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_scan(entries: &[ScanEntry]) -> io::Result<()> {
        Self::print_json(&entries)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub filename: String,
    pub directory: String,
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(render_summary(summary).as_bytes())
    }
}

/// Human-readable end-of-run report.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Portals: {}\n", summary.portals));
    out.push_str(&format!("Manifest rows: {}\n", summary.manifest_rows));
    out.push_str(&format!("Files needed: {}\n", summary.files_needed));
    out.push_str(&format!(
        "Got {} ({} pre-existing, {} copied, {} downloaded, {} in previous downloads)\n",
        summary.total_got(),
        summary.pre_existing,
        summary.copied,
        summary.downloaded,
        summary.in_previous
    ));
    if summary.simulated > 0 {
        out.push_str(&format!("Would download: {}\n", summary.simulated));
    }
    if summary.failed > 0 {
        out.push_str(&format!("Failed: {}\n", summary.failed));
    }
    if !summary.skipped_projects.is_empty() || summary.skipped_listing_rows > 0 {
        out.push_str(&format!(
            "Unreadable input: {} project rows, {} listing rows\n",
            summary.skipped_projects.len(),
            summary.skipped_listing_rows
        ));
    }
    if !summary.excluded.is_empty() {
        out.push_str(&format!("Skipped portals: {}\n", summary.excluded.join(", ")));
    }
    for missing in &summary.missing {
        out.push_str(&format!("No eligible file: {missing}\n"));
    }
    for error in &summary.config_errors {
        out.push_str(&format!("Configuration error: {error}\n"));
    }
    out
}

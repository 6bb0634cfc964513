//! File artifacts for offline review: a per-date CSV of merged records and
//! the discrepancy log.

use crate::attribute::DiscrepancyLog;
use crate::model::MergedRecord;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

pub const CSV_HEADER: &str =
    "date,youtube_slot_a,youtube_slot_b,vimeo_slot_a,vimeo_slot_b,youtube_notes,vimeo_notes";

/// Write the merged records as CSV, one row per date in input order.
pub fn write_csv(path: &Path, records: &[MergedRecord]) -> Result<()> {
    let mut out = String::new();
    out.push_str(CSV_HEADER);
    out.push('\n');
    for record in records {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{}",
            record.date,
            count_field(record.youtube_slot_a),
            count_field(record.youtube_slot_b),
            count_field(record.vimeo_slot_a),
            count_field(record.vimeo_slot_b),
            text_field(&record.youtube_notes),
            text_field(&record.vimeo_notes),
        );
    }
    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = records.len(), "wrote merged records csv");
    Ok(())
}

/// Write the discrepancy log, one entry per line. No-op when empty.
pub fn write_discrepancies(path: &Path, log: &DiscrepancyLog) -> Result<()> {
    if log.is_empty() {
        return Ok(());
    }
    let mut out = String::new();
    for entry in log.entries() {
        out.push_str(entry);
        out.push('\n');
    }
    fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), entries = log.len(), "wrote discrepancy log");
    Ok(())
}

fn count_field(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// RFC-4180-style quoting for notes containing commas, quotes or newlines.
fn text_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

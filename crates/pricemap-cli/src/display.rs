//! Terminal and file output.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::arrow::util::pretty::pretty_format_batches;
use pricemap_core::ReconcileReport;
use serde::Serialize;

/// Print registry batches as an ASCII table.
pub fn print_registry(batches: &[RecordBatch]) -> anyhow::Result<()> {
    let rows: usize = batches.iter().map(RecordBatch::num_rows).sum();
    if rows == 0 {
        println!("(registry is empty)");
        return Ok(());
    }
    println!("{}", pretty_format_batches(batches)?);
    println!("{rows} shops");
    Ok(())
}

pub fn print_report(report: &ReconcileReport, dry_run: bool) {
    let heading = if dry_run { "Planned" } else { "Committed" };
    println!("{heading}: {report}");
    if report.remote_lookups > 0 {
        println!("  remote geocoder lookups: {}", report.remote_lookups);
    }
    if report.geocode_failed > 0 {
        println!(
            "  {} new shops could not be located and will be retried next run",
            report.geocode_failed
        );
    }
}

pub fn print_skipped() {
    println!("Ingestion failed; registry left untouched.");
}

/// Write pretty JSON to `out`, or stdout when `None`.
pub fn write_geojson<T: Serialize>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        None => {
            let mut stdout = io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

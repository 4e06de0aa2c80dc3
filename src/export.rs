//! Sweep result records and CSV export.
//!
//! The CSV file starts with `# key: value` comment lines describing the run,
//! followed by a header row and one row per set-point:
//!
//! ```text
//! # instrument: ASRL/dev/ttyUSB0::INSTR
//! # driver: keithley2400
//! # started_at: 2024-05-01T12:00:00+00:00
//! index,level,reading
//! 0,-1.0,-0.001
//! ```

use crate::run::SweepReport;
use serde::Serialize;

/// One measured point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRecord {
    /// Position in the sweep
    pub index: usize,
    /// Applied source level
    pub level: f64,
    /// Measured value
    pub reading: f64,
}

/// Pair levels with readings, index-aligned.
pub fn records(levels: &[f64], readings: &[f64]) -> Vec<SweepRecord> {
    levels
        .iter()
        .zip(readings)
        .enumerate()
        .map(|(index, (&level, &reading))| SweepRecord {
            index,
            level,
            reading,
        })
        .collect()
}

#[cfg(feature = "storage_csv")]
mod csv_export {
    use super::*;
    use crate::error::AppResult;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    /// Write `report` as CSV to any writer.
    pub fn write_csv<W: Write>(mut out: W, report: &SweepReport) -> AppResult<()> {
        let mut header = vec![
            ("instrument", report.address.clone()),
            ("driver", report.driver.clone()),
            ("started_at", report.started_at.to_rfc3339()),
            ("source", report.setup.source.to_string()),
            ("measure", report.setup.measure.to_string()),
        ];
        if let Some(idn) = &report.identity {
            header.push(("identity", idn.clone()));
        }
        for (key, value) in header {
            writeln!(out, "# {}: {}", key, value)?;
        }

        let mut writer = csv::Writer::from_writer(out);
        for record in &report.records {
            writer.serialize(record)?;
        }
        if report.records.is_empty() {
            writer.write_record(["index", "level", "reading"])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Create (or truncate) `path` and write `report` to it.
    pub fn write_csv_file(path: &Path, report: &SweepReport) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        write_csv(file, report)?;
        tracing::info!(path = %path.display(), rows = report.records.len(), "wrote CSV export");
        Ok(())
    }
}

#[cfg(feature = "storage_csv")]
pub use csv_export::{write_csv, write_csv_file};

/// Without the `storage_csv` feature, exporting is an error.
#[cfg(not(feature = "storage_csv"))]
pub fn write_csv_file(_path: &std::path::Path, _report: &SweepReport) -> crate::error::AppResult<()> {
    Err(crate::error::AppError::FeatureNotEnabled(
        "storage_csv".to_string(),
    ))
}

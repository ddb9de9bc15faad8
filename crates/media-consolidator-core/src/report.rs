//! Append-only CSV run log.
//!
//! One row per processed file, flushed after every write so a crash mid-run
//! leaves a usable partial log. The log is the manual-recovery record: it
//! names every source, destination, and failure of the run.

use std::fs::File;
use std::path::Path;

use crate::error::Result;
use crate::types::{MoveResult, MoveStatus};

const HEADER: [&str; 7] = [
    "source",
    "destination",
    "outcome",
    "reason",
    "timestamp",
    "timestamp_source",
    "size_bytes",
];

/// Incremental CSV writer for one run
pub struct CsvLog {
    writer: csv::Writer<File>,
}

impl CsvLog {
    /// Create (truncate) the log file and write the header
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(File::create(path)?);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    /// Append one result row and flush
    pub fn record(&mut self, result: &MoveResult) -> Result<()> {
        let entry = &result.entry;

        // Execution can override the planned outcome: a failed or
        // reallocated move must be visible in the log as it happened.
        let (outcome, reason, destination) = match &result.status {
            MoveStatus::Failed(reason) => ("error".to_string(), reason.clone(), String::new()),
            MoveStatus::Reallocated(actual) => (
                entry.outcome.as_str().to_string(),
                format!("{} (destination occupied, reallocated)", entry.reason),
                actual.display().to_string(),
            ),
            _ => (
                entry.outcome.as_str().to_string(),
                entry.reason.clone(),
                entry
                    .destination
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_default(),
            ),
        };

        let timestamp = entry
            .timestamp
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();

        self.writer.write_record([
            entry.source.display().to_string(),
            destination,
            outcome,
            reason,
            timestamp,
            entry.timestamp_source.as_tag(),
            entry.size.to_string(),
        ])?;
        self.writer.flush()?;
        Ok(())
    }
}

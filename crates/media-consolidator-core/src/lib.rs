//! Core functionality for consolidating scattered photo/video collections.
//!
//! This library provides the foundational components of the pipeline:
//! - File discovery and capture-timestamp extraction
//! - Fingerprinting and exact-duplicate classification
//! - Collision-safe canonical naming
//! - Safe, idempotent move execution with a CSV run log

// -- External Dependencies --

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::{Path, PathBuf};

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::*;
pub use error::{Error, Result};
pub use types::*;

// -- Public Modules --
pub mod classify;
pub mod config;
pub mod discovery;
pub mod fingerprint;
pub mod logging;
pub mod metadata;
pub mod mover;
pub mod naming;
pub mod organize;
pub mod planner;
pub mod report;
pub mod types;

use metadata::{ExifToolOracle, MetadataOracle, MtimeOracle};
use mover::Mover;
use planner::{Plan, Planner};
use report::CsvLog;

/// Main entry point for the consolidation process
pub struct Consolidator {
    config: Config,
    oracle: Box<dyn MetadataOracle>,
    root: PathBuf,
}

impl Consolidator {
    /// Create a new Consolidator with the provided configuration.
    ///
    /// Locates and probes the exiftool binary unless it is disabled; a
    /// missing oracle is fatal here, before any file is touched.
    pub fn new(config: Config, root: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        let oracle: Box<dyn MetadataOracle> = if config.no_exiftool {
            Box::new(MtimeOracle)
        } else {
            Box::new(ExifToolOracle::locate(
                &config.exiftool,
                config.exiftool_timeout_secs,
                config.prefer_newest,
            )?)
        };
        Ok(Self {
            config,
            oracle,
            root: root.as_ref().to_path_buf(),
        })
    }

    /// Create a Consolidator with a custom oracle (test seam)
    pub fn with_oracle(
        config: Config,
        root: impl AsRef<Path>,
        oracle: Box<dyn MetadataOracle>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            oracle,
            root: root.as_ref().to_path_buf(),
        })
    }

    /// The destination root for this invocation
    pub fn dest_root(&self) -> PathBuf {
        self.root.join(&self.config.dest_name)
    }

    /// Build the move plan without touching the filesystem
    pub fn plan(&self) -> Result<Plan> {
        Planner::new(&self.config, self.oracle.as_ref(), &self.root).plan()
    }

    /// Run the full consolidation pipeline
    pub fn run(&self) -> Result<RunSummary> {
        info!("Starting media consolidation in {}", self.root.display());
        if self.config.dry_run {
            info!("Dry run enabled, no changes will be made");
        }

        let plan = self.plan()?;
        info!("Planned {} entries", plan.entries.len());

        let mut csv_log = match &self.config.log_csv {
            Some(path) => Some(CsvLog::create(path)?),
            None => None,
        };

        let progress = ProgressBar::new(plan.entries.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) - {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        progress.set_message(if self.config.dry_run {
            "Simulating moves..."
        } else {
            "Moving files..."
        });

        let mut summary = RunSummary::default();
        let mut mover = Mover::new(&self.config, plan.allocator);
        for entry in &plan.entries {
            let result = mover.execute(entry);
            if let Some(log) = csv_log.as_mut() {
                log.record(&result)?;
            }
            summary.record(&result);
            progress.inc(1);
        }

        progress.finish_with_message(format!(
            "Done: {} renamed, {} duplicates, {} failed",
            summary.renamed, summary.duplicates, summary.failed
        ));
        info!(
            "Run complete: {} scanned, {} renamed, {} duplicates, {} excluded, {} unsupported, {} in place, {} failed",
            summary.scanned,
            summary.renamed,
            summary.duplicates,
            summary.skipped_excluded,
            summary.skipped_unsupported,
            summary.already_in_place,
            summary.failed
        );
        Ok(summary)
    }
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// What to do with a confirmed duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DupAction {
    /// Move into the duplicates subtree (default)
    Move,

    /// Leave the duplicate where it is
    Skip,

    /// Delete the duplicate outright
    Delete,
}

/// Configuration for the consolidation process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Whether to run without making changes
    pub dry_run: bool,

    /// Name of the destination subtree under the scanned root
    pub dest_name: String,

    /// Name of the duplicates subtree under the destination
    pub duplicates_name: String,

    /// Folder-name substrings to exclude from the scan
    pub excluded_folders: Vec<String>,

    /// Whether destinations get a per-year subfolder (destination/YYYY/name)
    pub organize_by_year: bool,

    /// Whether to confirm duplicates by content hash
    pub hash_duplicates: bool,

    /// Files larger than this are never hashed and never classified duplicate
    pub hash_max_bytes: u64,

    /// Prefer the newest metadata date tag instead of the oldest
    pub prefer_newest: bool,

    /// Fall back to filesystem mtime when metadata has no date
    pub mtime_fallback: bool,

    /// How to handle confirmed duplicates
    pub dup_action: DupAction,

    /// Number of threads for the metadata phase (0 = auto)
    pub threads: usize,

    /// Explicit exiftool path or command name
    pub exiftool: String,

    /// Skip exiftool entirely and use mtime only
    pub no_exiftool: bool,

    /// Per-file exiftool timeout in seconds
    pub exiftool_timeout_secs: u64,

    /// Path of the CSV run log, if any
    pub log_csv: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dry_run: false,
            dest_name: "all_photos".to_string(),
            duplicates_name: "_DUPLICATES".to_string(),
            excluded_folders: Vec::new(),
            organize_by_year: false,
            hash_duplicates: true,
            hash_max_bytes: 512 * 1024 * 1024,
            prefer_newest: false,
            mtime_fallback: true,
            dup_action: DupAction::Move,
            threads: 0, // Auto
            exiftool: "exiftool".to_string(),
            no_exiftool: false,
            exiftool_timeout_secs: 10,
            log_csv: None,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check internal consistency before running
    pub fn validate(&self) -> Result<()> {
        if self.dest_name.trim().is_empty() {
            return Err(Error::Configuration(
                "destination name must not be empty".to_string(),
            ));
        }
        if self.duplicates_name.trim().is_empty() {
            return Err(Error::Configuration(
                "duplicates name must not be empty".to_string(),
            ));
        }
        if self.dest_name.contains(std::path::MAIN_SEPARATOR) {
            return Err(Error::Configuration(format!(
                "destination name must be a single folder name: {}",
                self.dest_name
            )));
        }
        Ok(())
    }

    /// Effective thread count for the metadata phase
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }
}

//! Directory walk and scan-level classification.
//!
//! Exclusion and extension checks happen here, before any metadata work, so
//! skipped files cost a directory entry and nothing more. The destination
//! subtree is pruned from the walk entirely: it is this tool's own output.

use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::MediaFormat;

/// Scan-level classification of one regular file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEntry {
    /// Supported media file; proceeds to metadata extraction
    Candidate(PathBuf),

    /// Under an excluded folder
    Excluded(PathBuf),

    /// Extension not in the supported media set
    Unsupported(PathBuf),
}

impl ScanEntry {
    pub fn path(&self) -> &Path {
        match self {
            Self::Candidate(p) | Self::Excluded(p) | Self::Unsupported(p) => p,
        }
    }
}

/// Walk `root` and classify every regular file found.
///
/// Entries are returned sorted by full path so downstream suffix assignment
/// is deterministic regardless of OS enumeration order.
pub fn scan(root: &Path, dest_root: &Path, config: &Config) -> Result<Vec<ScanEntry>> {
    if !root.exists() {
        return Err(Error::FileNotFound(root.to_path_buf()));
    }

    let mut entries = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.path() != dest_root)
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry during scan: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();

        let scan_entry = if is_excluded(path, root, &config.excluded_folders) {
            ScanEntry::Excluded(path.to_path_buf())
        } else if is_supported_media(path) {
            ScanEntry::Candidate(path.to_path_buf())
        } else {
            ScanEntry::Unsupported(path.to_path_buf())
        };
        entries.push(scan_entry);
    }

    entries.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(entries)
}

/// Returns if the given path has a supported media extension
pub fn is_supported_media(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MediaFormat::from_extension(ext).is_supported())
        .unwrap_or(false)
}

/// True if any directory component of `path` below `root` matches one of
/// the configured folder substrings
fn is_excluded(path: &Path, root: &Path, excluded: &[String]) -> bool {
    if excluded.is_empty() {
        return false;
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    let Some(parent) = relative.parent() else {
        return false;
    };
    parent.components().any(|comp| {
        let name = comp.as_os_str().to_string_lossy();
        excluded.iter().any(|ex| name.contains(ex.as_str()))
    })
}

// -- Tests --

//! Standalone organize-by-year pass.
//!
//! Moves canonically named files from a flat destination root into per-year
//! subfolders. Consolidation runs place files into year folders directly when
//! the flag is on; this pass retrofits trees consolidated without it.

use log::{info, warn};
use std::fs;
use std::path::Path;

use crate::discovery::is_supported_media;
use crate::error::{Error, Result};
use crate::naming::canonical_year;

/// Counters for one organize pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeSummary {
    pub moved: usize,
    pub skipped: usize,
}

/// Move canonical files in the top level of `dest_root` into `YYYY/` folders.
///
/// Non-canonical names and files whose year slot is already occupied are
/// skipped, never overwritten.
pub fn organize_by_year(dest_root: &Path, dry_run: bool) -> Result<OrganizeSummary> {
    if !dest_root.is_dir() {
        return Err(Error::FileNotFound(dest_root.to_path_buf()));
    }

    let mut files: Vec<_> = fs::read_dir(dest_root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_supported_media(p))
        .collect();
    files.sort();

    info!("Organizing {} files in {}", files.len(), dest_root.display());
    let mut summary = OrganizeSummary::default();

    for path in files {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                summary.skipped += 1;
                continue;
            }
        };

        let Some(year) = canonical_year(&name) else {
            info!("skipping {} (not a canonical name)", name);
            summary.skipped += 1;
            continue;
        };

        let year_dir = dest_root.join(year);
        let target = year_dir.join(&name);
        if target.exists() {
            warn!("skipping {} (already exists in {}/)", name, year);
            summary.skipped += 1;
            continue;
        }

        if dry_run {
            info!("[dry-run] would move {} -> {}/", name, year);
        } else {
            fs::create_dir_all(&year_dir)?;
            fs::rename(&path, &target)?;
            info!("moved {} -> {}/", name, year);
        }
        summary.moved += 1;
    }

    Ok(summary)
}

//! Plan execution.
//!
//! The Mover is the only component that mutates the filesystem, and it runs
//! fully serialized: move throughput is never the bottleneck next to metadata
//! and hash reads. Execution is effectively append-only: an occupied
//! destination is re-verified against the source, never overwritten, so an
//! interrupted run can always be re-run from scratch.

use log::{debug, warn};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::{Config, DupAction};
use crate::fingerprint::compute_content_hash;
use crate::logging::{log_file_error, log_fs_modification};
use crate::naming::NameAllocator;
use crate::types::{MoveResult, MoveStatus, Outcome, PlanEntry};

/// Delay before the single retry on a locked or busy file
const RETRY_SLEEP: Duration = Duration::from_millis(250);

/// Executes (or simulates) planned moves
pub struct Mover<'a> {
    config: &'a Config,
    allocator: NameAllocator,
}

impl<'a> Mover<'a> {
    /// The allocator carries the plan's claimed names so that execution-time
    /// collision recovery stays consistent with the plan
    pub fn new(config: &'a Config, allocator: NameAllocator) -> Self {
        Self { config, allocator }
    }

    /// Execute one plan entry and report what happened
    pub fn execute(&mut self, entry: &PlanEntry) -> MoveResult {
        let status = match entry.outcome {
            Outcome::SkippedExcluded | Outcome::SkippedUnsupported => MoveStatus::Skipped,
            Outcome::Error => MoveStatus::Failed(entry.reason.clone()),
            Outcome::Renamed => self.execute_move(entry),
            Outcome::Duplicate => self.execute_duplicate(entry),
        };

        MoveResult {
            entry: entry.clone(),
            status,
        }
    }

    fn execute_duplicate(&mut self, entry: &PlanEntry) -> MoveStatus {
        match self.config.dup_action {
            DupAction::Move => self.execute_move(entry),
            DupAction::Skip => {
                debug!("leaving duplicate in place: {}", entry.source.display());
                MoveStatus::LeftInPlace
            }
            DupAction::Delete => {
                if self.config.dry_run {
                    return MoveStatus::WouldMove;
                }
                match with_one_retry(|| fs::remove_file(&entry.source)) {
                    Ok(()) => {
                        log_fs_modification("delete-duplicate", &entry.source, None);
                        MoveStatus::Deleted
                    }
                    Err(e) => {
                        log_file_error(&entry.source, "delete", &e);
                        MoveStatus::Failed(format!("delete failed: {}", e))
                    }
                }
            }
        }
    }

    fn execute_move(&mut self, entry: &PlanEntry) -> MoveStatus {
        let Some(destination) = entry.destination.as_deref() else {
            return MoveStatus::Failed("plan entry has no destination".to_string());
        };

        if entry.source == destination {
            return MoveStatus::AlreadyInPlace;
        }
        if self.config.dry_run {
            return MoveStatus::WouldMove;
        }

        if let Some(parent) = destination.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log_file_error(parent, "create-dir", &e);
                return MoveStatus::Failed(format!("cannot create {}: {}", parent.display(), e));
            }
        }

        // A destination occupied since planning means either a prior
        // interrupted run already placed this file, or a concurrent writer
        // raced us. Re-verify instead of overwriting.
        if destination.exists() {
            if identical_files(&entry.source, destination) {
                debug!(
                    "{} already present at {}",
                    entry.source.display(),
                    destination.display()
                );
                return MoveStatus::AlreadyDone;
            }
            let reallocated = self.reallocate(destination, &entry.source);
            return match self.rename(&entry.source, &reallocated) {
                Ok(()) => MoveStatus::Reallocated(reallocated),
                Err(status) => status,
            };
        }

        match self.rename(&entry.source, destination) {
            Ok(()) => MoveStatus::Moved,
            Err(status) => status,
        }
    }

    fn rename(&self, source: &Path, destination: &Path) -> Result<(), MoveStatus> {
        match with_one_retry(|| fs::rename(source, destination)) {
            Ok(()) => {
                log_fs_modification(
                    "move",
                    source,
                    Some(&format!("-> {}", destination.display())),
                );
                Ok(())
            }
            Err(e) => {
                log_file_error(source, "move", &e);
                Err(MoveStatus::Failed(format!(
                    "move to {} failed: {}",
                    destination.display(),
                    e
                )))
            }
        }
    }

    /// Claim a fresh suffixed name next to an occupied destination
    fn reallocate(&mut self, occupied: &Path, source: &Path) -> std::path::PathBuf {
        let dir = occupied.parent().unwrap_or_else(|| Path::new("."));
        let stem = occupied
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = occupied
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let fresh = self.allocator.allocate(dir, &stem, &ext, source);
        warn!(
            "destination {} occupied by a different file, reallocating to {}",
            occupied.display(),
            fresh.display()
        );
        fresh
    }
}

/// Retry an I/O operation once after a short sleep; external viewers lock
/// media files transiently
fn with_one_retry<T>(mut op: impl FnMut() -> std::io::Result<T>) -> std::io::Result<T> {
    match op() {
        Ok(v) => Ok(v),
        Err(_) => {
            std::thread::sleep(RETRY_SLEEP);
            op()
        }
    }
}

/// Size check first, byte-for-byte hash comparison second
fn identical_files(a: &Path, b: &Path) -> bool {
    let sizes = (
        fs::metadata(a).map(|m| m.len()),
        fs::metadata(b).map(|m| m.len()),
    );
    match sizes {
        (Ok(sa), Ok(sb)) if sa == sb => {}
        _ => return false,
    }
    match (compute_content_hash(a), compute_content_hash(b)) {
        (Ok(ha), Ok(hb)) => ha == hb,
        _ => false,
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimestampSource;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn entry(source: PathBuf, destination: Option<PathBuf>, outcome: Outcome) -> PlanEntry {
        PlanEntry {
            source,
            destination,
            outcome,
            reason: String::new(),
            timestamp: None,
            timestamp_source: TimestampSource::None,
            size: 0,
        }
    }

    fn mover(config: &Config) -> Mover<'_> {
        Mover::new(config, NameAllocator::new())
    }

    #[test]
    fn test_moves_file_and_creates_directories() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"payload").unwrap();
        let dest = dir.path().join("all_photos").join("2020").join("x.jpg");

        let config = Config::default();
        let entry = entry(src.clone(), Some(dest.clone()), Outcome::Renamed);
        let result = mover(&config).execute(&entry);

        assert_eq!(result.status, MoveStatus::Moved);
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"payload").unwrap();
        let dest = dir.path().join("all_photos").join("x.jpg");

        let config = Config {
            dry_run: true,
            ..Config::default()
        };
        let result = mover(&config).execute(&entry(src.clone(), Some(dest.clone()), Outcome::Renamed));

        assert_eq!(result.status, MoveStatus::WouldMove);
        assert!(src.exists());
        assert!(!dest.exists());
        assert!(!dest.parent().unwrap().exists());
    }

    #[test]
    fn test_source_already_at_destination_is_noop() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("20200101_100000.jpg");
        fs::write(&src, b"payload").unwrap();

        let config = Config::default();
        let result = mover(&config).execute(&entry(src.clone(), Some(src.clone()), Outcome::Renamed));

        assert_eq!(result.status, MoveStatus::AlreadyInPlace);
        assert!(src.exists());
    }

    #[test]
    fn test_occupied_destination_identical_treated_as_done() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dest = dir.path().join("dest").join("x.jpg");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&src, b"same payload").unwrap();
        fs::write(&dest, b"same payload").unwrap();

        let config = Config::default();
        let result = mover(&config).execute(&entry(src.clone(), Some(dest.clone()), Outcome::Renamed));

        assert_eq!(result.status, MoveStatus::AlreadyDone);
        // Never overwrites, never deletes
        assert!(src.exists());
        assert!(dest.exists());
    }

    #[test]
    fn test_occupied_destination_mismatch_reallocates() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dest = dir.path().join("dest").join("20200101_100000.jpg");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(&src, b"fresh bytes").unwrap();
        fs::write(&dest, b"other bytes entirely").unwrap();

        let config = Config::default();
        let result = mover(&config).execute(&entry(src.clone(), Some(dest.clone()), Outcome::Renamed));

        let expected = dir.path().join("dest").join("20200101_100000_01.jpg");
        assert_eq!(result.status, MoveStatus::Reallocated(expected.clone()));
        assert!(!src.exists());
        assert_eq!(fs::read(&expected).unwrap(), b"fresh bytes");
        // The occupant is untouched
        assert_eq!(fs::read(&dest).unwrap(), b"other bytes entirely");
    }

    #[test]
    fn test_duplicate_skip_leaves_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"payload").unwrap();

        let config = Config {
            dup_action: DupAction::Skip,
            ..Config::default()
        };
        let result = mover(&config).execute(&entry(src.clone(), None, Outcome::Duplicate));

        assert_eq!(result.status, MoveStatus::LeftInPlace);
        assert!(src.exists());
    }

    #[test]
    fn test_duplicate_delete_removes_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"payload").unwrap();

        let config = Config {
            dup_action: DupAction::Delete,
            ..Config::default()
        };
        let result = mover(&config).execute(&entry(src.clone(), None, Outcome::Duplicate));

        assert_eq!(result.status, MoveStatus::Deleted);
        assert!(!src.exists());
    }

    #[test]
    fn test_duplicate_delete_in_dry_run_keeps_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"payload").unwrap();

        let config = Config {
            dup_action: DupAction::Delete,
            dry_run: true,
            ..Config::default()
        };
        let result = mover(&config).execute(&entry(src.clone(), None, Outcome::Duplicate));

        assert_eq!(result.status, MoveStatus::WouldMove);
        assert!(src.exists());
    }

    #[test]
    fn test_missing_source_reports_failure() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("vanished.jpg");
        let dest = dir.path().join("dest").join("x.jpg");

        let config = Config::default();
        let result = mover(&config).execute(&entry(src, Some(dest), Outcome::Renamed));

        assert!(result.status.is_failure());
    }

    #[test]
    fn test_skips_pass_through() {
        let config = Config::default();
        let result = mover(&config).execute(&entry(
            PathBuf::from("/x/notes.txt"),
            None,
            Outcome::SkippedUnsupported,
        ));
        assert_eq!(result.status, MoveStatus::Skipped);
    }
}

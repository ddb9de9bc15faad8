//! Reconciliation planning.
//!
//! Planning is pure with respect to mutation: it walks the scanned file set,
//! extracts metadata, classifies duplicates, allocates destination names, and
//! emits one `PlanEntry` per file. A dry run and a real run share this code
//! path bit for bit; only the Mover differs.
//!
//! Two phases keep it both fast and deterministic. Phase one builds
//! `FileRecord`s in parallel (stat + oracle are the expensive per-file work).
//! Phase two reconciles sequentially over the path-sorted records, so all
//! registry mutation happens at a single serialization point and suffix
//! assignment is reproducible for a fixed input set.

use blake3::Hash as Blake3Hash;
use chrono::Datelike;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classify::{Classification, DuplicateClassifier};
use crate::config::{Config, DupAction};
use crate::discovery::{self, ScanEntry};
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::metadata::{mtime_capture, MetadataOracle};
use crate::naming::{self, NameAllocator};
use crate::types::{CaptureTime, FileRecord, Outcome, PlanEntry, TimestampSource};

/// The ordered outcome of one planning pass
#[derive(Debug)]
pub struct Plan {
    /// One entry per scanned file, in path order
    pub entries: Vec<PlanEntry>,

    /// Name registry carried into execution, so execution-time collision
    /// recovery allocates suffixes consistent with the plan
    pub(crate) allocator: NameAllocator,
}

/// First-seen record for a fingerprint, the "original" duplicates compare
/// against. The content hash is filled in lazily on first comparison.
struct OriginalEntry {
    source: PathBuf,
    destination: PathBuf,
    hash: Option<Blake3Hash>,
}

/// Process-scoped registry of allocated names and first-seen fingerprints
#[derive(Default)]
struct RunRegistry {
    allocator: NameAllocator,
    originals: HashMap<Fingerprint, OriginalEntry>,
}

/// Metadata-phase result for one candidate file
enum RecordOutcome {
    Ready(FileRecord),
    Failed { path: PathBuf, reason: String },
}

/// Builds the move plan for one invocation
pub struct Planner<'a> {
    config: &'a Config,
    oracle: &'a dyn MetadataOracle,
    root: PathBuf,
    dest_root: PathBuf,
    dup_root: PathBuf,
}

impl<'a> Planner<'a> {
    pub fn new(config: &'a Config, oracle: &'a dyn MetadataOracle, root: &Path) -> Self {
        let dest_root = root.join(&config.dest_name);
        let dup_root = dest_root.join(&config.duplicates_name);
        Self {
            config,
            oracle,
            root: root.to_path_buf(),
            dest_root,
            dup_root,
        }
    }

    /// Scan, extract metadata, and reconcile into an ordered plan
    pub fn plan(&self) -> Result<Plan> {
        let scanned = discovery::scan(&self.root, &self.dest_root, self.config)?;
        let candidates: Vec<&Path> = scanned
            .iter()
            .filter_map(|e| match e {
                ScanEntry::Candidate(p) => Some(p.as_path()),
                _ => None,
            })
            .collect();
        info!(
            "Scanned {} entries, {} media candidates",
            scanned.len(),
            candidates.len()
        );

        let records = self.build_records(&candidates)?;
        Ok(self.reconcile(&scanned, records))
    }

    /// Phase one: stat + timestamp extraction, in parallel
    fn build_records(&self, candidates: &[&Path]) -> Result<Vec<RecordOutcome>> {
        let progress = ProgressBar::new(candidates.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) - {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        progress.set_message("Extracting timestamps...");

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .build()
            .map_err(|e| crate::Error::Configuration(format!("thread pool: {}", e)))?;

        let records = pool.install(|| {
            candidates
                .par_iter()
                .map(|path| {
                    let outcome = self.build_record(path);
                    progress.inc(1);
                    outcome
                })
                .collect::<Result<Vec<_>>>()
        })?;

        progress.finish_with_message("Timestamp extraction complete");
        Ok(records)
    }

    /// Build one record; stat failures retry once before surfacing
    fn build_record(&self, path: &Path) -> Result<RecordOutcome> {
        let metadata = match std::fs::metadata(path).or_else(|_| {
            std::thread::sleep(Duration::from_millis(100));
            std::fs::metadata(path)
        }) {
            Ok(m) => m,
            Err(e) => {
                return Ok(RecordOutcome::Failed {
                    path: path.to_path_buf(),
                    reason: format!("cannot stat source: {}", e),
                })
            }
        };

        // Oracle failures here are environmental and abort the run;
        // tag-level extraction failures arrive as None.
        let capture = match self.oracle.capture_time(path)? {
            Some(capture) => Some(capture),
            None if self.config.mtime_fallback => mtime_capture(path),
            None => None,
        };

        let (timestamp, timestamp_source) = match capture {
            Some(CaptureTime { when, source }) => (Some(when), source),
            None => (None, TimestampSource::None),
        };

        Ok(RecordOutcome::Ready(FileRecord {
            path: path.to_path_buf(),
            size: metadata.len(),
            timestamp,
            timestamp_source,
        }))
    }

    /// Phase two: sequential classification and name allocation
    fn reconcile(&self, scanned: &[ScanEntry], records: Vec<RecordOutcome>) -> Plan {
        let classifier = DuplicateClassifier::new(self.config);
        let mut registry = RunRegistry::default();
        let mut entries = Vec::with_capacity(scanned.len());
        let mut record_iter = records.into_iter();

        for scan_entry in scanned {
            let entry = match scan_entry {
                ScanEntry::Excluded(path) => skip_entry(
                    path,
                    Outcome::SkippedExcluded,
                    "under excluded folder".to_string(),
                ),
                ScanEntry::Unsupported(path) => skip_entry(
                    path,
                    Outcome::SkippedUnsupported,
                    "unsupported extension".to_string(),
                ),
                ScanEntry::Candidate(_) => {
                    match record_iter.next().expect("one record per candidate") {
                        RecordOutcome::Failed { path, reason } => {
                            warn!("planning failed for {}: {}", path.display(), reason);
                            skip_entry(&path, Outcome::Error, reason)
                        }
                        RecordOutcome::Ready(record) => {
                            self.reconcile_record(record, &classifier, &mut registry)
                        }
                    }
                }
            };
            entries.push(entry);
        }

        Plan {
            entries,
            allocator: registry.allocator,
        }
    }

    fn reconcile_record(
        &self,
        record: FileRecord,
        classifier: &DuplicateClassifier,
        registry: &mut RunRegistry,
    ) -> PlanEntry {
        let fingerprint = Fingerprint::of(&record);

        if let Some(original) = registry.originals.get_mut(&fingerprint) {
            let classification = classifier.classify(
                record.size,
                &record.path,
                &original.source,
                &mut original.hash,
            );
            if classification == Classification::Duplicate {
                debug!(
                    "{} duplicates {}",
                    record.path.display(),
                    original.source.display()
                );
                let kept = original.destination.clone();
                return self.duplicate_entry(record, registry, kept);
            }
        }

        self.rename_entry(record, registry)
    }

    /// Plan a unique file into the destination tree and register it as the
    /// original for its fingerprint (first-seen wins)
    fn rename_entry(&self, record: FileRecord, registry: &mut RunRegistry) -> PlanEntry {
        let naming = self.naming_for(&record);
        let dest_dir = match &naming.year {
            Some(year) if self.config.organize_by_year => self.dest_root.join(year),
            _ => self.dest_root.clone(),
        };
        let destination =
            registry
                .allocator
                .allocate(&dest_dir, &naming.stem, &naming.ext, &record.path);

        let reason = if destination == record.path {
            "already in place".to_string()
        } else if naming.kept_original_name {
            "no capture timestamp; kept original name".to_string()
        } else if destination.file_name() == record.path.file_name() {
            "move".to_string()
        } else {
            "move and rename".to_string()
        };

        let fingerprint = Fingerprint::of(&record);
        registry
            .originals
            .entry(fingerprint)
            .or_insert_with(|| OriginalEntry {
                source: record.path.clone(),
                destination: destination.clone(),
                hash: None,
            });

        PlanEntry {
            source: record.path,
            destination: Some(destination),
            outcome: Outcome::Renamed,
            reason,
            timestamp: record.timestamp,
            timestamp_source: record.timestamp_source,
            size: record.size,
        }
    }

    /// Plan a confirmed duplicate; it never consumes a canonical name in the
    /// main tree
    fn duplicate_entry(
        &self,
        record: FileRecord,
        registry: &mut RunRegistry,
        kept: PathBuf,
    ) -> PlanEntry {
        let verb = if self.config.hash_duplicates {
            "content matches"
        } else {
            "timestamp and size match"
        };
        let reason = format!("{} {}", verb, kept.display());

        let destination = match self.config.dup_action {
            DupAction::Move => {
                let naming = self.naming_for(&record);
                Some(registry.allocator.allocate(
                    &self.dup_root,
                    &naming.stem,
                    &naming.ext,
                    &record.path,
                ))
            }
            DupAction::Skip | DupAction::Delete => None,
        };

        PlanEntry {
            source: record.path,
            destination,
            outcome: Outcome::Duplicate,
            reason,
            timestamp: record.timestamp,
            timestamp_source: record.timestamp_source,
            size: record.size,
        }
    }

    /// Decide the desired stem, extension, and year bucket for a record.
    ///
    /// A file already bearing a canonical name keeps it (including any
    /// suffix) instead of being re-derived from its timestamp; a file with
    /// no timestamp at all keeps its original name as the fallback scheme.
    fn naming_for(&self, record: &FileRecord) -> Naming {
        let file_name = record
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = record
            .path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        if naming::is_canonical_name(&file_name) {
            let stem = file_name
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or(file_name.clone());
            let year = naming::canonical_year(&file_name).map(str::to_string);
            return Naming {
                stem,
                ext,
                year,
                kept_original_name: false,
            };
        }

        match record.timestamp {
            Some(ts) => Naming {
                stem: naming::canonical_stem(&ts),
                ext,
                year: Some(format!("{:04}", ts.year())),
                kept_original_name: false,
            },
            None => {
                let stem = file_name
                    .rsplit_once('.')
                    .map(|(stem, _)| stem.to_string())
                    .unwrap_or(file_name);
                Naming {
                    stem,
                    ext,
                    year: None,
                    kept_original_name: true,
                }
            }
        }
    }
}

struct Naming {
    stem: String,
    ext: String,
    year: Option<String>,
    kept_original_name: bool,
}

fn skip_entry(path: &Path, outcome: Outcome, reason: String) -> PlanEntry {
    PlanEntry {
        source: path.to_path_buf(),
        destination: None,
        outcome,
        reason,
        timestamp: None,
        timestamp_source: TimestampSource::None,
        size: 0,
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    /// Oracle stub mapping file names to fixed capture times
    struct FixedOracle {
        by_name: HashMap<String, NaiveDateTime>,
    }

    impl FixedOracle {
        fn new(pairs: &[(&str, NaiveDateTime)]) -> Self {
            Self {
                by_name: pairs
                    .iter()
                    .map(|(name, ts)| (name.to_string(), *ts))
                    .collect(),
            }
        }
    }

    impl MetadataOracle for FixedOracle {
        fn capture_time(&self, path: &Path) -> Result<Option<crate::types::CaptureTime>> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            Ok(self.by_name.get(&name).map(|ts| crate::types::CaptureTime {
                when: *ts,
                source: TimestampSource::Exif("DateTimeOriginal".into()),
            }))
        }
    }

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn config() -> Config {
        Config {
            mtime_fallback: false,
            threads: 1,
            ..Config::default()
        }
    }

    fn entry_for<'p>(plan: &'p Plan, name: &str) -> &'p PlanEntry {
        plan.entries
            .iter()
            .find(|e| e.source.file_name().unwrap().to_string_lossy() == name)
            .unwrap()
    }

    #[test]
    fn test_same_second_distinct_sizes_get_suffixes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.jpg"), b"aaaa").unwrap();
        fs::write(dir.path().join("B.jpg"), b"bbbbbbbb").unwrap();

        let stamp = ts(2020, 1, 1, 10, 0, 0);
        let oracle = FixedOracle::new(&[("A.jpg", stamp), ("B.jpg", stamp)]);
        let config = config();
        let plan = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        let a = entry_for(&plan, "A.jpg");
        let b = entry_for(&plan, "B.jpg");
        assert_eq!(a.outcome, Outcome::Renamed);
        assert_eq!(b.outcome, Outcome::Renamed);
        assert_eq!(
            a.destination.as_ref().unwrap().file_name().unwrap(),
            "20200101_100000.jpg"
        );
        assert_eq!(
            b.destination.as_ref().unwrap().file_name().unwrap(),
            "20200101_100000_01.jpg"
        );
    }

    #[test]
    fn test_exact_duplicate_routed_to_duplicates_subtree() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.jpg"), b"same bytes").unwrap();
        fs::write(dir.path().join("B.jpg"), b"same bytes").unwrap();

        let stamp = ts(2021, 5, 5, 12, 0, 0);
        let oracle = FixedOracle::new(&[("A.jpg", stamp), ("B.jpg", stamp)]);
        let config = config();
        let plan = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        let a = entry_for(&plan, "A.jpg");
        let b = entry_for(&plan, "B.jpg");
        assert_eq!(a.outcome, Outcome::Renamed);
        assert_eq!(
            a.destination.as_ref().unwrap().file_name().unwrap(),
            "20210505_120000.jpg"
        );
        assert_eq!(b.outcome, Outcome::Duplicate);
        let dup_dest = b.destination.as_ref().unwrap();
        assert!(dup_dest.starts_with(dir.path().join("all_photos").join("_DUPLICATES")));
        assert_eq!(dup_dest.file_name().unwrap(), "20210505_120000.jpg");
        assert!(b.reason.contains("content matches"));
    }

    #[test]
    fn test_no_two_entries_share_a_destination() {
        let dir = tempdir().unwrap();
        let stamp = ts(2020, 6, 1, 8, 30, 0);
        let mut pairs = Vec::new();
        for i in 0..5 {
            let name = format!("IMG_{:04}.jpg", i);
            fs::write(dir.path().join(&name), format!("payload {}", i)).unwrap();
            pairs.push((name, stamp));
        }
        let pair_refs: Vec<(&str, NaiveDateTime)> =
            pairs.iter().map(|(n, t)| (n.as_str(), *t)).collect();
        let oracle = FixedOracle::new(&pair_refs);
        let config = config();
        let plan = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        let destinations: Vec<_> = plan
            .entries
            .iter()
            .filter_map(|e| e.destination.clone())
            .collect();
        let unique: std::collections::HashSet<_> = destinations.iter().collect();
        assert_eq!(destinations.len(), 5);
        assert_eq!(unique.len(), destinations.len());
    }

    #[test]
    fn test_unknown_timestamp_keeps_original_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("mystery.jpg"), b"who knows").unwrap();

        let oracle = FixedOracle::new(&[]);
        let config = config();
        let plan = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        let entry = entry_for(&plan, "mystery.jpg");
        assert_eq!(entry.outcome, Outcome::Renamed);
        assert_eq!(
            entry.destination.as_ref().unwrap().file_name().unwrap(),
            "mystery.jpg"
        );
        assert_eq!(entry.timestamp, None);
        assert!(entry.reason.contains("kept original name"));
    }

    #[test]
    fn test_excluded_and_unsupported_still_logged() {
        let dir = tempdir().unwrap();
        let backups = dir.path().join("Backups");
        fs::create_dir(&backups).unwrap();
        fs::write(backups.join("old.jpg"), b"x").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let oracle = FixedOracle::new(&[]);
        let config = Config {
            excluded_folders: vec!["Backups".to_string()],
            ..config()
        };
        let plan = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        let excluded = entry_for(&plan, "old.jpg");
        assert_eq!(excluded.outcome, Outcome::SkippedExcluded);
        assert!(excluded.destination.is_none());

        let unsupported = entry_for(&plan, "notes.txt");
        assert_eq!(unsupported.outcome, Outcome::SkippedUnsupported);
    }

    #[test]
    fn test_canonically_named_file_keeps_its_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("20160817_124851_01.jpg"), b"payload").unwrap();

        // Oracle disagrees with the name; the name still wins
        let oracle = FixedOracle::new(&[("20160817_124851_01.jpg", ts(2019, 1, 1, 0, 0, 0))]);
        let config = config();
        let plan = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        let entry = entry_for(&plan, "20160817_124851_01.jpg");
        assert_eq!(
            entry.destination.as_ref().unwrap().file_name().unwrap(),
            "20160817_124851_01.jpg"
        );
    }

    #[test]
    fn test_organize_by_year_buckets_destination() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.jpg"), b"aaaa").unwrap();
        fs::write(dir.path().join("B.jpg"), b"bbbb").unwrap();

        let oracle = FixedOracle::new(&[
            ("A.jpg", ts(2016, 8, 17, 12, 48, 51)),
            ("B.jpg", ts(2020, 1, 2, 3, 4, 5)),
        ]);
        let config = Config {
            organize_by_year: true,
            ..config()
        };
        let plan = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        let dest_root = dir.path().join("all_photos");
        assert_eq!(
            entry_for(&plan, "A.jpg").destination.as_ref().unwrap(),
            &dest_root.join("2016").join("20160817_124851.jpg")
        );
        assert_eq!(
            entry_for(&plan, "B.jpg").destination.as_ref().unwrap(),
            &dest_root.join("2020").join("20200102_030405.jpg")
        );
    }

    #[test]
    fn test_dup_action_skip_allocates_no_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("A.jpg"), b"same bytes").unwrap();
        fs::write(dir.path().join("B.jpg"), b"same bytes").unwrap();

        let stamp = ts(2021, 5, 5, 12, 0, 0);
        let oracle = FixedOracle::new(&[("A.jpg", stamp), ("B.jpg", stamp)]);
        let config = Config {
            dup_action: DupAction::Skip,
            ..config()
        };
        let plan = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        let b = entry_for(&plan, "B.jpg");
        assert_eq!(b.outcome, Outcome::Duplicate);
        assert!(b.destination.is_none());
    }

    #[test]
    fn test_planning_is_deterministic() {
        let dir = tempdir().unwrap();
        let stamp = ts(2020, 1, 1, 10, 0, 0);
        fs::write(dir.path().join("zz.jpg"), b"zz").unwrap();
        fs::write(dir.path().join("aa.jpg"), b"aaaa").unwrap();

        let oracle = FixedOracle::new(&[("zz.jpg", stamp), ("aa.jpg", stamp)]);
        let config = config();

        let first = Planner::new(&config, &oracle, dir.path()).plan().unwrap();
        let second = Planner::new(&config, &oracle, dir.path()).plan().unwrap();

        // Path-sorted reconciliation: aa gets the base name both times
        assert_eq!(
            entry_for(&first, "aa.jpg").destination,
            entry_for(&second, "aa.jpg").destination
        );
        assert_eq!(
            entry_for(&first, "aa.jpg")
                .destination
                .as_ref()
                .unwrap()
                .file_name()
                .unwrap(),
            "20200101_100000.jpg"
        );
        assert_eq!(
            entry_for(&first, "zz.jpg")
                .destination
                .as_ref()
                .unwrap()
                .file_name()
                .unwrap(),
            "20200101_100000_01.jpg"
        );
    }
}

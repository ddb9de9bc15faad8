use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Supported media formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaFormat {
    Jpeg,
    Png,
    Gif,
    CanonRaw,
    Dng,
    Mp4,
    Mov,
    Avi,
    ThreeGp,
    Other(String),
}

impl MediaFormat {
    /// Determine format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "cr2" => Self::CanonRaw,
            "dng" => Self::Dng,
            "mp4" => Self::Mp4,
            "mov" => Self::Mov,
            "avi" => Self::Avi,
            "3gp" => Self::ThreeGp,
            other => Self::Other(other.to_string()),
        }
    }

    /// Check if format is in the consolidation target set
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Where a capture timestamp came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampSource {
    /// An exiftool date tag, e.g. "DateTimeOriginal"
    Exif(String),
    /// Filesystem modification time fallback
    Mtime,
    /// No timestamp could be determined
    None,
}

impl TimestampSource {
    /// Log/CSV representation, matching the original tool's tags
    pub fn as_tag(&self) -> String {
        match self {
            Self::Exif(tag) => format!("exif:{}", tag),
            Self::Mtime => "fs:mtime".to_string(),
            Self::None => String::new(),
        }
    }
}

/// A capture timestamp together with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTime {
    /// Second-precision capture time (naive; camera clocks carry no zone)
    pub when: NaiveDateTime,

    /// Which metadata tag produced it
    pub source: TimestampSource,
}

/// Representation of a scanned media file
///
/// Built once during the metadata phase and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Full path to the source file
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Capture timestamp, if one could be determined
    pub timestamp: Option<NaiveDateTime>,

    /// Provenance of the timestamp
    pub timestamp_source: TimestampSource,
}

/// Terminal outcome decided for one scanned file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Moved (and possibly renamed) into the destination tree
    Renamed,

    /// Exact duplicate of an earlier file, routed to the duplicates subtree
    Duplicate,

    /// Under an excluded folder; untouched
    SkippedExcluded,

    /// Extension not in the supported media set; untouched
    SkippedUnsupported,

    /// File-scoped failure (locked, vanished, unreadable)
    Error,
}

impl Outcome {
    /// CSV representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Renamed => "renamed",
            Self::Duplicate => "duplicate",
            Self::SkippedExcluded => "skipped-excluded",
            Self::SkippedUnsupported => "skipped-unsupported",
            Self::Error => "error",
        }
    }
}

/// One decided action for one source file, prior to execution
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Path of the file as found during the scan
    pub source: PathBuf,

    /// Where the file is planned to go; None for skips and errors
    pub destination: Option<PathBuf>,

    /// Terminal outcome for this file
    pub outcome: Outcome,

    /// Human-readable explanation (original it duplicates, skip cause, ...)
    pub reason: String,

    /// Timestamp used for naming, if any
    pub timestamp: Option<NaiveDateTime>,

    /// Provenance of the timestamp
    pub timestamp_source: TimestampSource,

    /// File size in bytes (0 when the file could not be read)
    pub size: u64,
}

/// What the Mover actually did with a plan entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveStatus {
    /// File was moved to its planned destination
    Moved,

    /// Dry run: describes the move that would have happened
    WouldMove,

    /// Source already sits at the destination; nothing to do
    AlreadyInPlace,

    /// Destination was occupied by an identical file; treated as done
    AlreadyDone,

    /// Destination was occupied by a different file; moved to a fresh suffix
    Reallocated(PathBuf),

    /// Duplicate left in place (dup-action skip)
    LeftInPlace,

    /// Duplicate deleted (dup-action delete)
    Deleted,

    /// Skipped at planning time; no filesystem action
    Skipped,

    /// The move failed after retrying
    Failed(String),
}

impl MoveStatus {
    /// True for statuses that represent a per-file failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of executing one plan entry
#[derive(Debug, Clone)]
pub struct MoveResult {
    /// The plan entry this result belongs to
    pub entry: PlanEntry,

    /// What actually happened
    pub status: MoveStatus,
}

/// Counters accumulated over one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned: usize,
    pub renamed: usize,
    pub duplicates: usize,
    pub skipped_excluded: usize,
    pub skipped_unsupported: usize,
    pub already_in_place: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Fold one move result into the counters
    pub fn record(&mut self, result: &MoveResult) {
        self.scanned += 1;
        match result.entry.outcome {
            Outcome::Renamed => match result.status {
                MoveStatus::AlreadyInPlace | MoveStatus::AlreadyDone => {
                    self.already_in_place += 1
                }
                MoveStatus::Failed(_) => self.failed += 1,
                _ => self.renamed += 1,
            },
            Outcome::Duplicate => match result.status {
                MoveStatus::Failed(_) => self.failed += 1,
                _ => self.duplicates += 1,
            },
            Outcome::SkippedExcluded => self.skipped_excluded += 1,
            Outcome::SkippedUnsupported => self.skipped_unsupported += 1,
            Outcome::Error => self.failed += 1,
        }
    }

    /// True when any file-scoped failure occurred
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(MediaFormat::from_extension("JPG"), MediaFormat::Jpeg);
        assert_eq!(MediaFormat::from_extension("jpeg"), MediaFormat::Jpeg);
        assert_eq!(MediaFormat::from_extension("cr2"), MediaFormat::CanonRaw);
        assert_eq!(MediaFormat::from_extension("3gp"), MediaFormat::ThreeGp);
        assert!(matches!(
            MediaFormat::from_extension("txt"),
            MediaFormat::Other(_)
        ));
    }

    #[test]
    fn test_supported_set() {
        for ext in ["jpg", "jpeg", "png", "cr2", "dng", "mov", "avi", "3gp", "gif", "mp4"] {
            assert!(MediaFormat::from_extension(ext).is_supported(), "{}", ext);
        }
        assert!(!MediaFormat::from_extension("txt").is_supported());
        assert!(!MediaFormat::from_extension("webp").is_supported());
    }

    #[test]
    fn test_timestamp_source_tags() {
        assert_eq!(
            TimestampSource::Exif("CreateDate".into()).as_tag(),
            "exif:CreateDate"
        );
        assert_eq!(TimestampSource::Mtime.as_tag(), "fs:mtime");
        assert_eq!(TimestampSource::None.as_tag(), "");
    }
}

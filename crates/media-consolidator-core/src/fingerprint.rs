//! File identity used for duplicate detection.
//!
//! Two files are duplicate candidates iff their fingerprints match; the cheap
//! (timestamp, size) key gates the expensive content hash, which is only
//! computed once a candidate pair already exists.

use blake3::Hash as Blake3Hash;
use chrono::NaiveDateTime;
use std::{fs::File, io::Read, path::Path};

use crate::error::Result;
use crate::types::FileRecord;

/// Temporal component of a fingerprint.
///
/// Files without a capture timestamp key on their own file name, so two
/// unknown-date files never spuriously match by time alone; they can still
/// collide when they share a name and size, which the content hash settles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimeKey {
    /// Second-precision capture time
    Taken(NaiveDateTime),

    /// No capture time; the file's own name stands in as the bucket key
    Unnamed(String),
}

/// Comparable identity of a file for duplicate grouping
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub time: TimeKey,
    pub size: u64,
}

impl Fingerprint {
    /// Build the fingerprint of a scanned record
    pub fn of(record: &FileRecord) -> Self {
        let time = match record.timestamp {
            Some(ts) => TimeKey::Taken(ts),
            None => TimeKey::Unnamed(
                record
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
        };
        Self {
            time,
            size: record.size,
        }
    }
}

/// Compute the content hash of a file using the Blake3 algorithm
pub fn compute_content_hash<P: AsRef<Path>>(path: P) -> Result<Blake3Hash> {
    // Open the file with explicit scope to ensure it's closed promptly
    let hash = {
        let mut file = File::open(&path)?;

        let mut hasher = blake3::Hasher::new();

        // Read the file in chunks and update the hasher
        let mut buffer = [0; 8192]; // 8KB buffer
        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        hasher.finalize()
    };

    Ok(hash)
}

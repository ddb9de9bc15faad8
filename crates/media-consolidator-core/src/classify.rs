//! Duplicate-vs-distinct decision for files that already collide on
//! (timestamp, size).

use blake3::Hash as Blake3Hash;
use log::warn;
use std::path::Path;

use crate::config::Config;
use crate::fingerprint::compute_content_hash;

/// Outcome of comparing a candidate against the first-seen original
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Exact duplicate of the original
    Duplicate,

    /// Distinct file; proceeds to normal renaming
    Distinct,
}

/// Confirms or rejects duplicate candidates.
///
/// With hashing enabled two colliding files are Duplicate iff their blake3
/// hashes match; with hashing disabled the (timestamp, size) collision itself
/// is the confirmation, a documented approximation. Files above the size cap
/// are never hashed and always treated as Distinct.
pub struct DuplicateClassifier {
    hash_enabled: bool,
    hash_max_bytes: u64,
}

impl DuplicateClassifier {
    pub fn new(config: &Config) -> Self {
        Self {
            hash_enabled: config.hash_duplicates,
            hash_max_bytes: config.hash_max_bytes,
        }
    }

    /// Classify `candidate` against `original`, both of size `size` and
    /// already matching on fingerprint. `original_hash` caches the original's
    /// content hash across repeated comparisons within one group.
    pub fn classify(
        &self,
        size: u64,
        candidate: &Path,
        original: &Path,
        original_hash: &mut Option<Blake3Hash>,
    ) -> Classification {
        if !self.hash_enabled {
            return Classification::Duplicate;
        }

        if size > self.hash_max_bytes {
            return Classification::Distinct;
        }

        let kept_hash = match original_hash {
            Some(hash) => *hash,
            None => match compute_content_hash(original) {
                Ok(hash) => {
                    *original_hash = Some(hash);
                    hash
                }
                Err(e) => {
                    warn!("cannot hash original {}: {}", original.display(), e);
                    return Classification::Distinct;
                }
            },
        };

        match compute_content_hash(candidate) {
            Ok(hash) if hash == kept_hash => Classification::Duplicate,
            Ok(_) => Classification::Distinct,
            Err(e) => {
                warn!("cannot hash candidate {}: {}", candidate.display(), e);
                Classification::Distinct
            }
        }
    }
}

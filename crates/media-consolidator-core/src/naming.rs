//! Canonical destination names and collision handling.
//!
//! A unique file is named `YYYYMMDD_HHMMSS.ext` from its capture time; when
//! that name is taken (claimed earlier in the run, or present on disk), a
//! zero-padded numeric suffix is appended: `YYYYMMDD_HHMMSS_01.ext`, `_02`, ...

use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Run-scoped registry of claimed destination paths.
///
/// At most one source file may claim a given destination; all claims funnel
/// through `allocate`, which resolves collisions deterministically for a
/// fixed iteration order of the input set.
#[derive(Debug, Default)]
pub struct NameAllocator {
    claimed: HashSet<PathBuf>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a unique destination for `stem.ext` inside `dir`.
    ///
    /// A candidate is rejected if it was already claimed this run, or if it
    /// exists on disk and is not `source` itself (a file already sitting at
    /// its own destination may keep its place). The extension is stored
    /// lower-cased; the suffix counter is unbounded.
    pub fn allocate(&mut self, dir: &Path, stem: &str, ext: &str, source: &Path) -> PathBuf {
        let ext = ext.to_lowercase();
        let mut candidate = dir.join(format!("{}.{}", stem, ext));
        let mut i = 1u32;
        while !self.available(&candidate, source) {
            candidate = dir.join(format!("{}_{:02}.{}", stem, i, ext));
            i += 1;
        }
        self.claimed.insert(candidate.clone());
        candidate
    }

    /// True if `path` has been claimed during this run
    pub fn is_claimed(&self, path: &Path) -> bool {
        self.claimed.contains(path)
    }

    fn available(&self, candidate: &Path, source: &Path) -> bool {
        !self.claimed.contains(candidate) && (!candidate.exists() || candidate == source)
    }
}

/// Format a capture time as a canonical file stem
pub fn canonical_stem(ts: &NaiveDateTime) -> String {
    ts.format("%Y%m%d_%H%M%S").to_string()
}

/// True if `name` already has the canonical shape
/// `YYYYMMDD_HHMMSS.ext` or `YYYYMMDD_HHMMSS_NN.ext`
pub fn is_canonical_name(name: &str) -> bool {
    split_canonical(name).is_some()
}

/// Extract the year component of a canonical file name
pub fn canonical_year(name: &str) -> Option<&str> {
    split_canonical(name).map(|_| &name[..4])
}

/// Validate the canonical shape, returning `(stem, ext)` on success
fn split_canonical(name: &str) -> Option<(&str, &str)> {
    let (stem, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }

    let bytes = stem.as_bytes();
    let base_ok = |b: &[u8]| {
        b.len() == 15
            && b[..8].iter().all(u8::is_ascii_digit)
            && b[8] == b'_'
            && b[9..].iter().all(u8::is_ascii_digit)
    };

    match bytes.len() {
        15 => base_ok(bytes).then_some((stem, ext)),
        18 => (base_ok(&bytes[..15])
            && bytes[15] == b'_'
            && bytes[16..].iter().all(u8::is_ascii_digit))
        .then_some((stem, ext)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_canonical_stem_format() {
        assert_eq!(canonical_stem(&ts(10, 0, 0)), "20200101_100000");
        assert_eq!(canonical_stem(&ts(9, 5, 3)), "20200101_090503");
    }

    #[test]
    fn test_is_canonical_name() {
        assert!(is_canonical_name("20160817_124851.jpg"));
        assert!(is_canonical_name("20160817_124851_01.jpg"));
        assert!(is_canonical_name("20160817_124851.CR2"));
        assert!(!is_canonical_name("IMG_1234.jpg"));
        assert!(!is_canonical_name("20160817-124851.jpg"));
        assert!(!is_canonical_name("20160817_124851_1.jpg"));
        assert!(!is_canonical_name("20160817_124851_001.jpg"));
        assert!(!is_canonical_name("20160817_124851"));
        assert!(!is_canonical_name("20160817_124851.tar.gz!"));
    }

    #[test]
    fn test_canonical_year() {
        assert_eq!(canonical_year("20160817_124851.jpg"), Some("2016"));
        assert_eq!(canonical_year("20160817_124851_02.mp4"), Some("2016"));
        assert_eq!(canonical_year("IMG_1234.jpg"), None);
    }

    #[test]
    fn test_allocate_suffixes_in_run_registry() {
        let dir = tempdir().unwrap();
        let mut allocator = NameAllocator::new();

        let a = allocator.allocate(dir.path(), "20200101_100000", "jpg", Path::new("/src/a.jpg"));
        let b = allocator.allocate(dir.path(), "20200101_100000", "jpg", Path::new("/src/b.jpg"));
        let c = allocator.allocate(dir.path(), "20200101_100000", "jpg", Path::new("/src/c.jpg"));

        assert_eq!(a, dir.path().join("20200101_100000.jpg"));
        assert_eq!(b, dir.path().join("20200101_100000_01.jpg"));
        assert_eq!(c, dir.path().join("20200101_100000_02.jpg"));
    }

    #[test]
    fn test_allocate_respects_on_disk_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("20200101_100000.jpg"), b"x").unwrap();

        let mut allocator = NameAllocator::new();
        let got = allocator.allocate(dir.path(), "20200101_100000", "jpg", Path::new("/src/a.jpg"));
        assert_eq!(got, dir.path().join("20200101_100000_01.jpg"));
    }

    #[test]
    fn test_allocate_lets_source_keep_its_own_place() {
        let dir = tempdir().unwrap();
        let in_place = dir.path().join("20200101_100000.jpg");
        std::fs::write(&in_place, b"x").unwrap();

        let mut allocator = NameAllocator::new();
        let got = allocator.allocate(dir.path(), "20200101_100000", "JPG", &in_place);
        assert_eq!(got, in_place);
    }

    #[test]
    fn test_allocate_lowercases_extension() {
        let dir = tempdir().unwrap();
        let mut allocator = NameAllocator::new();
        let got = allocator.allocate(dir.path(), "20200101_100000", "JPG", Path::new("/src/a.JPG"));
        assert_eq!(got, dir.path().join("20200101_100000.jpg"));
    }
}

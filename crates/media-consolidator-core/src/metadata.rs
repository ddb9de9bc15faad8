//! Capture-timestamp extraction.
//!
//! The oracle is a pure function boundary: path in, optional capture time out.
//! Ordinary extraction failures (missing tags, corrupt metadata, tool timeout)
//! map to `Ok(None)`; only a misconfigured environment (exiftool absent) is an
//! error, and that aborts the run before any file is touched.

use chrono::{DateTime, Local, NaiveDateTime};
use log::{debug, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::types::{CaptureTime, TimestampSource};

/// Date tags queried from exiftool, in no particular priority order;
/// the oldest (or newest) parsed value wins.
const EXIF_DATE_TAGS: [&str; 13] = [
    "DateTimeOriginal",
    "CreateDate",
    "MediaCreateDate",
    "TrackCreateDate",
    "ContentCreateDate",
    "CreationDate",
    "QuickTime:CreateDate",
    "QuickTime:MediaCreateDate",
    "QuickTime:TrackCreateDate",
    "EXIF:DateTimeOriginal",
    "EXIF:CreateDate",
    "ModifyDate",
    "FileModifyDate",
];

/// Maps a file path to an optional capture timestamp.
pub trait MetadataOracle: Send + Sync {
    /// Extract the capture time of `path`, or `None` if it has no usable
    /// date metadata. Errors are reserved for environment failures.
    fn capture_time(&self, path: &Path) -> Result<Option<CaptureTime>>;
}

/// Oracle backed by an external `exiftool` binary
pub struct ExifToolOracle {
    binary: PathBuf,
    timeout: Duration,
    prefer_newest: bool,
}

impl ExifToolOracle {
    /// Locate and probe the exiftool binary.
    ///
    /// `command` may be a bare command name (resolved against PATH by the
    /// OS) or an explicit path. The probe runs `exiftool -ver`; failure to
    /// spawn or a non-zero exit is fatal.
    pub fn locate(command: &str, timeout_secs: u64, prefer_newest: bool) -> Result<Self> {
        let probe = Command::new(command)
            .arg("-ver")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match probe {
            Ok(status) if status.success() => Ok(Self {
                binary: PathBuf::from(command),
                timeout: Duration::from_secs(timeout_secs),
                prefer_newest,
            }),
            Ok(status) => Err(Error::OracleUnavailable(format!(
                "{} -ver exited with {}",
                command, status
            ))),
            Err(e) => Err(Error::OracleUnavailable(format!(
                "cannot run {}: {}",
                command, e
            ))),
        }
    }

    /// Run exiftool on one file and return `Tag -> value` pairs.
    ///
    /// A hung or slow invocation is killed after the timeout and treated as
    /// "no metadata". exiftool's tag output is a few hundred bytes, well
    /// under the pipe buffer, so reading stdout after exit cannot block.
    fn run_exiftool(&self, path: &Path) -> Vec<(String, String)> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-s").arg("-s").arg("-api").arg("QuickTimeUTC=1");
        for tag in EXIF_DATE_TAGS {
            cmd.arg(format!("-{}", tag));
        }
        cmd.arg(path);
        cmd.stdout(Stdio::piped()).stderr(Stdio::null());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("failed to spawn exiftool for {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!("exiftool timed out on {}", path.display());
                        let _ = child.kill();
                        let _ = child.wait();
                        return Vec::new();
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    warn!("failed to wait for exiftool on {}: {}", path.display(), e);
                    return Vec::new();
                }
            }
        };

        if !status.success() {
            debug!("exiftool exited with {} on {}", status, path.display());
            return Vec::new();
        }

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            let _ = pipe.read_to_string(&mut stdout);
        }
        parse_tag_lines(&stdout)
    }
}

impl MetadataOracle for ExifToolOracle {
    fn capture_time(&self, path: &Path) -> Result<Option<CaptureTime>> {
        let mut candidates: Vec<(NaiveDateTime, String)> = self
            .run_exiftool(path)
            .into_iter()
            .filter_map(|(tag, value)| parse_exif_datetime(&value).map(|dt| (dt, tag)))
            .collect();

        if candidates.is_empty() {
            return Ok(None);
        }

        candidates.sort_by_key(|(dt, _)| *dt);
        let (when, tag) = if self.prefer_newest {
            candidates.pop().unwrap()
        } else {
            candidates.swap_remove(0)
        };

        Ok(Some(CaptureTime {
            when,
            source: TimestampSource::Exif(tag),
        }))
    }
}

/// Oracle that only consults the filesystem modification time.
///
/// Used when exiftool is disabled outright; extraction cannot fail in an
/// environment sense, so this oracle never diverts the run.
pub struct MtimeOracle;

impl MetadataOracle for MtimeOracle {
    fn capture_time(&self, path: &Path) -> Result<Option<CaptureTime>> {
        Ok(mtime_capture(path))
    }
}

/// Read a file's mtime as a capture time, or `None` if stat fails
pub fn mtime_capture(path: &Path) -> Option<CaptureTime> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let when = DateTime::<Local>::from(modified).naive_local();
    Some(CaptureTime {
        when,
        source: TimestampSource::Mtime,
    })
}

/// Split `-s -s` exiftool output into `(tag, value)` pairs
fn parse_tag_lines(stdout: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((tag, value)) = line.split_once(':') {
            let tag = tag.trim();
            let value = value.trim();
            if !tag.is_empty() && !value.is_empty() {
                out.push((tag.to_string(), value.to_string()));
            }
        }
    }
    out
}

/// Parse the leading `YYYY:MM:DD HH:MM:SS` of an EXIF date value.
///
/// Values may carry sub-seconds or a zone offset (`2016:08:17 12:48:51+02:00`);
/// anything past the second field is ignored.
pub fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
    let head = value.trim().get(..19)?;
    NaiveDateTime::parse_from_str(head, "%Y:%m:%d %H:%M:%S").ok()
}

//! Incoming-folder work queue
//!
//! A scan is claimed by renaming it in place, which is atomic within one
//! folder. Whoever wins the rename owns the file; a loser sees it vanish and
//! moves on. Finished scans keep a `.done` or `.failed` suffix so they never
//! match the pending scan again.

use rhinovate_core::Result;
use rhinovate_io::ScanFormat;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const CLAIMED_SUFFIX: &str = "processing";
const DONE_SUFFIX: &str = "done";
const FAILED_SUFFIX: &str = "failed";

/// Pending scans in one incoming folder
#[derive(Debug, Clone)]
pub struct WorkQueue {
    incoming: PathBuf,
}

/// A scan owned by this process until it is finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedScan {
    /// Name the scan arrived under
    pub original: PathBuf,
    /// Where the scan lives while it is processed
    pub claimed: PathBuf,
}

impl WorkQueue {
    pub fn new<P: Into<PathBuf>>(incoming: P) -> Self {
        Self {
            incoming: incoming.into(),
        }
    }

    pub fn incoming(&self) -> &Path {
        &self.incoming
    }

    /// Loadable scans waiting in the folder, sorted by name
    pub fn pending(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.incoming)? {
            let path = entry?.path();
            if path.is_file() && ScanFormat::from_path(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Take ownership of `path`; `None` when another worker got it first
    pub fn claim(&self, path: &Path) -> Result<Option<ClaimedScan>> {
        let claimed = with_suffix(path, CLAIMED_SUFFIX);
        match fs::rename(path, &claimed) {
            Ok(()) => {
                debug!(file = %path.display(), "Claimed scan");
                Ok(Some(ClaimedScan {
                    original: path.to_path_buf(),
                    claimed,
                }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark a claimed scan done or failed; returns its final location
    pub fn finish(&self, scan: &ClaimedScan, succeeded: bool) -> Result<PathBuf> {
        let suffix = if succeeded { DONE_SUFFIX } else { FAILED_SUFFIX };
        let target = with_suffix(&scan.original, suffix);
        fs::rename(&scan.claimed, &target)?;
        Ok(target)
    }
}

/// `scan.ply` -> `scan.ply.<suffix>`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

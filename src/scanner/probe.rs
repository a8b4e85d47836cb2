//! Metadata probe: stats a single filesystem entry and produces its record.
//!
//! Only regular files and directories are represented. Symlinks and special
//! files (sockets, fifos, devices) are skipped, not recorded. A failed stat is
//! a recoverable condition the caller skips over; a partial or zeroed record
//! is never emitted.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::core::errors::{Result, SnwError};

/// Kind of filesystem object a snapshot record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Single-letter code used in snapshot records.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::File => 'F',
            Self::Directory => 'D',
        }
    }
}

/// One snapshot record: a successfully stat-ed filesystem object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Byte length; meaningful for files only.
    pub size: u64,
    pub modified: SystemTime,
}

/// Probe output: the record plus traversal-internal metadata the walker needs
/// (identity for the cycle guard, mode bits for the escalation gate).
#[derive(Debug, Clone)]
pub struct ProbedEntry {
    pub entry: Entry,
    pub device: u64,
    pub inode: u64,
    mode: u32,
}

impl ProbedEntry {
    /// (device, inode) pair identifying this object for cycle detection.
    #[must_use]
    pub const fn identity(&self) -> (u64, u64) {
        (self.device, self.inode)
    }

    /// The escalation gate: no read, write, or execute permission for owner,
    /// group, or other. Used as a proxy for "something deliberately hid this".
    #[must_use]
    pub fn is_zero_permission(&self) -> bool {
        #[cfg(unix)]
        {
            self.mode & 0o777 == 0
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

/// Stat one path. `Ok(None)` means the object exists but is not a regular
/// file or directory; an `Err` is always recoverable for the caller.
pub fn probe(path: &Path, follow_symlinks: bool) -> Result<Option<ProbedEntry>> {
    let meta = metadata_for_path(path, follow_symlinks).map_err(|source| SnwError::Probe {
        path: path.to_path_buf(),
        source,
    })?;

    // Kind comes from the file type, never from the name.
    let ft = meta.file_type();
    let kind = if ft.is_file() {
        EntryKind::File
    } else if ft.is_dir() {
        EntryKind::Directory
    } else {
        return Ok(None);
    };

    let (device, inode, mode) = identity_and_mode(&meta);
    Ok(Some(ProbedEntry {
        entry: Entry {
            path: path.to_path_buf(),
            kind,
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        },
        device,
        inode,
        mode,
    }))
}

fn metadata_for_path(path: &Path, follow_symlinks: bool) -> std::io::Result<fs::Metadata> {
    if follow_symlinks {
        fs::metadata(path)
    } else {
        fs::symlink_metadata(path)
    }
}

fn identity_and_mode(meta: &fs::Metadata) -> (u64, u64, u32) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        (meta.dev(), meta.ino(), meta.mode())
    }
    #[cfg(not(unix))]
    {
        let _ = meta;
        (0, 0, 0o644)
    }
}

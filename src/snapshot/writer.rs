//! Snapshot writer: append-only plain-text inventory of a walked tree.
//!
//! File layout:
//! - a single header line, written only when the file is empty;
//! - one tab-separated record per entry: absolute path, type code (`F` or
//!   `D`), size in bytes, last-modified local time.
//!
//! Re-running against an existing snapshot appends a new segment after the
//! old one. Before appending, the writer checks the file's last byte and
//! inserts a newline if a previous writer was cut off mid-record, so a new
//! segment never fuses with a truncated line.
//!
//! The file is opened in append mode, so every write lands at the current
//! end of file. Two handles on the same snapshot can therefore interleave at
//! record granularity but never overwrite each other's records. Each record
//! is assembled in memory and emitted with one `write_all`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::core::errors::{Result, SnwError};
use crate::scanner::probe::Entry;

/// First line of every snapshot file, describing the column order.
pub const SNAPSHOT_HEADER: &str = "The order is: Name, Type, Size, Last Modified";

/// Append-only writer over one snapshot file.
#[derive(Debug)]
pub struct SnapshotWriter {
    path: PathBuf,
    file: File,
}

impl SnapshotWriter {
    /// Open (or create) the snapshot at `path`. The header is written once,
    /// the first time the file is seen empty; appending to a populated file
    /// never repeats it.
    pub fn open(path: &Path) -> Result<Self> {
        let write_err = |source| SnwError::SnapshotWrite {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(write_err)?;

        let len = file.metadata().map_err(write_err)?.len();
        if len == 0 {
            file.write_all(format!("{SNAPSHOT_HEADER}\n").as_bytes())
                .map_err(write_err)?;
        } else {
            // Repair a missing trailing newline before any new record lands.
            file.seek(SeekFrom::End(-1)).map_err(write_err)?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last).map_err(write_err)?;
            if last[0] != b'\n' {
                file.write_all(b"\n").map_err(write_err)?;
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record line.
    pub fn append_record(&mut self, entry: &Entry) -> Result<()> {
        let line = format_record(entry);
        self.file
            .write_all(line.as_bytes())
            .map_err(|source| SnwError::SnapshotWrite {
                path: self.path.clone(),
                source,
            })
    }

    /// Append a whole segment in traversal order.
    pub fn append_segment(&mut self, segment: &[Entry]) -> Result<()> {
        for entry in segment {
            self.append_record(entry)?;
        }
        self.flush()
    }

    /// Push buffered bytes to the OS.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(|source| SnwError::SnapshotWrite {
            path: self.path.clone(),
            source,
        })
    }
}

/// One tab-separated record line, newline-terminated.
#[must_use]
pub fn format_record(entry: &Entry) -> String {
    let modified: DateTime<Local> = entry.modified.into();
    format!(
        "{}\t{}\t{}\t{}\n",
        entry.path.display(),
        entry.kind.code(),
        entry.size,
        modified.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Per-target snapshot file name: `Snapshot_<sanitized target>.txt`, with
/// path separators flattened so the name is a single component.
#[must_use]
pub fn snapshot_file_name(target: &Path) -> String {
    let sanitized: String = target
        .display()
        .to_string()
        .chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "Snapshot_root.txt".to_string()
    } else {
        format!("Snapshot_{trimmed}.txt")
    }
}

//! JSONL audit log: append-only line-delimited JSON of scan activity.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written with a single `write_all` so a tailing process never observes
//! a partial line.
//!
//! Four-level fallback chain:
//! 1. Primary file path
//! 2. Fallback path (e.g. a RAM-backed location)
//! 3. stderr with `[SNW-AUDIT]` prefix
//! 4. Silent discard (a scan must never fail because its audit log did)

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::config::AuditConfig;

/// Severity level for audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event types matching the snw activity model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ScanStarted,
    ScanCompleted,
    WorkerFinished,
    FileQuarantined,
    QuarantineFailed,
    VerifierConfirmed,
    ProbeFailed,
    TraversalFailed,
    SnapshotWriteFailed,
    Error,
}

/// A single audit entry; all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Affected filesystem path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Target directory the owning worker is scanning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Size in bytes of the affected item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Verdict reason for quarantine events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// SNW error code if the event records a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl AuditEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            event,
            severity,
            path: None,
            target: None,
            size: None,
            reason: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Fallback,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with multi-level fallback.
pub struct JsonlWriter {
    fallback_path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    state: WriterState,
}

impl JsonlWriter {
    /// Open the audit log. Falls through the degradation chain on failure.
    pub fn open(config: &AuditConfig) -> Self {
        let mut w = Self {
            fallback_path: config.fallback_path.clone(),
            writer: None,
            state: WriterState::Discard,
        };
        if let Some(path) = &config.log_path {
            match open_append(path) {
                Some(file) => {
                    w.writer = Some(file);
                    w.state = WriterState::Normal;
                }
                None => w.degrade(),
            }
        }
        w
    }

    /// Write a single entry as one atomic JSONL line.
    pub fn write_entry(&mut self, entry: &AuditEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                // Serialization failure is a programming error; note it and bail.
                let _ = writeln!(io::stderr(), "[SNW-AUDIT] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state, for diagnostics.
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        loop {
            match self.state {
                WriterState::Normal | WriterState::Fallback => {
                    let ok = self
                        .writer
                        .as_mut()
                        .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                    if ok {
                        return;
                    }
                    self.degrade();
                }
                WriterState::Stderr => {
                    let _ = write!(io::stderr(), "[SNW-AUDIT] {line}");
                    return;
                }
                WriterState::Discard => return,
            }
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Discard | WriterState::Normal => {
                if let Some(file) = self.fallback_path.as_ref().and_then(|p| open_append(p)) {
                    self.writer = Some(file);
                    WriterState::Fallback
                } else {
                    WriterState::Stderr
                }
            }
            WriterState::Fallback => WriterState::Stderr,
            WriterState::Stderr => WriterState::Discard,
        };
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

fn open_append(path: &std::path::Path) -> Option<BufWriter<File>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).ok()?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
    Some(BufWriter::new(file))
}

/// Thread-shareable audit log handle. A disabled handle discards everything,
/// so call sites never need to branch on whether auditing is configured.
#[derive(Clone)]
pub struct AuditLog {
    inner: Option<Arc<Mutex<JsonlWriter>>>,
}

impl AuditLog {
    /// Open from config; disabled when no log path is configured.
    #[must_use]
    pub fn from_config(config: &AuditConfig) -> Self {
        if config.log_path.is_none() {
            return Self::disabled();
        }
        Self {
            inner: Some(Arc::new(Mutex::new(JsonlWriter::open(config)))),
        }
    }

    /// A handle that records nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Record one entry.
    pub fn record(&self, entry: &AuditEntry) {
        if let Some(writer) = &self.inner {
            writer.lock().write_entry(entry);
        }
    }

    /// Flush buffered entries.
    pub fn flush(&self) {
        if let Some(writer) = &self.inner {
            writer.lock().flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("audit.jsonl");
        let config = AuditConfig {
            log_path: Some(log_path.clone()),
            fallback_path: None,
        };

        let mut writer = JsonlWriter::open(&config);
        assert_eq!(writer.state(), "normal");

        let mut entry = AuditEntry::new(EventType::FileQuarantined, Severity::Warning);
        entry.path = Some("/tmp/a/hidden.bin".to_string());
        entry.reason = Some("keyword \"attack\"".to_string());
        writer.write_entry(&entry);
        writer.write_entry(&AuditEntry::new(EventType::ScanCompleted, Severity::Info));
        writer.flush();

        let lines = read_lines(&log_path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "file_quarantined");
        assert_eq!(lines[0]["path"], "/tmp/a/hidden.bin");
        assert_eq!(lines[1]["event"], "scan_completed");
    }

    #[test]
    fn none_fields_are_omitted_from_json() {
        let entry = AuditEntry::new(EventType::ScanStarted, Severity::Info);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("\"path\""));
        assert!(!json.contains("\"error_code\""));
        assert!(json.contains("\"event\":\"scan_started\""));
    }

    #[test]
    fn unopenable_primary_falls_back_to_secondary_path() {
        let tmp = tempfile::tempdir().unwrap();
        let fallback = tmp.path().join("fallback.jsonl");
        let config = AuditConfig {
            // A primary whose parent is a regular file can never be created.
            log_path: Some(blocked_path(tmp.path())),
            fallback_path: Some(fallback.clone()),
        };

        let mut writer = JsonlWriter::open(&config);
        assert_eq!(writer.state(), "fallback");

        writer.write_entry(&AuditEntry::new(EventType::Error, Severity::Critical));
        writer.flush();
        assert_eq!(read_lines(&fallback).len(), 1);
    }

    fn blocked_path(dir: &Path) -> PathBuf {
        let file = dir.join("not-a-dir");
        std::fs::write(&file, b"occupied").unwrap();
        file.join("audit.jsonl")
    }

    #[test]
    fn disabled_handle_discards_silently() {
        let log = AuditLog::disabled();
        log.record(&AuditEntry::new(EventType::ScanStarted, Severity::Info));
        log.flush();
    }

    #[test]
    fn shared_handle_appends_across_clones() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("audit.jsonl");
        let log = AuditLog::from_config(&AuditConfig {
            log_path: Some(log_path.clone()),
            fallback_path: None,
        });

        let clone = log.clone();
        log.record(&AuditEntry::new(EventType::ScanStarted, Severity::Info));
        clone.record(&AuditEntry::new(EventType::ScanCompleted, Severity::Info));
        log.flush();

        assert_eq!(read_lines(&log_path).len(), 2);
    }
}

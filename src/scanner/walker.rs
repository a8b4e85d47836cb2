//! Directory walker: depth-first pre-order traversal of one target tree.
//!
//! The walker is the "eyes" of the pipeline: it records every stat-accessible
//! file and directory into the target's snapshot segment, applies the
//! zero-permission escalation gate, and hands flagged candidates to the
//! quarantine manager.
//!
//! Record policy: a directory's record precedes its children (pre-order).
//!
//! Failure policy: probe failures and directory-open failures are skip-and-
//! continue. A diagnostic goes to stderr and the audit log while siblings and
//! the rest of the walk proceed. Nothing in a walk is fatal to the worker.
//!
//! Safety guards:
//! - Symlinks are skipped unless `follow_symlinks` is set; when following,
//!   a (device, inode) visited set breaks symlink cycles.
//! - Recursion is bounded by `max_depth`.
//! - Excluded paths (including the quarantine and output directories when
//!   they sit under the target) are never entered.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::SnwError;
use crate::logger::jsonl::{AuditEntry, AuditLog, EventType, Severity};
use crate::scanner::heuristic::{ContentHeuristic, Verdict};
use crate::scanner::probe::{self, Entry, EntryKind};
use crate::scanner::quarantine::{QuarantineManager, VerifierHandle};

/// Per-target walker configuration.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    pub root: PathBuf,
    pub max_depth: usize,
    pub follow_symlinks: bool,
    pub excluded_paths: HashSet<PathBuf>,
}

/// Everything one walk produced.
#[derive(Debug, Clone, Default)]
pub struct WalkReport {
    /// The target's snapshot segment, in traversal order.
    pub segment: Vec<Entry>,
    /// Files relocated into the isolation directory.
    pub quarantined: Vec<PathBuf>,
    /// Files that passed the zero-permission gate.
    pub escalated: usize,
    /// Recoverable failures skipped over during the walk.
    pub recovered_failures: usize,
}

/// Recursive walker over one target directory.
pub struct DirectoryWalker<'a> {
    config: WalkerConfig,
    heuristic: &'a ContentHeuristic,
    quarantine: &'a QuarantineManager,
    audit: AuditLog,
    visited: HashSet<(u64, u64)>,
    pending_verifications: Vec<VerifierHandle>,
    report: WalkReport,
}

impl<'a> DirectoryWalker<'a> {
    #[must_use]
    pub fn new(
        config: WalkerConfig,
        heuristic: &'a ContentHeuristic,
        quarantine: &'a QuarantineManager,
        audit: AuditLog,
    ) -> Self {
        Self {
            config,
            heuristic,
            quarantine,
            audit,
            visited: HashSet::new(),
            pending_verifications: Vec::new(),
            report: WalkReport::default(),
        }
    }

    /// Walk the target to completion and return its report.
    ///
    /// All verifier children spawned during the walk are reaped before this
    /// returns; none outlive the worker.
    pub fn walk(mut self) -> WalkReport {
        let root = self.config.root.clone();
        match probe::probe(&root, true) {
            Ok(Some(probed)) if probed.entry.kind == EntryKind::Directory => {
                // Seed the cycle guard so a symlink back to the root is caught.
                self.visited.insert(probed.identity());
                self.walk_dir(&root, 0);
            }
            Ok(_) => {
                let err = SnwError::Traversal {
                    path: root.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotADirectory,
                        "target is not a directory",
                    ),
                };
                self.recover(&root, &err, EventType::TraversalFailed);
            }
            Err(err) => self.recover(&root, &err, EventType::TraversalFailed),
        }
        self.reap_verifications();
        self.report
    }

    fn walk_dir(&mut self, dir: &Path, depth: usize) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) => {
                let err = SnwError::Traversal {
                    path: dir.to_path_buf(),
                    source,
                };
                self.recover(dir, &err, EventType::TraversalFailed);
                return;
            }
        };

        for entry_result in entries {
            let dirent = match entry_result {
                Ok(dirent) => dirent,
                Err(source) => {
                    let err = SnwError::Traversal {
                        path: dir.to_path_buf(),
                        source,
                    };
                    self.recover(dir, &err, EventType::TraversalFailed);
                    continue;
                }
            };
            let child = dirent.path();
            if self.config.excluded_paths.contains(&child) {
                continue;
            }

            let probed = match probe::probe(&child, self.config.follow_symlinks) {
                Ok(Some(probed)) => probed,
                // Symlink or special file: skipped, never represented.
                Ok(None) => continue,
                Err(err) => {
                    self.recover(&child, &err, EventType::ProbeFailed);
                    continue;
                }
            };

            let identity = probed.identity();
            match probed.entry.kind {
                EntryKind::Directory => {
                    if !self.visited.insert(identity) {
                        eprintln!(
                            "snw: skipping already-visited directory {} (cycle guard)",
                            child.display()
                        );
                        continue;
                    }
                    self.report.segment.push(probed.entry);
                    if depth + 1 > self.config.max_depth {
                        eprintln!(
                            "snw: depth cap {} reached, not descending into {}",
                            self.config.max_depth,
                            child.display()
                        );
                        continue;
                    }
                    self.walk_dir(&child, depth + 1);
                }
                EntryKind::File => self.record_file(probed),
            }
        }
    }

    fn record_file(&mut self, probed: probe::ProbedEntry) {
        let escalate = probed.is_zero_permission();
        let path = probed.entry.path.clone();
        let size = probed.entry.size;
        self.report.segment.push(probed.entry);

        // Narrow trigger: content is only ever evaluated for files with no
        // permission bits at all.
        if !escalate {
            return;
        }
        self.report.escalated += 1;

        // The out-of-process gate runs concurrently with the rest of the walk
        // and is reaped at the end.
        match self.quarantine.spawn_verifier(&path) {
            Some(Ok(handle)) => self.pending_verifications.push(handle),
            Some(Err(err)) => self.recover(&path, &err, EventType::Error),
            None => {}
        }

        match self.heuristic.evaluate(&path) {
            Ok(Verdict::Suspicious(reason)) => {
                self.quarantine_file(&path, Some(size), &reason.to_string());
            }
            Ok(Verdict::Safe) => {}
            Err(err) => self.recover(&path, &err, EventType::Error),
        }
    }

    fn quarantine_file(&mut self, path: &Path, size: Option<u64>, reason: &str) {
        match self.quarantine.relocate(path) {
            Ok(destination) => {
                eprintln!(
                    "snw: quarantined {} -> {} ({reason})",
                    path.display(),
                    destination.display()
                );
                self.report.quarantined.push(path.to_path_buf());
                let mut entry = AuditEntry::new(EventType::FileQuarantined, Severity::Warning);
                entry.path = Some(path.display().to_string());
                entry.target = Some(self.config.root.display().to_string());
                entry.size = size;
                entry.reason = Some(reason.to_string());
                self.audit.record(&entry);
            }
            Err(err) => self.recover(path, &err, EventType::QuarantineFailed),
        }
    }

    /// Join every verifier child spawned during this walk. A non-zero exit
    /// confirms suspicion and triggers relocation unless the in-process
    /// heuristic already moved the file.
    fn reap_verifications(&mut self) {
        let handles = std::mem::take(&mut self.pending_verifications);
        for handle in handles {
            let (path, verdict) = handle.join();
            match verdict {
                Ok(true) => {
                    if !path.exists() {
                        // Already relocated on the in-process verdict.
                        continue;
                    }
                    let mut entry =
                        AuditEntry::new(EventType::VerifierConfirmed, Severity::Warning);
                    entry.path = Some(path.display().to_string());
                    entry.target = Some(self.config.root.display().to_string());
                    self.audit.record(&entry);
                    self.quarantine_file(&path, None, "verifier confirmed");
                }
                Ok(false) => {}
                Err(err) => self.recover(&path, &err, EventType::Error),
            }
        }
    }

    fn recover(&mut self, path: &Path, err: &SnwError, event: EventType) {
        self.report.recovered_failures += 1;
        eprintln!("snw: {err}");
        let mut entry = AuditEntry::new(event, Severity::Warning);
        entry.path = Some(path.display().to_string());
        entry.target = Some(self.config.root.display().to_string());
        entry.error_code = Some(err.code().to_string());
        entry.error_message = Some(err.to_string());
        self.audit.record(&entry);
    }
}

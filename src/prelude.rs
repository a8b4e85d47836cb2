//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use snapshot_warden::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SnwError};

// Logger
pub use crate::logger::jsonl::{AuditEntry, AuditLog, EventType, Severity};

// Scanner
pub use crate::scanner::dispatch::{DispatchReport, JobDispatcher, WorkerOutcome, WorkerStatus};
pub use crate::scanner::heuristic::{ContentHeuristic, SuspicionReason, Verdict};
pub use crate::scanner::probe::{Entry, EntryKind, ProbedEntry};
pub use crate::scanner::quarantine::QuarantineManager;
pub use crate::scanner::walker::{DirectoryWalker, WalkReport, WalkerConfig};

// Snapshot
pub use crate::snapshot::writer::{SNAPSHOT_HEADER, SnapshotWriter, snapshot_file_name};

#![forbid(unsafe_code)]

//! Snapshot Warden (snw) — directory inventory snapshots with a quarantine
//! scanner for suspicious files.
//!
//! Each target directory is walked depth-first by its own worker. Every
//! stat-accessible file and directory becomes a snapshot record; files with
//! no permission bits at all are escalated through a two-stage content
//! heuristic (and an optional external verifier) and relocated into an
//! isolation directory when flagged.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use snapshot_warden::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use snapshot_warden::core::config::Config;
//! use snapshot_warden::scanner::walker::{DirectoryWalker, WalkerConfig};
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod scanner;
pub mod snapshot;

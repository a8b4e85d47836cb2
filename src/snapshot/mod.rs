//! Snapshot persistence: plain-text inventory files, one record per entry.

pub mod writer;

//! Audit logging: JSONL append-only activity log with graceful degradation.

pub mod jsonl;

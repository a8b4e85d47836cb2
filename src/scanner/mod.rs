//! Scanning pipeline: probe, walk, triage, quarantine, dispatch.

pub mod dispatch;
pub mod heuristic;
pub mod probe;
pub mod quarantine;
pub mod walker;

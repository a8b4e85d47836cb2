//! Suspicious-content heuristic: two-stage Safe/Suspicious triage.
//!
//! Stage 1 reads the file in fixed-size chunks and accumulates structural
//! stats (newlines, whitespace, total bytes). Only files that look like long,
//! near-line-less blobs proceed to Stage 2; everything else is immediately
//! `Safe` and Stage 2 never runs.
//!
//! Stage 2 re-reads the file and flags the first chunk containing a byte
//! outside 7-bit ASCII or one of the configured keywords (case-sensitive raw
//! substring). Matching is per chunk: a keyword straddling a chunk boundary
//! is not detected. That window is `chunk_size_bytes`, so operators can widen
//! it, but no carry-over buffering is done.
//!
//! Cheap, explainable triage for audit trails. Advisory, not a malware
//! scanner.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use memchr::memmem;

use crate::core::config::HeuristicConfig;
use crate::core::errors::{Result, SnwError};

/// Why a file was flagged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspicionReason {
    /// A byte outside the 7-bit ASCII range.
    NonAscii,
    /// A configured keyword found as a raw substring.
    Keyword(String),
}

impl std::fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonAscii => write!(f, "non-ASCII byte"),
            Self::Keyword(kw) => write!(f, "keyword {kw:?}"),
        }
    }
}

/// Outcome of content evaluation. Computed at most once per candidate per
/// walk; never cached across walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Suspicious(SuspicionReason),
}

impl Verdict {
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(self, Self::Suspicious(_))
    }
}

/// Structural stats from the Stage 1 pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentStats {
    /// Newline count.
    pub lines: u64,
    /// Whitespace-character count (word-boundary approximation).
    pub words: u64,
    /// Total byte count.
    pub chars: u64,
}

/// The configured two-stage classifier.
pub struct ContentHeuristic {
    chunk_size: usize,
    line_ceiling: u64,
    word_floor: u64,
    char_floor: u64,
    keywords: Vec<(String, memmem::Finder<'static>)>,
}

impl ContentHeuristic {
    #[must_use]
    pub fn from_config(config: &HeuristicConfig) -> Self {
        Self {
            chunk_size: config.chunk_size_bytes.max(1),
            line_ceiling: config.line_ceiling,
            word_floor: config.word_floor,
            char_floor: config.char_floor,
            keywords: config
                .keywords
                .iter()
                .map(|kw| (kw.clone(), memmem::Finder::new(kw.as_bytes()).into_owned()))
                .collect(),
        }
    }

    /// Evaluate one candidate file.
    pub fn evaluate(&self, path: &Path) -> Result<Verdict> {
        let stats = self.collect_stats(path)?;
        if !self.is_structurally_anomalous(&stats) {
            return Ok(Verdict::Safe);
        }
        self.lexical_scan(path)
    }

    /// Stage 1: chunked structural stats.
    pub fn collect_stats(&self, path: &Path) -> Result<ContentStats> {
        let mut stats = ContentStats::default();
        self.for_each_chunk(path, |chunk| {
            stats.lines += memchr::memchr_iter(b'\n', chunk).count() as u64;
            stats.words += chunk.iter().filter(|b| b.is_ascii_whitespace()).count() as u64;
            stats.chars += chunk.len() as u64;
            None::<()>
        })?;
        Ok(stats)
    }

    /// Strict thresholds: fewer than `line_ceiling` lines AND more than
    /// `word_floor` words AND more than `char_floor` characters.
    #[must_use]
    pub const fn is_structurally_anomalous(&self, stats: &ContentStats) -> bool {
        stats.lines < self.line_ceiling
            && stats.words > self.word_floor
            && stats.chars > self.char_floor
    }

    /// Stage 2: re-read and scan chunks; first match short-circuits.
    fn lexical_scan(&self, path: &Path) -> Result<Verdict> {
        let hit = self.for_each_chunk(path, |chunk| {
            if chunk.iter().any(|b| !b.is_ascii()) {
                return Some(SuspicionReason::NonAscii);
            }
            for (keyword, finder) in &self.keywords {
                if finder.find(chunk).is_some() {
                    return Some(SuspicionReason::Keyword(keyword.clone()));
                }
            }
            None
        })?;
        Ok(hit.map_or(Verdict::Safe, Verdict::Suspicious))
    }

    /// Drive `visit` over the file in `chunk_size` pieces, stopping at the
    /// first `Some` result.
    fn for_each_chunk<T>(
        &self,
        path: &Path,
        mut visit: impl FnMut(&[u8]) -> Option<T>,
    ) -> Result<Option<T>> {
        let read_err = |source| SnwError::ContentRead {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(read_err)?;
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut buf).map_err(read_err)?;
            if n == 0 {
                return Ok(None);
            }
            if let Some(hit) = visit(&buf[..n]) {
                return Ok(Some(hit));
            }
        }
    }
}

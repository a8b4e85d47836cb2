//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SnwError};

/// Full Snapshot Warden configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub heuristic: HeuristicConfig,
    pub quarantine: QuarantineConfig,
    pub snapshot: SnapshotConfig,
    pub audit: AuditConfig,
    pub paths: PathsConfig,
}

/// Traversal behavior and safety constraints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Recursion ceiling; subtrees deeper than this are skipped with a diagnostic.
    pub max_depth: usize,
    pub follow_symlinks: bool,
    /// Subtrees never traversed. The quarantine and output directories are
    /// added automatically when they sit under a target.
    pub excluded_paths: Vec<PathBuf>,
    /// Upper bound on target directories accepted per run.
    pub max_targets: usize,
}

/// Thresholds and keyword set for the suspicious-content heuristic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Read chunk size. Also the keyword-match window: a keyword split across
    /// two chunks is not detected.
    pub chunk_size_bytes: usize,
    /// Structural gate: escalate only when the file has fewer lines than this.
    pub line_ceiling: u64,
    /// Structural gate: escalate only when whitespace count exceeds this.
    pub word_floor: u64,
    /// Structural gate: escalate only when byte count exceeds this.
    pub char_floor: u64,
    /// Case-sensitive substrings that mark a chunk as suspicious.
    pub keywords: Vec<String>,
}

/// Quarantine behavior and the external verifier hook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct QuarantineConfig {
    /// External verification command, invoked as `<verifier> <file-path>`.
    /// A non-zero exit status means "confirmed suspicious".
    pub verifier: Option<PathBuf>,
}

/// Snapshot file layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SnapshotConfig {
    /// When true, all workers append to one shared snapshot file; otherwise
    /// each target gets its own file in the output directory.
    pub shared: bool,
    /// File name used in shared mode.
    pub shared_file_name: String,
}

/// JSONL audit log destinations. Logging is disabled when `log_path` is unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct AuditConfig {
    pub log_path: Option<PathBuf>,
    /// Tried when the primary path cannot be opened or written.
    pub fallback_path: Option<PathBuf>,
}

/// Filesystem paths used by snw itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_depth: 64,
            follow_symlinks: false,
            excluded_paths: Vec::new(),
            max_targets: 10,
        }
    }
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: 4096,
            line_ceiling: 3,
            word_floor: 1000,
            char_floor: 2000,
            keywords: [
                "corrupted",
                "dangerous",
                "risk",
                "attack",
                "malware",
                "malicious",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            shared: false,
            shared_file_name: "snapshot.txt".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!("[SNW-CONFIG] WARNING: HOME not set, falling back to /tmp");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        Self {
            config_file: home_dir.join(".config").join("snw").join("config.toml"),
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from the default path;
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| SnwError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(SnwError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides(|key| env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `SNW_*` environment overrides via the given lookup.
    pub fn apply_env_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        set_usize(&get, "SNW_SCANNER_MAX_DEPTH", &mut self.scanner.max_depth)?;
        set_bool(
            &get,
            "SNW_SCANNER_FOLLOW_SYMLINKS",
            &mut self.scanner.follow_symlinks,
        )?;
        set_usize(&get, "SNW_SCANNER_MAX_TARGETS", &mut self.scanner.max_targets)?;
        set_usize(
            &get,
            "SNW_HEURISTIC_CHUNK_SIZE_BYTES",
            &mut self.heuristic.chunk_size_bytes,
        )?;
        set_u64(&get, "SNW_HEURISTIC_LINE_CEILING", &mut self.heuristic.line_ceiling)?;
        set_u64(&get, "SNW_HEURISTIC_WORD_FLOOR", &mut self.heuristic.word_floor)?;
        set_u64(&get, "SNW_HEURISTIC_CHAR_FLOOR", &mut self.heuristic.char_floor)?;
        if let Some(raw) = get("SNW_QUARANTINE_VERIFIER") {
            self.quarantine.verifier = Some(PathBuf::from(raw));
        }
        set_bool(&get, "SNW_SNAPSHOT_SHARED", &mut self.snapshot.shared)?;
        if let Some(raw) = get("SNW_AUDIT_LOG_PATH") {
            self.audit.log_path = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scanner.max_depth == 0 {
            return Err(SnwError::InvalidConfig {
                details: "scanner.max_depth must be at least 1".to_string(),
            });
        }
        if self.scanner.max_targets == 0 {
            return Err(SnwError::InvalidConfig {
                details: "scanner.max_targets must be at least 1".to_string(),
            });
        }
        if self.heuristic.chunk_size_bytes == 0 {
            return Err(SnwError::InvalidConfig {
                details: "heuristic.chunk_size_bytes must be at least 1".to_string(),
            });
        }
        if self.heuristic.keywords.iter().any(String::is_empty) {
            return Err(SnwError::InvalidConfig {
                details: "heuristic.keywords must not contain empty strings".to_string(),
            });
        }
        if self.snapshot.shared_file_name.is_empty() {
            return Err(SnwError::InvalidConfig {
                details: "snapshot.shared_file_name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Effective configuration rendered as TOML (for `snw config`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SnwError::Serialization {
            context: "toml",
            details: e.to_string(),
        })
    }
}

fn set_usize(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    slot: &mut usize,
) -> Result<()> {
    if let Some(raw) = get(key) {
        *slot = raw.parse().map_err(|_| SnwError::InvalidConfig {
            details: format!("{key} must be an unsigned integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_u64(get: &impl Fn(&str) -> Option<String>, key: &'static str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = get(key) {
        *slot = raw.parse().map_err(|_| SnwError::InvalidConfig {
            details: format!("{key} must be an unsigned integer, got {raw:?}"),
        })?;
    }
    Ok(())
}

fn set_bool(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    slot: &mut bool,
) -> Result<()> {
    if let Some(raw) = get(key) {
        *slot = match raw.as_str() {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" => false,
            _ => {
                return Err(SnwError::InvalidConfig {
                    details: format!("{key} must be a boolean, got {raw:?}"),
                });
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_heuristic_thresholds() {
        let cfg = Config::default();
        assert_eq!(cfg.heuristic.line_ceiling, 3);
        assert_eq!(cfg.heuristic.word_floor, 1000);
        assert_eq!(cfg.heuristic.char_floor, 2000);
        assert_eq!(cfg.heuristic.keywords.len(), 6);
        assert!(cfg.heuristic.keywords.contains(&"malware".to_string()));
        assert!(!cfg.snapshot.shared);
        assert!(cfg.quarantine.verifier.is_none());
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let cfg = Config::default();
        let raw = cfg.to_toml().unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str("[heuristic]\nword_floor = 500\n").unwrap();
        assert_eq!(cfg.heuristic.word_floor, 500);
        assert_eq!(cfg.heuristic.line_ceiling, 3);
        assert_eq!(cfg.scanner.max_depth, 64);
    }

    #[test]
    fn explicit_missing_config_path_errors() {
        let err = Config::load(Some(Path::new("/no/such/snw-config.toml"))).unwrap_err();
        assert_eq!(err.code(), "SNW-1002");
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[scanner]\nmax_depth = 7\n").unwrap();
        let cfg = Config::load(Some(&path)).unwrap();
        assert_eq!(cfg.scanner.max_depth, 7);
        assert_eq!(cfg.paths.config_file, path);
    }

    #[test]
    fn env_overrides_are_applied() {
        let env: HashMap<&str, &str> = [
            ("SNW_SCANNER_MAX_DEPTH", "5"),
            ("SNW_SNAPSHOT_SHARED", "true"),
            ("SNW_QUARANTINE_VERIFIER", "/usr/local/bin/scan-check"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_env_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();
        assert_eq!(cfg.scanner.max_depth, 5);
        assert!(cfg.snapshot.shared);
        assert_eq!(
            cfg.quarantine.verifier.as_deref(),
            Some(Path::new("/usr/local/bin/scan-check"))
        );
    }

    #[test]
    fn malformed_env_override_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env_overrides(|key| {
                (key == "SNW_SCANNER_MAX_DEPTH").then(|| "not-a-number".to_string())
            })
            .unwrap_err();
        assert_eq!(err.code(), "SNW-1001");
    }

    #[test]
    fn zero_chunk_size_fails_validation() {
        let mut cfg = Config::default();
        cfg.heuristic.chunk_size_bytes = 0;
        assert_eq!(cfg.validate().unwrap_err().code(), "SNW-1001");
    }

    #[test]
    fn zero_max_depth_fails_validation() {
        let mut cfg = Config::default();
        cfg.scanner.max_depth = 0;
        assert!(cfg.validate().is_err());
    }
}

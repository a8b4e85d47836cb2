//! SNW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SnwError>;

/// Top-level error type for Snapshot Warden.
#[derive(Debug, Error)]
pub enum SnwError {
    #[error("[SNW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SNW-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SNW-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SNW-1101] usage error: {details}")]
    Usage { details: String },

    #[error("[SNW-2001] unable to probe {path}: {source}")]
    Probe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SNW-2002] unable to open directory {path}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SNW-2003] unable to read candidate content at {path}: {source}")]
    ContentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SNW-2101] quarantine relocation failed from {from} to {to}: {details}")]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        details: String,
    },

    #[error("[SNW-2102] quarantine destination already occupied: {destination}")]
    QuarantineCollision { destination: PathBuf },

    #[error("[SNW-2103] verifier invocation failed for {path}: {details}")]
    Verifier { path: PathBuf, details: String },

    #[error("[SNW-3001] snapshot write failure at {path}: {source}")]
    SnapshotWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SNW-3002] unable to spawn worker for target {target}: {details}")]
    Spawn { target: PathBuf, details: String },

    #[error("[SNW-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[SNW-3004] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SNW-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },
}

impl SnwError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SNW-1001",
            Self::MissingConfig { .. } => "SNW-1002",
            Self::ConfigParse { .. } => "SNW-1003",
            Self::Usage { .. } => "SNW-1101",
            Self::Probe { .. } => "SNW-2001",
            Self::Traversal { .. } => "SNW-2002",
            Self::ContentRead { .. } => "SNW-2003",
            Self::Relocation { .. } => "SNW-2101",
            Self::QuarantineCollision { .. } => "SNW-2102",
            Self::Verifier { .. } => "SNW-2103",
            Self::SnapshotWrite { .. } => "SNW-3001",
            Self::Spawn { .. } => "SNW-3002",
            Self::ChannelClosed { .. } => "SNW-3003",
            Self::Io { .. } => "SNW-3004",
            Self::Serialization { .. } => "SNW-3101",
        }
    }

    /// Whether the walk recovers locally from this failure (skip and continue)
    /// rather than aborting its owner.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Probe { .. }
                | Self::Traversal { .. }
                | Self::ContentRead { .. }
                | Self::Relocation { .. }
                | Self::QuarantineCollision { .. }
                | Self::Verifier { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SnwError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SnwError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err() -> std::io::Error {
        std::io::Error::other("test")
    }

    fn all_errors() -> Vec<SnwError> {
        vec![
            SnwError::InvalidConfig {
                details: String::new(),
            },
            SnwError::MissingConfig {
                path: PathBuf::new(),
            },
            SnwError::ConfigParse {
                context: "",
                details: String::new(),
            },
            SnwError::Usage {
                details: String::new(),
            },
            SnwError::Probe {
                path: PathBuf::new(),
                source: io_err(),
            },
            SnwError::Traversal {
                path: PathBuf::new(),
                source: io_err(),
            },
            SnwError::ContentRead {
                path: PathBuf::new(),
                source: io_err(),
            },
            SnwError::Relocation {
                from: PathBuf::new(),
                to: PathBuf::new(),
                details: String::new(),
            },
            SnwError::QuarantineCollision {
                destination: PathBuf::new(),
            },
            SnwError::Verifier {
                path: PathBuf::new(),
                details: String::new(),
            },
            SnwError::SnapshotWrite {
                path: PathBuf::new(),
                source: io_err(),
            },
            SnwError::Spawn {
                target: PathBuf::new(),
                details: String::new(),
            },
            SnwError::ChannelClosed { component: "" },
            SnwError::Io {
                path: PathBuf::new(),
                source: io_err(),
            },
            SnwError::Serialization {
                context: "",
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_errors();
        let codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_snw_prefix() {
        for err in &all_errors() {
            assert!(
                err.code().starts_with("SNW-"),
                "code {} must start with SNW-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = SnwError::InvalidConfig {
            details: "bad value".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("SNW-1001"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("bad value"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn recoverable_errors_match_propagation_policy() {
        // Skip-and-continue failures.
        assert!(
            SnwError::Probe {
                path: PathBuf::new(),
                source: io_err(),
            }
            .is_recoverable()
        );
        assert!(
            SnwError::Traversal {
                path: PathBuf::new(),
                source: io_err(),
            }
            .is_recoverable()
        );
        assert!(
            SnwError::Relocation {
                from: PathBuf::new(),
                to: PathBuf::new(),
                details: String::new(),
            }
            .is_recoverable()
        );
        assert!(
            SnwError::QuarantineCollision {
                destination: PathBuf::new(),
            }
            .is_recoverable()
        );

        // Failures that abort their owner.
        assert!(
            !SnwError::SnapshotWrite {
                path: PathBuf::new(),
                source: io_err(),
            }
            .is_recoverable()
        );
        assert!(
            !SnwError::Spawn {
                target: PathBuf::new(),
                details: String::new(),
            }
            .is_recoverable()
        );
        assert!(
            !SnwError::Usage {
                details: String::new(),
            }
            .is_recoverable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = SnwError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "SNW-3004");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: SnwError = json_err.into();
        assert_eq!(err.code(), "SNW-3101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: SnwError = toml_err.into();
        assert_eq!(err.code(), "SNW-1003");
    }
}

//! Quarantine manager: relocates flagged files into the isolation directory.
//!
//! Relocation is a direct `fs::rename` preserving the base name, with a
//! copy-then-remove fallback when the isolation directory sits on another
//! filesystem. No shell is ever involved; paths are never interpolated into a
//! command line.
//!
//! Failure policy: a source that has already vanished and a destination
//! collision are both reported as recoverable errors, never fatal to the walk.
//!
//! The external verifier is the second, out-of-process gate for escalated
//! files: the configured command is invoked as `<verifier> <file-path>` and
//! any non-zero exit status is read as "confirmed suspicious". The verifier
//! runs concurrently with the walk; the walker reaps every handle before its
//! worker finishes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::core::errors::{Result, SnwError};

/// Relocates suspicious files and spawns the optional external verifier.
pub struct QuarantineManager {
    isolation_dir: PathBuf,
    verifier: Option<PathBuf>,
}

impl QuarantineManager {
    #[must_use]
    pub fn new(isolation_dir: PathBuf, verifier: Option<PathBuf>) -> Self {
        Self {
            isolation_dir,
            verifier,
        }
    }

    #[must_use]
    pub fn isolation_dir(&self) -> &Path {
        &self.isolation_dir
    }

    /// Move `path` into the isolation directory, preserving its base name.
    ///
    /// Returns the destination path on success.
    pub fn relocate(&self, path: &Path) -> Result<PathBuf> {
        let relocation_err = |details: String| SnwError::Relocation {
            from: path.to_path_buf(),
            to: self.isolation_dir.clone(),
            details,
        };

        let Some(name) = path.file_name() else {
            return Err(relocation_err("source has no base name".to_string()));
        };
        if !path.exists() {
            // Already gone (another pass, or the verifier raced the heuristic).
            return Err(relocation_err("source no longer exists".to_string()));
        }

        let destination = self.isolation_dir.join(name);
        if destination.exists() {
            return Err(SnwError::QuarantineCollision { destination });
        }

        if let Err(rename_err) = fs::rename(path, &destination) {
            // Cross-device move: fall back to copy + remove.
            fs::copy(path, &destination)
                .and_then(|_| fs::remove_file(path))
                .map_err(|_| relocation_err(rename_err.to_string()))?;
        }

        if path.exists() {
            return Err(relocation_err(
                "source still present after relocation".to_string(),
            ));
        }
        Ok(destination)
    }

    #[must_use]
    pub const fn has_verifier(&self) -> bool {
        self.verifier.is_some()
    }

    /// Spawn the external verifier against `path`, if one is configured.
    ///
    /// `None` when no verifier is configured; `Some(Err)` when the spawn
    /// itself failed (recoverable; the walk continues on the in-process
    /// verdict alone).
    pub fn spawn_verifier(&self, path: &Path) -> Option<Result<VerifierHandle>> {
        let command = self.verifier.as_ref()?;
        let spawned = Command::new(command)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|child| VerifierHandle {
                path: path.to_path_buf(),
                child,
            })
            .map_err(|e| SnwError::Verifier {
                path: path.to_path_buf(),
                details: format!("{}: {e}", command.display()),
            });
        Some(spawned)
    }
}

/// A running verifier child tied to the candidate path it is checking.
#[derive(Debug)]
pub struct VerifierHandle {
    path: PathBuf,
    child: Child,
}

impl VerifierHandle {
    /// Block until the verifier exits.
    ///
    /// Returns the candidate path and whether the verifier confirmed
    /// suspicion (non-zero exit status).
    pub fn join(mut self) -> (PathBuf, Result<bool>) {
        let verdict = self
            .child
            .wait()
            .map(|status| !status.success())
            .map_err(|e| SnwError::Verifier {
                path: self.path.clone(),
                details: e.to_string(),
            });
        (self.path, verdict)
    }
}

//! Path normalization helpers.
//!
//! Targets, the output directory, and the isolation directory all arrive from
//! the command line and may be relative or contain `.`/`..` components. The
//! walker compares paths against its exclusion set by equality, so everything
//! is normalized to an absolute form first.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// Existing paths are canonicalized (symlinks resolved). Paths that do not
/// exist yet (e.g. a quarantine directory created later) are made absolute
/// relative to the current directory and normalized syntactically.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }

    normalize_syntactic(&absolute)
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

//! Database path guard
//!
//! Keeps caller-supplied database paths inside the configured databases
//! directory. Runs before a path is handed to the workflow.

use crate::error::{AgentError, Result};
use std::path::{Component, Path, PathBuf};

/// Resolve `user_path` against `databases_dir`.
///
/// Accepted: a path that lies inside the directory, or a bare file name that
/// exists in it. Everything else is refused as a security violation.
pub fn resolve_db_path(databases_dir: impl AsRef<Path>, user_path: &str) -> Result<PathBuf> {
    let base = absolute(databases_dir.as_ref())?;
    let requested = absolute(Path::new(user_path))?;

    if requested.starts_with(&base) {
        return Ok(requested);
    }

    if let Some(file_name) = Path::new(user_path).file_name() {
        let candidate = base.join(file_name);
        if candidate.starts_with(&base) && candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(AgentError::SecurityViolation(format!(
        "Forbidden: Access to '{}' is not allowed.",
        user_path
    )))
}

/// Absolute, lexically normalized path. `..` is folded without touching the
/// filesystem so nonexistent paths can still be checked.
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

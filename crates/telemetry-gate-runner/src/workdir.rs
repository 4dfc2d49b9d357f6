// telemetry-gate-runner/src/workdir.rs
// ============================================================================
// Module: Scoped Working Directory
// Description: RAII guard creating and removing the per-test working
//              directory with the structurally-significant marker prefix.
// Dependencies: stdlib
// ============================================================================

//! ## Overview
//! The working directory's prefix
//! (`artwork-T<tid>_<index>-<rand>`) is structurally significant: the
//! matcher's attribution window recognises it in process cmdlines. The
//! guard removes the directory on every exit path, including an early
//! return or panic unwind, by acting on [`Drop`].

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;

/// Errors creating or tearing down a scoped working directory.
#[derive(Debug, Error)]
pub enum WorkDirError {
    /// The directory could not be created under the OS temp root.
    #[error("failed to create working directory {path}: {source}")]
    Create {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Builds the structurally-significant working-directory name for technique
/// `technique_id` (already `T`-prefixed, e.g. `T1560.002`), test index
/// `test_index`, using `rand_suffix` as the trailing disambiguator (normally
/// a random number, supplied by the caller so this function stays
/// deterministic and testable).
#[must_use]
pub fn marker_dir_name(technique_id: &str, test_index: u32, rand_suffix: u64) -> String {
    let technique_id = technique_id.trim_start_matches('T');
    format!("artwork-T{technique_id}_{test_index}-{rand_suffix}")
}

/// Owns a per-test working directory and removes it on drop.
#[derive(Debug)]
pub struct WorkDirGuard {
    path: PathBuf,
    /// Set once the directory has already been removed, so `Drop` does not
    /// attempt to remove it twice after an explicit [`Self::close`] call.
    removed: bool,
}

impl WorkDirGuard {
    /// Creates `<temp_root>/<marker_dir_name(...)>` and returns a guard
    /// owning it.
    ///
    /// # Errors
    ///
    /// Returns [`WorkDirError::Create`] when directory creation fails.
    pub fn create(temp_root: &Path, technique_id: &str, test_index: u32, rand_suffix: u64) -> Result<Self, WorkDirError> {
        let path = temp_root.join(marker_dir_name(technique_id, test_index, rand_suffix));
        fs::create_dir_all(&path).map_err(|source| WorkDirError::Create {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Borrows the working directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the working directory now rather than waiting for `Drop`,
    /// swallowing the error since a best-effort cleanup failure should not
    /// mask the test's actual result.
    pub fn close(&mut self) {
        if !self.removed {
            let _ = fs::remove_dir_all(&self.path);
            self.removed = true;
        }
    }
}

impl Drop for WorkDirGuard {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_name_matches_the_documented_shape() {
        assert_eq!(marker_dir_name("T1560.002", 3, 458_617_291), "artwork-T1560.002_3-458617291");
    }

    #[test]
    fn guard_creates_and_removes_the_directory() {
        let temp_root = std::env::temp_dir();
        let path = {
            let guard = WorkDirGuard::create(&temp_root, "T1027", 1, 42).unwrap();
            let path = guard.path().to_path_buf();
            assert!(path.exists());
            path
        };
        assert!(!path.exists());
    }

    #[test]
    fn explicit_close_is_idempotent_with_drop() {
        let temp_root = std::env::temp_dir();
        let mut guard = WorkDirGuard::create(&temp_root, "T1027", 2, 7).unwrap();
        guard.close();
        guard.close();
    }
}

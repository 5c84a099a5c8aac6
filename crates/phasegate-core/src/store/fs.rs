//! File system adapter trait used by the file-backed store.
//!
//! The `FsAdapter` trait allows both real file system access and in-memory
//! implementations for testing.

use crate::error::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// File system adapter trait.
///
/// Defines the file operations [`TomlStore`](super::toml_store::TomlStore)
/// needs. Implementations can be real (using `std::fs`) or mocked for testing.
pub trait FsAdapter: Send + Sync {
    /// Reads the contents of a file as a string.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::PathNotFound` if the file doesn't exist and
    /// `PhasegateError::FileReadError` if reading fails.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Writes a string to a file, creating it if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::FileWriteError` if writing fails or
    /// `PhasegateError::PermissionDenied` if lacking write permissions.
    fn write(&self, path: &Path, content: &str) -> Result<()>;

    /// Renames `from` to `to`, replacing `to` if it exists.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::PathNotFound` if `from` doesn't exist and
    /// `PhasegateError::FileWriteError` if the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Lists entry names (not full paths) in a directory.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::PathNotFound` if the directory doesn't exist.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Creates a directory and all missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::FileWriteError` if creation fails.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Checks if a path is a file.
    fn is_file(&self, path: &Path) -> bool;

    /// Creates an empty file at `path` only if nothing exists there yet.
    ///
    /// Returns `Ok(false)` when the path is already taken. Creation and the
    /// existence check are one operation, so two callers can never both get
    /// `Ok(true)` for the same path.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::FileWriteError` if creation fails for any
    /// other reason.
    fn create_new(&self, path: &Path) -> Result<bool>;

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// Returns `PhasegateError::PathNotFound` if the file doesn't exist.
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Replaces `path` with `content` so readers see either the old or the
    /// new file, never a partial one.
    ///
    /// Writes a sibling `.tmp` file first and renames it over the target.
    fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let tmp = tmp_path(path);
        self.write(&tmp, content)?;
        self.rename(&tmp, path)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmp_path_is_sibling() {
        assert_eq!(
            tmp_path(Path::new("/data/CAPA-1.toml")),
            PathBuf::from("/data/CAPA-1.toml.tmp")
        );
    }
}

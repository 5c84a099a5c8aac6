//! Standard file system adapter implementation.
//!
//! Concrete [`FsAdapter`] over `std::fs`, used by the CLI in production.

use crate::error::{PhasegateError, Result};
use crate::store::fs::FsAdapter;
use std::fs::OpenOptions;
use std::path::Path;

/// Standard file system adapter using `std::fs`.
///
/// For testing, use [`MockFsAdapter`](super::fs_mock::MockFsAdapter) instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFsAdapter;

impl StdFsAdapter {
    /// Creates a new standard file system adapter.
    pub fn new() -> Self {
        Self
    }
}

fn write_error(path: &Path, e: std::io::Error) -> PhasegateError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        PhasegateError::PermissionDenied(path.display().to_string())
    } else {
        PhasegateError::FileWriteError(format!("{}: {}", path.display(), e))
    }
}

impl FsAdapter for StdFsAdapter {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PhasegateError::PathNotFound(path.to_path_buf())
            } else {
                PhasegateError::FileReadError(format!("{}: {}", path.display(), e))
            }
        })
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            self.create_dir_all(parent)?;
        }

        std::fs::write(path, content).map_err(|e| write_error(path, e))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if !from.exists() {
            return Err(PhasegateError::PathNotFound(from.to_path_buf()));
        }
        std::fs::rename(from, to).map_err(|e| write_error(to, e))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(PhasegateError::PathNotFound(path.to_path_buf()));
        }

        if !path.is_dir() {
            return Err(PhasegateError::InvalidPath(path.to_path_buf()));
        }

        std::fs::read_dir(path)
            .map_err(|e| PhasegateError::FileReadError(format!("{}: {}", path.display(), e)))?
            .map(|entry| {
                entry
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .map_err(|e| {
                        PhasegateError::FileReadError(format!(
                            "failed to read directory entry: {}",
                            e
                        ))
                    })
            })
            .collect()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| write_error(path, e))
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn create_new(&self, path: &Path) -> Result<bool> {
        match OpenOptions::new().create_new(true).write(true).open(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(write_error(path, e)),
        }
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PhasegateError::PathNotFound(path.to_path_buf())
            } else {
                write_error(path, e)
            }
        })
    }
}

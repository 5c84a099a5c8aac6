//! Mock file system adapter for testing.
//!
//! In-memory implementation of [`FsAdapter`]. Writes can be switched to fail
//! so callers can check that a failed save leaves stored state untouched.

use crate::error::{PhasegateError, Result};
use crate::store::fs::FsAdapter;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mock file system adapter for testing.
///
/// Clones share the same storage, so a test can keep a handle while the
/// store owns another.
///
/// # Examples
///
/// ```
/// use phasegate_core::store::fs_mock::MockFsAdapter;
/// use phasegate_core::store::fs::FsAdapter;
/// use std::path::Path;
///
/// let fs = MockFsAdapter::new();
/// fs.write(Path::new("/data/CAPA-1.toml"), "version = 1").unwrap();
/// assert_eq!(fs.read_to_string(Path::new("/data/CAPA-1.toml")).unwrap(), "version = 1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockFsAdapter {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    dirs: Arc<Mutex<BTreeSet<PathBuf>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockFsAdapter {
    /// Creates an empty mock file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent writes and renames fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of all files (path -> content).
    pub fn get_all_files(&self) -> HashMap<PathBuf, String> {
        self.files().clone()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<PathBuf, String>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dirs(&self) -> MutexGuard<'_, BTreeSet<PathBuf>> {
        self.dirs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PhasegateError::FileWriteError(format!(
                "{}: simulated write failure",
                path.display()
            )));
        }
        Ok(())
    }

    fn add_parents(&self, path: &Path) {
        let mut dirs = self.dirs();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() || ancestor == Path::new("/") {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }
}

impl FsAdapter for MockFsAdapter {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files()
            .get(path)
            .cloned()
            .ok_or_else(|| PhasegateError::PathNotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        self.check_writable(path)?;
        self.add_parents(path);
        self.files()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        self.check_writable(to)?;
        let mut files = self.files();
        let content = files
            .remove(from)
            .ok_or_else(|| PhasegateError::PathNotFound(from.to_path_buf()))?;
        files.insert(to.to_path_buf(), content);
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        if !self.dirs().contains(path) {
            return Err(PhasegateError::PathNotFound(path.to_path_buf()));
        }

        let mut entries = BTreeSet::new();
        for file_path in self.files().keys() {
            if file_path.parent() == Some(path)
                && let Some(name) = file_path.file_name()
            {
                entries.insert(name.to_string_lossy().to_string());
            }
        }
        for dir_path in self.dirs().iter() {
            if dir_path.parent() == Some(path)
                && let Some(name) = dir_path.file_name()
            {
                entries.insert(name.to_string_lossy().to_string());
            }
        }
        Ok(entries.into_iter().collect())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files().contains_key(path) || self.dirs().contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.check_writable(path)?;
        self.add_parents(path);
        self.dirs().insert(path.to_path_buf());
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    fn create_new(&self, path: &Path) -> Result<bool> {
        self.check_writable(path)?;
        self.add_parents(path);
        let mut files = self.files();
        if files.contains_key(path) {
            return Ok(false);
        }
        files.insert(path.to_path_buf(), String::new());
        Ok(true)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        self.files()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| PhasegateError::PathNotFound(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_read_write() {
        let fs = MockFsAdapter::new();
        let path = Path::new("/data/a.toml");

        fs.write(path, "hello").unwrap();
        assert_eq!(fs.read_to_string(path).unwrap(), "hello");
        assert!(fs.exists(Path::new("/data")));
    }

    #[test]
    fn test_mock_fs_file_not_found() {
        let fs = MockFsAdapter::new();
        let result = fs.read_to_string(Path::new("/nonexistent.toml"));
        assert!(matches!(result.unwrap_err(), PhasegateError::PathNotFound(_)));
    }

    #[test]
    fn test_mock_fs_list_dir() {
        let fs = MockFsAdapter::new();
        let dir = Path::new("/data");

        fs.create_dir_all(dir).unwrap();
        fs.write(&dir.join("b.toml"), "2").unwrap();
        fs.write(&dir.join("a.toml"), "1").unwrap();

        assert_eq!(fs.list_dir(dir).unwrap(), vec!["a.toml", "b.toml"]);
    }

    #[test]
    fn test_mock_fs_atomic_write() {
        let fs = MockFsAdapter::new();
        let path = Path::new("/data/a.toml");
        fs.write_atomic(path, "v1").unwrap();
        fs.write_atomic(path, "v2").unwrap();

        assert_eq!(fs.read_to_string(path).unwrap(), "v2");
        assert_eq!(fs.get_all_files().len(), 1);
    }

    #[test]
    fn test_mock_fs_failing_writes_leave_content() {
        let fs = MockFsAdapter::new();
        let path = Path::new("/data/a.toml");
        fs.write_atomic(path, "v1").unwrap();

        fs.set_fail_writes(true);
        assert!(fs.write_atomic(path, "v2").is_err());
        assert_eq!(fs.read_to_string(path).unwrap(), "v1");

        fs.set_fail_writes(false);
        fs.write_atomic(path, "v3").unwrap();
        assert_eq!(fs.read_to_string(path).unwrap(), "v3");
    }

    #[test]
    fn test_mock_fs_create_new_once() {
        let fs = MockFsAdapter::new();
        let path = Path::new("/data/DP-1.lock");

        assert!(fs.create_new(path).unwrap());
        assert!(!fs.create_new(path).unwrap());
        fs.remove_file(path).unwrap();
        assert!(!fs.exists(path));
        assert!(matches!(
            fs.remove_file(path).unwrap_err(),
            PhasegateError::PathNotFound(_)
        ));
    }

    #[test]
    fn test_mock_fs_clones_share_storage() {
        let fs = MockFsAdapter::new();
        let handle = fs.clone();
        fs.write(Path::new("/x"), "1").unwrap();
        assert!(handle.is_file(Path::new("/x")));
    }
}

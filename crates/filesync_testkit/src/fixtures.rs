//! Test fixtures for sync directories.
//!
//! Provides a temporary directory with helpers for writing files at chosen
//! modification times and inspecting the result of a pass.

use filesync_protocol::{fingerprint_file, Fingerprint};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

/// A temporary sync directory with automatic cleanup.
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the path of `name` inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes `data` to `name`.
    pub fn write(&self, name: &str, data: &[u8]) {
        fs::write(self.file(name), data).expect("Failed to write file");
    }

    /// Writes `data` to `name` and sets its mtime to `secs` since the epoch.
    pub fn write_with_mtime(&self, name: &str, data: &[u8], secs: u64) {
        self.write(name, data);
        self.set_mtime(name, secs);
    }

    /// Sets the mtime of `name` to `secs` since the epoch.
    pub fn set_mtime(&self, name: &str, secs: u64) {
        self.set_mtime_exact(name, Duration::from_secs(secs));
    }

    /// Sets the mtime of `name`, keeping sub-second precision.
    pub fn set_mtime_exact(&self, name: &str, since_epoch: Duration) {
        let file = File::options()
            .write(true)
            .open(self.file(name))
            .expect("Failed to open file");
        file.set_modified(UNIX_EPOCH + since_epoch)
            .expect("Failed to set mtime");
    }

    /// Returns the mtime of `name` as a duration since the epoch.
    pub fn mtime(&self, name: &str) -> Duration {
        fs::metadata(self.file(name))
            .and_then(|m| m.modified())
            .expect("Failed to read mtime")
            .duration_since(UNIX_EPOCH)
            .expect("mtime before the epoch")
    }

    /// Reads `name`, or `None` if it does not exist.
    pub fn read(&self, name: &str) -> Option<Vec<u8>> {
        fs::read(self.file(name)).ok()
    }

    /// Returns true if `name` exists.
    pub fn exists(&self, name: &str) -> bool {
        self.file(name).exists()
    }

    /// Removes `name`.
    pub fn remove(&self, name: &str) {
        fs::remove_file(self.file(name)).expect("Failed to remove file");
    }

    /// Fingerprints `name`.
    pub fn fingerprint(&self, name: &str) -> Fingerprint {
        fingerprint_file(&self.file(name))
    }

    /// Returns the names of all regular files, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path())
            .expect("Failed to read directory")
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary directory.
///
/// # Example
///
/// ```rust,ignore
/// use filesync_testkit::with_temp_dir;
///
/// #[test]
/// fn my_test() {
///     with_temp_dir(|dir| {
///         dir.write("a.txt", b"x");
///         assert_eq!(dir.names(), ["a.txt"]);
///     });
/// }
/// ```
pub fn with_temp_dir<F, R>(f: F) -> R
where
    F: FnOnce(&TestDir) -> R,
{
    let dir = TestDir::new();
    f(&dir)
}

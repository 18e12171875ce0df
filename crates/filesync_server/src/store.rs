//! Directory-backed file store.

use crate::error::{ServerError, ServerResult};
use filesync_protocol::{fingerprint_file, validate_name, FileEntry, Timestamp};
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A flat namespace of files kept in one plain directory.
///
/// The store keeps whatever it receives: no ignore rules, no history.
/// Writes and deletes are serialised so two uploads of the same name
/// cannot interleave their bytes.
pub struct FileStore {
    /// Storage directory.
    root: PathBuf,
    /// Held across every mutation.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens a store over an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> ServerResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Lists every regular file with its digest.
    ///
    /// This is a full scan of the directory on every call.
    pub fn list(&self) -> ServerResult<Vec<FileEntry>> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!("skipping non UTF-8 file name {:?}", entry.file_name());
                continue;
            };
            match entry.file_type() {
                Ok(ft) if ft.is_file() => {}
                _ => continue,
            }
            files.push(FileEntry::new(name, fingerprint_file(&entry.path())));
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Returns the last-write time of `name`.
    pub fn info(&self, name: &str) -> ServerResult<Timestamp> {
        let path = self.path_of(name)?;
        let meta = fs::metadata(&path).map_err(|e| not_found_or_io(e, name))?;
        if !meta.is_file() {
            return Err(ServerError::NotFound(name.to_string()));
        }
        Ok(Timestamp::from_system_time(meta.modified()?))
    }

    /// Stores `data` under `name`, replacing any previous content.
    pub fn put(&self, name: &str, data: &[u8]) -> ServerResult<()> {
        let path = self.path_of(name)?;
        let _guard = self.write_lock.lock();
        fs::write(&path, data)?;
        tracing::info!("uploaded '{}' ({} bytes)", name, data.len());
        Ok(())
    }

    /// Returns the stored bytes of `name`.
    pub fn get(&self, name: &str) -> ServerResult<Vec<u8>> {
        let path = self.path_of(name)?;
        let data = fs::read(&path).map_err(|e| not_found_or_io(e, name))?;
        tracing::debug!("served '{}' ({} bytes)", name, data.len());
        Ok(data)
    }

    /// Removes `name` from the store.
    pub fn delete(&self, name: &str) -> ServerResult<()> {
        let path = self.path_of(name)?;
        let _guard = self.write_lock.lock();
        fs::remove_file(&path).map_err(|e| not_found_or_io(e, name))?;
        tracing::info!("deleted '{}'", name);
        Ok(())
    }
}

fn not_found_or_io(err: std::io::Error, name: &str) -> ServerError {
    if err.kind() == ErrorKind::NotFound {
        ServerError::NotFound(name.to_string())
    } else {
        ServerError::Io(err)
    }
}

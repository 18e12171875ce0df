//! Local and remote snapshots of the file set.

use crate::error::{SyncError, SyncResult};
use crate::ignore::IgnoreRules;
use crate::transport::StoreTransport;
use filesync_protocol::{fingerprint_file, validate_name, Fingerprint, Timestamp};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// One local file as seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Flat file name.
    pub name: String,
    /// Content fingerprint.
    pub fingerprint: Fingerprint,
    /// Last-write time.
    pub mod_time: Timestamp,
}

/// Local file set, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalSnapshot {
    files: BTreeMap<String, FileRecord>,
}

impl LocalSnapshot {
    /// Scans `dir` (non-recursively) for regular files.
    ///
    /// Ignored names and names that are not valid flat names are left out.
    /// A file that disappears mid-scan is skipped; a directory that cannot
    /// be listed is an error.
    pub fn scan(dir: &Path, ignore: &IgnoreRules) -> SyncResult<Self> {
        let mut files = BTreeMap::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if ignore.is_ignored(&name) || validate_name(&name).is_err() {
                continue;
            }

            let path = entry.path();
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!("'{}' vanished during scan", name);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !meta.is_file() {
                continue;
            }

            let mod_time = Timestamp::from_system_time(meta.modified()?);
            let fingerprint = fingerprint_file(&path);
            files.insert(
                name.clone(),
                FileRecord {
                    name,
                    fingerprint,
                    mod_time,
                },
            );
        }

        Ok(Self { files })
    }

    /// Builds a snapshot from records.
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        Self {
            files: records.into_iter().map(|r| (r.name.clone(), r)).collect(),
        }
    }

    /// Returns the record for `name`.
    pub fn get(&self, name: &str) -> Option<&FileRecord> {
        self.files.get(name)
    }

    /// Returns true if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Iterates records in name order.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// Iterates names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if there are no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Remote file set: name to fingerprint.
///
/// The store does not report mtimes in its listing; those are fetched one
/// at a time, only for conflicts. A snapshot is fetched fresh for every
/// pass and never cached across passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    files: BTreeMap<String, Fingerprint>,
}

impl RemoteSnapshot {
    /// Fetches the listing in one round trip, dropping ignored names.
    ///
    /// Any transport failure is reported as
    /// [`SyncError::SnapshotUnavailable`]; nothing is mutated.
    pub fn fetch<T: StoreTransport + ?Sized>(
        transport: &T,
        ignore: &IgnoreRules,
    ) -> SyncResult<Self> {
        let mut snapshot = transport.list().map_err(SyncError::snapshot_unavailable)?;
        snapshot.files.retain(|name, _| !ignore.is_ignored(name));
        Ok(snapshot)
    }

    /// Builds a snapshot from pairs.
    pub fn from_entries<S: Into<String>>(entries: impl IntoIterator<Item = (S, Fingerprint)>) -> Self {
        Self {
            files: entries.into_iter().map(|(n, f)| (n.into(), f)).collect(),
        }
    }

    /// Returns the fingerprint for `name`.
    pub fn get(&self, name: &str) -> Option<Fingerprint> {
        self.files.get(name).copied()
    }

    /// Returns true if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    /// Iterates `(name, fingerprint)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Fingerprint)> {
        self.files.iter().map(|(n, f)| (n.as_str(), *f))
    }

    /// Iterates names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if there are no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

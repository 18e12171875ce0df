//! Single-file transfers.
//!
//! Each operation re-reads the remote state for its name right before
//! acting, so a decision made from an older snapshot cannot clobber a
//! newer remote copy. There are no cross-name locks; the agent's single
//! worker keeps transfers for one name from overlapping.

use crate::conflict::{resolve, Resolution};
use crate::error::SyncResult;
use crate::manifest::SyncManifest;
use crate::transport::StoreTransport;
use filesync_protocol::{validate_name, ContentDigest, Fingerprint, Timestamp};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Why a transfer was not performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// One side could not be read.
    Unreadable,
    /// The remote mtime could not be fetched.
    ModTimeUnavailable,
    /// Both sides have the same mtime but different contents.
    TiedModTime,
    /// The remote copy is newer than the local one.
    RemoteNewer,
    /// The remote side changed after the decision was planned.
    Superseded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Unreadable => "unreadable",
            SkipReason::ModTimeUnavailable => "remote mtime unavailable",
            SkipReason::TiedModTime => "tied mtime",
            SkipReason::RemoteNewer => "remote is newer",
            SkipReason::Superseded => "remote changed since planning",
        };
        f.write_str(s)
    }
}

/// What a transfer operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Local content was uploaded.
    Uploaded,
    /// Remote content was written locally.
    Downloaded,
    /// The remote copy was deleted.
    DeletedRemote,
    /// The local copy was deleted.
    DeletedLocal,
    /// Both sides already hold the same content.
    AlreadyInSync,
    /// The operation was deliberately not performed.
    Skipped(SkipReason),
    /// The file the operation needed no longer exists.
    Missing,
}

impl TransferOutcome {
    /// Returns true if the operation mutated either side.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            TransferOutcome::Uploaded
                | TransferOutcome::Downloaded
                | TransferOutcome::DeletedRemote
                | TransferOutcome::DeletedLocal
        )
    }
}

/// Performs pushes, pulls and deletes for single names.
pub struct TransferClient<T: StoreTransport + ?Sized> {
    transport: Arc<T>,
    local_dir: PathBuf,
    manifest: Arc<SyncManifest>,
}

impl<T: StoreTransport + ?Sized> Clone for TransferClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            local_dir: self.local_dir.clone(),
            manifest: Arc::clone(&self.manifest),
        }
    }
}

impl<T: StoreTransport + ?Sized> TransferClient<T> {
    /// Creates a transfer client for `local_dir`.
    pub fn new(transport: Arc<T>, local_dir: impl Into<PathBuf>, manifest: Arc<SyncManifest>) -> Self {
        Self {
            transport,
            local_dir: local_dir.into(),
            manifest,
        }
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the manifest.
    pub fn manifest(&self) -> &Arc<SyncManifest> {
        &self.manifest
    }

    /// Returns the local directory.
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    fn local_path(&self, name: &str) -> SyncResult<PathBuf> {
        validate_name(name)?;
        Ok(self.local_dir.join(name))
    }

    /// Uploads the local copy of `name` if the remote does not already
    /// hold newer or identical content.
    pub fn push(&self, name: &str) -> SyncResult<TransferOutcome> {
        let path = self.local_path(name)?;
        let (data, local_mtime) = match read_local(&path) {
            Ok(Some(found)) => found,
            Ok(None) => {
                tracing::debug!("push '{}': local file gone", name);
                return Ok(TransferOutcome::Missing);
            }
            Err(e) => {
                tracing::warn!("push '{}': cannot read local file: {}", name, e);
                return Ok(TransferOutcome::Skipped(SkipReason::Unreadable));
            }
        };
        let digest = ContentDigest::of(&data);

        let remote = self.transport.list()?;
        match remote.get(name) {
            Some(fp) if fp.matches(&Fingerprint::Content(digest)) => {
                tracing::debug!("push '{}': already in sync", name);
                self.manifest.record(name, digest);
                return Ok(TransferOutcome::AlreadyInSync);
            }
            Some(Fingerprint::Unreadable) => return Ok(self.skip(name, SkipReason::Unreadable)),
            Some(_) => {
                let remote_mtime = match self.transport.mod_time(name) {
                    Ok(Some(t)) => t,
                    Ok(None) => return Ok(self.skip(name, SkipReason::ModTimeUnavailable)),
                    Err(e) => {
                        tracing::warn!("push '{}': cannot fetch remote mtime: {}", name, e);
                        return Ok(TransferOutcome::Skipped(SkipReason::ModTimeUnavailable));
                    }
                };
                match resolve(local_mtime, remote_mtime) {
                    Resolution::PushLocal => {}
                    Resolution::PullRemote => return Ok(self.skip(name, SkipReason::RemoteNewer)),
                    Resolution::Tie => return Ok(self.skip(name, SkipReason::TiedModTime)),
                }
            }
            None => {}
        }

        let size = data.len();
        let confirmation = self.transport.put(name, data)?;
        self.manifest.record(name, digest);
        tracing::info!("uploaded '{}' ({} bytes): {}", name, size, confirmation);
        Ok(TransferOutcome::Uploaded)
    }

    /// Downloads `name` and overwrites the local copy.
    pub fn pull(&self, name: &str) -> SyncResult<TransferOutcome> {
        let path = self.local_path(name)?;
        let Some(data) = self.transport.get(name)? else {
            tracing::info!("pull '{}': not on server", name);
            return Ok(TransferOutcome::Missing);
        };

        fs::write(&path, &data)?;
        self.manifest.record(name, ContentDigest::of(&data));
        tracing::info!("downloaded '{}' ({} bytes)", name, data.len());
        Ok(TransferOutcome::Downloaded)
    }

    /// Deletes the remote copy of `name`, if it still exists.
    pub fn remove(&self, name: &str) -> SyncResult<TransferOutcome> {
        validate_name(name)?;
        let remote = self.transport.list()?;
        if !remote.contains(name) {
            tracing::info!("remove '{}': not on server", name);
            self.manifest.forget(name);
            return Ok(TransferOutcome::Missing);
        }

        let outcome = if self.transport.delete(name)? {
            tracing::info!("deleted '{}' from server", name);
            TransferOutcome::DeletedRemote
        } else {
            TransferOutcome::Missing
        };
        self.manifest.forget(name);
        Ok(outcome)
    }

    /// Deletes the local copy of `name`.
    pub fn delete_local(&self, name: &str) -> SyncResult<TransferOutcome> {
        let path = self.local_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                self.manifest.forget(name);
                tracing::info!("deleted local '{}' (absent on server)", name);
                Ok(TransferOutcome::DeletedLocal)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.manifest.forget(name);
                Ok(TransferOutcome::Missing)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Records `name` as in sync with `digest`.
    pub fn mark_in_sync(&self, name: &str, digest: ContentDigest) {
        self.manifest.record(name, digest);
    }

    fn skip(&self, name: &str, reason: SkipReason) -> TransferOutcome {
        tracing::info!("skipping '{}': {}", name, reason);
        TransferOutcome::Skipped(reason)
    }
}

/// Reads a local file and its mtime. `None` if it does not exist.
fn read_local(path: &Path) -> SyncResult<Option<(Vec<u8>, Timestamp)>> {
    let meta = match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some((data, Timestamp::from_system_time(meta.modified()?))))
}

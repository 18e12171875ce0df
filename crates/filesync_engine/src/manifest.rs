//! Record of names known to be in sync on both sides.
//!
//! The manifest lets reconciliation tell "deleted on the server" apart from
//! "created locally and never uploaded" when a name exists only locally.

use crate::error::SyncResult;
use filesync_protocol::ContentDigest;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestFile {
    files: BTreeMap<String, ContentDigest>,
}

/// Per-name record of the last digest both sides agreed on.
#[derive(Debug, Default)]
pub struct SyncManifest {
    entries: RwLock<HashMap<String, ContentDigest>>,
    dirty: AtomicBool,
}

impl SyncManifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a manifest from `path`. A missing file is an empty manifest.
    pub fn load(path: &Path) -> SyncResult<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let file: ManifestFile =
            serde_json::from_slice(&bytes).map_err(filesync_protocol::ProtocolError::from)?;
        tracing::debug!("loaded manifest with {} entries", file.files.len());
        Ok(Self {
            entries: RwLock::new(file.files.into_iter().collect()),
            dirty: AtomicBool::new(false),
        })
    }

    /// Writes the manifest to `path` if it changed since the last save.
    ///
    /// Returns whether anything was written.
    pub fn save(&self, path: &Path) -> SyncResult<bool> {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        let file = ManifestFile {
            files: self
                .entries
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        };
        let bytes = match serde_json::to_vec_pretty(&file) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                return Err(filesync_protocol::ProtocolError::from(e).into());
            }
        };

        // Write-then-rename so a crash never leaves a torn manifest.
        let tmp = path.with_extension("tmp");
        let result = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path));
        if let Err(e) = result {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(true)
    }

    /// Records that `name` has `digest` on both sides.
    pub fn record(&self, name: &str, digest: ContentDigest) {
        let previous = self.entries.write().insert(name.to_string(), digest);
        if previous != Some(digest) {
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Forgets `name`.
    pub fn forget(&self, name: &str) {
        if self.entries.write().remove(name).is_some() {
            self.dirty.store(true, Ordering::SeqCst);
        }
    }

    /// Returns true if `name` was synced at some point.
    pub fn was_synced(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Returns the last agreed digest of `name`.
    pub fn digest_of(&self, name: &str) -> Option<ContentDigest> {
        self.entries.read().get(name).copied()
    }

    /// Number of recorded names.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

//! Store transport abstraction.

use crate::error::{SyncError, SyncResult};
use crate::snapshot::RemoteSnapshot;
use filesync_protocol::{ContentDigest, Fingerprint, Timestamp};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Access to the remote file store.
///
/// Calls are blocking; the agent runs them on blocking threads. Every
/// call is a fresh round trip and implementations must not cache.
pub trait StoreTransport: Send + Sync {
    /// Lists every stored name with its fingerprint.
    fn list(&self) -> SyncResult<RemoteSnapshot>;

    /// Returns the last-write time of `name`, or `None` if it is not stored.
    fn mod_time(&self, name: &str) -> SyncResult<Option<Timestamp>>;

    /// Stores `data` under `name` and returns the store's confirmation.
    fn put(&self, name: &str, data: Vec<u8>) -> SyncResult<String>;

    /// Returns the bytes of `name`, or `None` if it is not stored.
    fn get(&self, name: &str) -> SyncResult<Option<Vec<u8>>>;

    /// Removes `name`. Returns `false` if it was not stored.
    fn delete(&self, name: &str) -> SyncResult<bool>;
}

#[derive(Debug, Clone)]
struct StoredFile {
    data: Vec<u8>,
    mod_time: Timestamp,
}

/// An in-memory store for testing.
///
/// Uploads are stamped with the current wall-clock time unless a test
/// overrides it with [`MemoryStore::set_mod_time`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, StoredFile>>,
    unreadable: Mutex<Vec<String>>,
    offline: AtomicBool,
    fail_mod_time: AtomicBool,
    fail_delete: AtomicBool,
    lists: AtomicUsize,
    mod_time_calls: AtomicUsize,
    puts: AtomicUsize,
    gets: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a file without counting it as an upload.
    pub fn insert(&self, name: &str, data: &[u8], mod_time: Timestamp) {
        self.files.lock().insert(
            name.to_string(),
            StoredFile {
                data: data.to_vec(),
                mod_time,
            },
        );
    }

    /// Overrides the last-write time of a stored file.
    pub fn set_mod_time(&self, name: &str, mod_time: Timestamp) {
        if let Some(file) = self.files.lock().get_mut(name) {
            file.mod_time = mod_time;
        }
    }

    /// Makes the listing report `name` as unreadable.
    pub fn mark_unreadable(&self, name: &str) {
        self.unreadable.lock().push(name.to_string());
    }

    /// Makes every call fail with a retryable transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes `mod_time` fail while everything else keeps working.
    pub fn fail_mod_time(&self, fail: bool) {
        self.fail_mod_time.store(fail, Ordering::SeqCst);
    }

    /// Makes `delete` answer with a server error while everything else
    /// keeps working.
    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Returns the stored names in order.
    pub fn names(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }

    /// Returns the bytes of `name` without counting a download.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).map(|f| f.data.clone())
    }

    /// Number of `list` calls.
    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Number of `mod_time` calls.
    pub fn mod_time_calls(&self) -> usize {
        self.mod_time_calls.load(Ordering::SeqCst)
    }

    /// Number of uploads.
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of downloads.
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of deletes.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Number of mutating calls (uploads and deletes).
    pub fn mutations(&self) -> usize {
        self.puts() + self.deletes()
    }

    fn check_online(&self) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("store offline"));
        }
        Ok(())
    }
}

impl StoreTransport for MemoryStore {
    fn list(&self) -> SyncResult<RemoteSnapshot> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let unreadable = self.unreadable.lock();
        let files = self.files.lock();
        Ok(RemoteSnapshot::from_entries(files.iter().map(|(name, file)| {
            let fingerprint = if unreadable.contains(name) {
                Fingerprint::Unreadable
            } else {
                ContentDigest::of(&file.data).into()
            };
            (name.clone(), fingerprint)
        })))
    }

    fn mod_time(&self, name: &str) -> SyncResult<Option<Timestamp>> {
        self.mod_time_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        if self.fail_mod_time.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("file_info timed out"));
        }
        Ok(self.files.lock().get(name).map(|f| f.mod_time))
    }

    fn put(&self, name: &str, data: Vec<u8>) -> SyncResult<String> {
        self.check_online()?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.files.lock().insert(
            name.to_string(),
            StoredFile {
                data,
                mod_time: Timestamp::now(),
            },
        );
        Ok(format!("File '{name}' uploaded successfully"))
    }

    fn get(&self, name: &str) -> SyncResult<Option<Vec<u8>>> {
        self.check_online()?;
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.contents(name))
    }

    fn delete(&self, name: &str) -> SyncResult<bool> {
        self.check_online()?;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(SyncError::Server {
                status: 500,
                message: format!("cannot delete '{name}'"),
            });
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(self.files.lock().remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let confirmation = store.put("a.txt", b"hello".to_vec()).unwrap();
        assert!(confirmation.contains("a.txt"));
        assert_eq!(store.get("a.txt").unwrap(), Some(b"hello".to_vec()));
        assert!(store.mod_time("a.txt").unwrap().is_some());

        let listing = store.list().unwrap();
        assert_eq!(
            listing.get("a.txt"),
            Some(ContentDigest::of(b"hello").into())
        );

        assert!(store.delete("a.txt").unwrap());
        assert!(!store.delete("a.txt").unwrap());
        assert_eq!(store.get("a.txt").unwrap(), None);
        assert_eq!(store.mod_time("a.txt").unwrap(), None);
    }

    #[test]
    fn offline_store_fails_retryably() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let err = store.list().unwrap_err();
        assert!(err.is_retryable());
        assert!(store.put("a", b"x".to_vec()).is_err());
        assert_eq!(store.puts(), 0);
    }

    #[test]
    fn failure_injection_and_counters() {
        let store = MemoryStore::new();
        store.insert("a", b"x", Timestamp::from_secs(5));
        store.fail_mod_time(true);
        assert!(store.mod_time("a").is_err());
        store.fail_mod_time(false);
        assert_eq!(store.mod_time("a").unwrap(), Some(Timestamp::from_secs(5)));
        assert_eq!(store.mod_time_calls(), 2);

        store.mark_unreadable("a");
        assert_eq!(store.list().unwrap().get("a"), Some(Fingerprint::Unreadable));

        store.fail_delete(true);
        assert!(matches!(
            store.delete("a"),
            Err(SyncError::Server { status: 500, .. })
        ));
        assert_eq!(store.names(), ["a"]);
        assert_eq!(store.mutations(), 0);
    }
}

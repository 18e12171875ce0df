//! Periodic full reconciliation.
//!
//! A pass compares a fresh remote listing with a fresh local scan and
//! turns every difference into a [`Decision`]. Planning is pure given the
//! two snapshots, the manifest and an mtime lookup; execution goes through
//! the [`TransferClient`], which re-checks remote state before acting.

use crate::config::OrphanPolicy;
use crate::conflict::{resolve, Resolution};
use crate::error::SyncResult;
use crate::ignore::IgnoreRules;
use crate::manifest::SyncManifest;
use crate::snapshot::{LocalSnapshot, RemoteSnapshot};
use crate::transfer::{SkipReason, TransferClient, TransferOutcome};
use crate::transport::StoreTransport;
use filesync_protocol::{ContentDigest, Fingerprint, Timestamp};
use std::time::{Duration, Instant};

/// What to do with one name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Download the remote copy.
    Pull,
    /// Upload the local copy.
    Push,
    /// Delete the local copy.
    DeleteLocal,
    /// Both sides hold this digest.
    UpToDate(ContentDigest),
    /// Leave both sides alone this pass.
    Skip(SkipReason),
}

/// A planned action for one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Flat file name.
    pub name: String,
    /// Planned action.
    pub action: Action,
}

impl Decision {
    fn new(name: &str, action: Action) -> Self {
        Self {
            name: name.to_string(),
            action,
        }
    }

    /// Returns true if executing this decision may transfer data.
    pub fn is_transfer(&self) -> bool {
        matches!(self.action, Action::Pull | Action::Push | Action::DeleteLocal)
    }
}

/// Plans a pass.
///
/// Local-only names come first, then every remote name, each group in
/// name order. `mtime_of` is consulted only for digest conflicts and
/// returns `None` when the remote mtime is unavailable.
pub fn plan_decisions<F>(
    local: &LocalSnapshot,
    remote: &RemoteSnapshot,
    policy: OrphanPolicy,
    manifest: &SyncManifest,
    mut mtime_of: F,
) -> Vec<Decision>
where
    F: FnMut(&str) -> Option<Timestamp>,
{
    let mut decisions = Vec::with_capacity(local.len().max(remote.len()));

    for record in local.iter().filter(|r| !remote.contains(&r.name)) {
        let action = match policy {
            OrphanPolicy::Mirror => Action::DeleteLocal,
            OrphanPolicy::Manifest => {
                // Delete only what was synced and has not been edited since;
                // anything else is local work the server has never seen.
                let unchanged = match (manifest.digest_of(&record.name), record.fingerprint) {
                    (Some(synced), Fingerprint::Content(now)) => synced == now,
                    _ => false,
                };
                if unchanged {
                    Action::DeleteLocal
                } else if record.fingerprint.is_unreadable() {
                    Action::Skip(SkipReason::Unreadable)
                } else {
                    Action::Push
                }
            }
        };
        decisions.push(Decision::new(&record.name, action));
    }

    for (name, remote_fp) in remote.iter() {
        let Some(record) = local.get(name) else {
            decisions.push(Decision::new(name, Action::Pull));
            continue;
        };

        let action = match (record.fingerprint, remote_fp) {
            (Fingerprint::Content(a), Fingerprint::Content(b)) if a == b => Action::UpToDate(a),
            (Fingerprint::Unreadable, _) | (_, Fingerprint::Unreadable) => {
                Action::Skip(SkipReason::Unreadable)
            }
            _ => match mtime_of(name) {
                None => Action::Skip(SkipReason::ModTimeUnavailable),
                Some(remote_mtime) => match resolve(record.mod_time, remote_mtime) {
                    Resolution::PushLocal => Action::Push,
                    Resolution::PullRemote => Action::Pull,
                    Resolution::Tie => Action::Skip(SkipReason::TiedModTime),
                },
            },
        };
        decisions.push(Decision::new(name, action));
    }

    decisions
}

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Files downloaded.
    pub pulled: usize,
    /// Files uploaded.
    pub pushed: usize,
    /// Local files deleted.
    pub deleted_local: usize,
    /// Names already in sync.
    pub up_to_date: usize,
    /// Names skipped this pass.
    pub skipped: usize,
    /// Names that vanished before their transfer ran.
    pub missing: usize,
    /// Names whose transfer failed.
    pub failed: usize,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

impl PassReport {
    /// Tallies one outcome.
    pub fn record(&mut self, outcome: &SyncResult<TransferOutcome>) {
        match outcome {
            Ok(TransferOutcome::Downloaded) => self.pulled += 1,
            Ok(TransferOutcome::Uploaded) => self.pushed += 1,
            Ok(TransferOutcome::DeletedLocal) => self.deleted_local += 1,
            Ok(TransferOutcome::DeletedRemote) => {}
            Ok(TransferOutcome::AlreadyInSync) => self.up_to_date += 1,
            Ok(TransferOutcome::Skipped(_)) => self.skipped += 1,
            Ok(TransferOutcome::Missing) => self.missing += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Number of names that were transferred or deleted.
    pub fn mutations(&self) -> usize {
        self.pulled + self.pushed + self.deleted_local
    }
}

/// Runs reconciliation passes for one local directory.
pub struct Reconciler<T: StoreTransport + ?Sized> {
    transfers: TransferClient<T>,
    ignore: IgnoreRules,
    policy: OrphanPolicy,
}

impl<T: StoreTransport + ?Sized> Reconciler<T> {
    /// Creates a reconciler.
    pub fn new(transfers: TransferClient<T>, ignore: IgnoreRules, policy: OrphanPolicy) -> Self {
        Self {
            transfers,
            ignore,
            policy,
        }
    }

    /// Returns the transfer client.
    pub fn transfers(&self) -> &TransferClient<T> {
        &self.transfers
    }

    /// Returns the orphan policy.
    pub fn policy(&self) -> OrphanPolicy {
        self.policy
    }

    /// Fetches both snapshots and plans a pass.
    ///
    /// Fails without side effects if either snapshot is unavailable.
    pub fn plan(&self) -> SyncResult<Vec<Decision>> {
        let remote = RemoteSnapshot::fetch(self.transfers.transport().as_ref(), &self.ignore)?;
        let local = LocalSnapshot::scan(self.transfers.local_dir(), &self.ignore)?;
        let transport = self.transfers.transport();

        Ok(plan_decisions(
            &local,
            &remote,
            self.policy,
            self.transfers.manifest(),
            |name| match transport.mod_time(name) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!("cannot fetch mtime of '{}': {}", name, e);
                    None
                }
            },
        ))
    }

    /// Executes one decision.
    pub fn execute(&self, decision: &Decision) -> SyncResult<TransferOutcome> {
        let name = decision.name.as_str();
        match decision.action {
            Action::Pull => self.transfers.pull(name),
            Action::Push => self.transfers.push(name),
            Action::DeleteLocal => {
                // An upload may have landed since the pass was planned.
                if self.transfers.transport().list()?.contains(name) {
                    tracing::debug!("'{}' reappeared on server, keeping local copy", name);
                    return Ok(TransferOutcome::Skipped(SkipReason::Superseded));
                }
                self.transfers.delete_local(name)
            }
            Action::UpToDate(digest) => {
                self.transfers.mark_in_sync(name, digest);
                Ok(TransferOutcome::AlreadyInSync)
            }
            Action::Skip(reason) => {
                tracing::debug!("skipping '{}': {}", name, reason);
                Ok(TransferOutcome::Skipped(reason))
            }
        }
    }

    /// Plans and executes one full pass.
    ///
    /// Per-name failures are counted and logged; only an unavailable
    /// snapshot fails the pass.
    pub fn run_pass(&self) -> SyncResult<PassReport> {
        let started = Instant::now();
        let decisions = self.plan()?;
        let mut report = PassReport::default();

        for decision in &decisions {
            let outcome = self.execute(decision);
            if let Err(e) = &outcome {
                tracing::warn!("{:?} '{}' failed: {}", decision.action, decision.name, e);
            }
            report.record(&outcome);
        }

        report.duration = started.elapsed();
        tracing::debug!("reconciliation pass finished: {:?}", report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::snapshot::FileRecord;
    use crate::transport::MemoryStore;
    use std::fs::{self, File};
    use std::path::Path;
    use std::sync::Arc;

    fn record(name: &str, data: &[u8], secs: u64) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            fingerprint: ContentDigest::of(data).into(),
            mod_time: Timestamp::from_secs(secs),
        }
    }

    fn remote(entries: &[(&str, &[u8])]) -> RemoteSnapshot {
        RemoteSnapshot::from_entries(
            entries
                .iter()
                .map(|(n, d)| (*n, Fingerprint::from(ContentDigest::of(d)))),
        )
    }

    fn actions(decisions: &[Decision]) -> Vec<(&str, Action)> {
        decisions
            .iter()
            .map(|d| (d.name.as_str(), d.action))
            .collect()
    }

    #[test]
    fn plan_covers_every_case() {
        let local = LocalSnapshot::from_records([
            record("local-only.txt", b"l", 10),
            record("same.txt", b"s", 10),
            record("newer-local.txt", b"L", 30),
            record("newer-remote.txt", b"L", 10),
            record("tie.txt", b"L", 20),
        ]);
        let remote = remote(&[
            ("remote-only.txt", b"r"),
            ("same.txt", b"s"),
            ("newer-local.txt", b"R"),
            ("newer-remote.txt", b"R"),
            ("tie.txt", b"R"),
        ]);
        let manifest = SyncManifest::new();

        let decisions = plan_decisions(&local, &remote, OrphanPolicy::Manifest, &manifest, |_| {
            Some(Timestamp::from_secs(20))
        });

        assert_eq!(
            actions(&decisions),
            vec![
                ("local-only.txt", Action::Push),
                ("newer-local.txt", Action::Push),
                ("newer-remote.txt", Action::Pull),
                ("remote-only.txt", Action::Pull),
                ("same.txt", Action::UpToDate(ContentDigest::of(b"s"))),
                ("tie.txt", Action::Skip(SkipReason::TiedModTime)),
            ]
        );
    }

    #[test]
    fn orphan_policies() {
        let local = LocalSnapshot::from_records([
            record("synced.txt", b"a", 10),
            record("edited.txt", b"new", 10),
            record("fresh.txt", b"c", 10),
        ]);
        let remote = RemoteSnapshot::default();
        let manifest = SyncManifest::new();
        manifest.record("synced.txt", ContentDigest::of(b"a"));
        manifest.record("edited.txt", ContentDigest::of(b"old"));

        let mirror = plan_decisions(&local, &remote, OrphanPolicy::Mirror, &manifest, |_| None);
        assert!(mirror.iter().all(|d| d.action == Action::DeleteLocal));

        let tracked = plan_decisions(&local, &remote, OrphanPolicy::Manifest, &manifest, |_| None);
        assert_eq!(
            actions(&tracked),
            vec![
                ("edited.txt", Action::Push),
                ("fresh.txt", Action::Push),
                ("synced.txt", Action::DeleteLocal),
            ]
        );
    }

    #[test]
    fn unreadable_and_unknown_mtime_are_skipped() {
        let mut unreadable = record("locked.txt", b"", 10);
        unreadable.fingerprint = Fingerprint::Unreadable;
        let local = LocalSnapshot::from_records([unreadable, record("c.txt", b"L", 10)]);
        let remote = remote(&[("locked.txt", b"x"), ("c.txt", b"R")]);

        let mut lookups = Vec::new();
        let decisions = plan_decisions(
            &local,
            &remote,
            OrphanPolicy::Manifest,
            &SyncManifest::new(),
            |name| {
                lookups.push(name.to_string());
                None
            },
        );
        assert_eq!(
            actions(&decisions),
            vec![
                ("c.txt", Action::Skip(SkipReason::ModTimeUnavailable)),
                ("locked.txt", Action::Skip(SkipReason::Unreadable)),
            ]
        );
        // mtimes are only fetched for genuine conflicts.
        assert_eq!(lookups, vec!["c.txt".to_string()]);
    }

    fn write_at(dir: &Path, name: &str, data: &[u8], secs: u64) {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(std::time::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn reconciler(
        dir: &Path,
        policy: OrphanPolicy,
    ) -> (Arc<MemoryStore>, Reconciler<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let transfers = TransferClient::new(Arc::clone(&store), dir, Arc::new(SyncManifest::new()));
        let reconciler = Reconciler::new(transfers, IgnoreRules::default(), policy);
        (store, reconciler)
    }

    #[test]
    fn pass_converges_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reconciler) = reconciler(dir.path(), OrphanPolicy::Manifest);
        write_at(dir.path(), "a.txt", b"local", 100);
        write_at(dir.path(), "c.txt", b"newer local", 300);
        write_at(dir.path(), "scratch.swp", b"ignored", 100);
        store.insert("b.txt", b"remote", Timestamp::from_secs(100));
        store.insert("c.txt", b"older remote", Timestamp::from_secs(200));

        let report = reconciler.run_pass().unwrap();
        assert_eq!(report.pulled, 1);
        assert_eq!(report.pushed, 2);
        assert_eq!(report.failed, 0);

        assert_eq!(store.names(), ["a.txt", "b.txt", "c.txt"]);
        assert_eq!(store.contents("c.txt"), Some(b"newer local".to_vec()));
        assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"remote");

        let mutations = store.mutations();
        let second = reconciler.run_pass().unwrap();
        assert_eq!(second.mutations(), 0);
        assert_eq!(second.up_to_date, 3);
        assert_eq!(store.mutations(), mutations);
    }

    #[test]
    fn mirror_deletes_local_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reconciler) = reconciler(dir.path(), OrphanPolicy::Mirror);
        write_at(dir.path(), "orphan.txt", b"x", 100);

        let report = reconciler.run_pass().unwrap();
        assert_eq!(report.deleted_local, 1);
        assert!(!dir.path().join("orphan.txt").exists());
        assert_eq!(store.puts(), 0);
    }

    #[test]
    fn delete_local_rechecks_remote() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reconciler) = reconciler(dir.path(), OrphanPolicy::Mirror);
        write_at(dir.path(), "a.txt", b"x", 100);
        let decisions = reconciler.plan().unwrap();

        // Uploaded by the event path between planning and execution.
        store.insert("a.txt", b"x", Timestamp::from_secs(100));
        let outcome = reconciler.execute(&decisions[0]).unwrap();
        assert_eq!(outcome, TransferOutcome::Skipped(SkipReason::Superseded));
        assert!(dir.path().join("a.txt").exists());
    }

    #[test]
    fn failed_name_does_not_abort_pass() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reconciler) = reconciler(dir.path(), OrphanPolicy::Manifest);
        // A local directory in the way makes the download of this name fail.
        fs::create_dir(dir.path().join("blocked.txt")).unwrap();
        store.insert("blocked.txt", b"x", Timestamp::from_secs(100));
        store.insert("ok.txt", b"fine", Timestamp::from_secs(100));

        let report = reconciler.run_pass().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.pulled, 1);
        assert_eq!(fs::read(dir.path().join("ok.txt")).unwrap(), b"fine");
        assert!(dir.path().join("blocked.txt").is_dir());
    }

    #[test]
    fn unavailable_snapshot_aborts_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let (store, reconciler) = reconciler(dir.path(), OrphanPolicy::Mirror);
        write_at(dir.path(), "a.txt", b"x", 100);
        store.set_offline(true);

        assert!(matches!(
            reconciler.run_pass(),
            Err(SyncError::SnapshotUnavailable(_))
        ));
        assert!(dir.path().join("a.txt").exists());
    }
}

//! Integration tests for the sync engine and server.

use filesync_engine::{
    plan_decisions, Action, HttpResponse, HttpTransport, IgnoreRules, LocalSnapshot,
    LoopbackClient, LoopbackServer, MemoryStore, OrphanPolicy, Reconciler, RemoteSnapshot,
    ReqwestClient, SkipReason, StoreTransport, SyncManifest, TransferClient, TransferOutcome,
};
use filesync_protocol::{ContentDigest, Timestamp};
use filesync_server::{FileStore, ServerConfig, SyncServer};
use filesync_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Routes loopback requests straight into a server's handler.
struct InProcess {
    server: Arc<SyncServer>,
}

impl LoopbackServer for InProcess {
    fn handle(&self, method: &str, path: &str, body: &[u8]) -> Result<HttpResponse, String> {
        let response = self.server.handle(method, path, body);
        Ok(HttpResponse::new(response.status, response.body))
    }
}

type ServerTransport = HttpTransport<LoopbackClient<InProcess>>;

/// A store server over a temporary directory.
struct TestServer {
    root: TestDir,
    server: Arc<SyncServer>,
}

impl TestServer {
    fn new() -> Self {
        let root = TestDir::new();
        let store = Arc::new(FileStore::new(root.path()));
        let server = Arc::new(SyncServer::with_store(ServerConfig::default(), store));
        Self { root, server }
    }

    fn transport(&self) -> Arc<ServerTransport> {
        let client = LoopbackClient::new(InProcess {
            server: Arc::clone(&self.server),
        });
        Arc::new(HttpTransport::new("http://127.0.0.1:8080", client))
    }
}

/// One client directory synced against a transport.
struct Client<T: StoreTransport + ?Sized> {
    dir: TestDir,
    reconciler: Reconciler<T>,
}

impl<T: StoreTransport + ?Sized> Client<T> {
    fn new(transport: Arc<T>, policy: OrphanPolicy) -> Self {
        let dir = TestDir::new();
        let transfers = TransferClient::new(transport, dir.path(), Arc::new(SyncManifest::new()));
        let reconciler = Reconciler::new(transfers, IgnoreRules::default(), policy);
        Self { dir, reconciler }
    }

    fn transfers(&self) -> &TransferClient<T> {
        self.reconciler.transfers()
    }
}

#[test]
fn local_only_file_is_pushed() {
    let server = TestServer::new();

    // Event path: the debounced upload pushes a.txt.
    let client = Client::new(server.transport(), OrphanPolicy::Mirror);
    client.dir.write("a.txt", b"alpha");
    assert_eq!(client.transfers().push("a.txt").unwrap(), TransferOutcome::Uploaded);
    assert_eq!(server.root.read("a.txt"), Some(b"alpha".to_vec()));

    // Reconciliation path: the manifest policy pushes a never-synced file.
    let other = Client::new(server.transport(), OrphanPolicy::Manifest);
    other.dir.write("x.txt", b"only here");
    let report = other.reconciler.run_pass().unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.pulled, 1);
    assert_eq!(server.root.names(), ["a.txt", "x.txt"]);
}

#[test]
fn remote_only_file_is_pulled_then_left_alone() {
    let server = TestServer::new();
    server.root.write("b.txt", b"bravo");
    let client = Client::new(server.transport(), OrphanPolicy::Manifest);

    let first = client.reconciler.run_pass().unwrap();
    assert_eq!(first.pulled, 1);
    assert_eq!(client.dir.read("b.txt"), Some(b"bravo".to_vec()));

    let second = client.reconciler.run_pass().unwrap();
    assert_eq!(second.mutations(), 0);
    assert_eq!(second.up_to_date, 1);
}

#[test]
fn identical_content_is_never_transferred() {
    let store = Arc::new(MemoryStore::new());
    store.insert("c.txt", b"charlie", Timestamp::from_secs(100));
    let client = Client::new(Arc::clone(&store), OrphanPolicy::Mirror);
    // Wildly different mtimes do not matter when digests agree.
    client.dir.write_with_mtime("c.txt", b"charlie", 900);

    let report = client.reconciler.run_pass().unwrap();
    assert_eq!(report.up_to_date, 1);
    assert_eq!(store.mutations(), 0);
    assert_eq!(store.gets(), 0);
    assert_eq!(store.mod_time_calls(), 0);
}

#[test]
fn newer_local_copy_wins_then_settles() {
    let server = TestServer::new();
    server.root.write_with_mtime("c.txt", b"server copy", 1_600_000_000);
    let client = Client::new(server.transport(), OrphanPolicy::Manifest);
    client.dir.write_with_mtime("c.txt", b"local edit", 1_700_000_000);

    let first = client.reconciler.run_pass().unwrap();
    assert_eq!(first.pushed, 1);
    assert_eq!(server.root.read("c.txt"), Some(b"local edit".to_vec()));

    let second = client.reconciler.run_pass().unwrap();
    assert_eq!(second.mutations(), 0);
}

#[test]
fn newer_remote_copy_wins() {
    let server = TestServer::new();
    server.root.write_with_mtime("c.txt", b"server edit", 1_700_000_000);
    let client = Client::new(server.transport(), OrphanPolicy::Manifest);
    client.dir.write_with_mtime("c.txt", b"stale", 1_600_000_000);

    let report = client.reconciler.run_pass().unwrap();
    assert_eq!(report.pulled, 1);
    assert_eq!(client.dir.read("c.txt"), Some(b"server edit".to_vec()));
}

#[test]
fn tied_mtimes_are_skipped() {
    let server = TestServer::new();
    server.root.write_with_mtime("c.txt", b"one", 1_650_000_000);
    let client = Client::new(server.transport(), OrphanPolicy::Manifest);
    client.dir.write_with_mtime("c.txt", b"two", 1_650_000_000);

    let decisions = client.reconciler.plan().unwrap();
    assert_eq!(decisions[0].action, Action::Skip(SkipReason::TiedModTime));
    let report = client.reconciler.run_pass().unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(server.root.read("c.txt"), Some(b"one".to_vec()));
    assert_eq!(client.dir.read("c.txt"), Some(b"two".to_vec()));
}

#[test]
fn sub_second_tie_is_skipped_over_the_wire() {
    let tied = Duration::new(1_650_000_000, 123_456_789);
    let server = TestServer::new();
    server.root.write("c.txt", b"remote");
    server.root.set_mtime_exact("c.txt", tied);
    let client = Client::new(server.transport(), OrphanPolicy::Manifest);
    client.dir.write("c.txt", b"local");
    client.dir.set_mtime_exact("c.txt", tied);
    // Filesystems without nanosecond mtimes still give both copies the same value.
    assert_eq!(server.root.mtime("c.txt"), client.dir.mtime("c.txt"));

    let decisions = client.reconciler.plan().unwrap();
    assert_eq!(decisions[0].action, Action::Skip(SkipReason::TiedModTime));
    assert_eq!(
        client.transfers().push("c.txt").unwrap(),
        TransferOutcome::Skipped(SkipReason::TiedModTime)
    );
    assert_eq!(server.root.read("c.txt"), Some(b"remote".to_vec()));
}

#[test]
fn deletion_propagates_between_clients() {
    let server = TestServer::new();
    let alice = Client::new(server.transport(), OrphanPolicy::Manifest);
    let bob = Client::new(server.transport(), OrphanPolicy::Manifest);

    alice.dir.write("shared.txt", b"hello");
    alice.reconciler.run_pass().unwrap();
    bob.reconciler.run_pass().unwrap();
    assert_eq!(bob.dir.read("shared.txt"), Some(b"hello".to_vec()));

    // Alice deletes; her delete intent removes the remote copy.
    alice.dir.remove("shared.txt");
    assert_eq!(
        alice.transfers().remove("shared.txt").unwrap(),
        TransferOutcome::DeletedRemote
    );

    // Bob synced it before, so its absence means it was deleted.
    let report = bob.reconciler.run_pass().unwrap();
    assert_eq!(report.deleted_local, 1);
    assert!(!bob.dir.exists("shared.txt"));
    assert!(server.root.names().is_empty());
}

#[test]
fn ignored_names_never_cross() {
    let server = TestServer::new();
    server.root.write("remote.tmp", b"server scratch");
    let client = Client::new(server.transport(), OrphanPolicy::Mirror);
    client.dir.write("notes.txt.swp", b"swap");
    client.dir.write(".DS_Store", b"meta");

    let report = client.reconciler.run_pass().unwrap();
    assert_eq!(report.mutations(), 0);
    assert!(!client.dir.exists("remote.tmp"));
    assert!(client.dir.exists("notes.txt.swp"));
    assert!(client.dir.exists(".DS_Store"));
    assert_eq!(server.root.names(), ["remote.tmp"]);
}

#[test]
fn real_http_round_trip() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let root = TestDir::new();
    root.write("b.txt", b"over the wire");

    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig::new(addr, root.path());
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = runtime.spawn(SyncServer::new(config).serve_on(listener, async move {
        let _ = stop_rx.await;
    }));

    let client = ReqwestClient::new(Duration::from_secs(5)).unwrap();
    let transport = Arc::new(HttpTransport::new(format!("http://{addr}"), client));
    let local = Client::new(Arc::clone(&transport), OrphanPolicy::Manifest);
    local.dir.write("my notes.txt", b"spaces in the name");

    let report = local.reconciler.run_pass().unwrap();
    assert_eq!(report.pulled, 1);
    assert_eq!(report.pushed, 1);
    assert_eq!(local.dir.read("b.txt"), Some(b"over the wire".to_vec()));
    assert_eq!(root.read("my notes.txt"), Some(b"spaces in the name".to_vec()));
    assert_eq!(transport.get("missing").unwrap(), None);
    assert!(transport.last_error().is_none());

    let _ = stop_tx.send(());
    runtime.block_on(server).unwrap().unwrap();
    drop(local);
    drop(transport);
}

fn seed(
    store: &MemoryStore,
    dir: &TestDir,
    local: &BTreeMap<String, FileState>,
    remote: &BTreeMap<String, FileState>,
) {
    for (name, file) in local {
        dir.write_with_mtime(name, &file.data, file.mtime);
    }
    for (name, file) in remote {
        store.insert(name, &file.data, Timestamp::from_secs(file.mtime));
    }
}

fn is_tie(
    name: &str,
    local: &BTreeMap<String, FileState>,
    remote: &BTreeMap<String, FileState>,
) -> bool {
    match (local.get(name), remote.get(name)) {
        (Some(l), Some(r)) => l.data != r.data && l.mtime == r.mtime,
        _ => false,
    }
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn pass_converges_and_second_pass_is_idle(
        (local, remote) in paired_state_strategy(6),
        mirror in any::<bool>(),
    ) {
        let policy = if mirror { OrphanPolicy::Mirror } else { OrphanPolicy::Manifest };
        let store = Arc::new(MemoryStore::new());
        let client = Client::new(Arc::clone(&store), policy);
        seed(&store, &client.dir, &local, &remote);

        let first = client.reconciler.run_pass().unwrap();
        prop_assert_eq!(first.failed, 0);

        let mut names: Vec<&String> = local.keys().chain(remote.keys()).collect();
        names.sort();
        names.dedup();
        for name in names {
            if is_tie(name, &local, &remote) {
                continue;
            }
            let here = client.dir.read(name);
            let there = store.contents(name);
            prop_assert_eq!(here, there, "{} diverged", name);
        }
        if mirror {
            // The remote listing is authoritative.
            prop_assert_eq!(client.dir.names(), store.names());
        }

        let mutations = store.mutations();
        let second = client.reconciler.run_pass().unwrap();
        prop_assert_eq!(second.mutations(), 0);
        prop_assert_eq!(store.mutations(), mutations);
    }

    #[test]
    fn planning_is_deterministic((local, remote) in paired_state_strategy(6)) {
        let to_local = |files: &BTreeMap<String, FileState>| {
            LocalSnapshot::from_records(files.iter().map(|(name, f)| filesync_engine::FileRecord {
                name: name.clone(),
                fingerprint: ContentDigest::of(&f.data).into(),
                mod_time: Timestamp::from_secs(f.mtime),
            }))
        };
        let local_snapshot = to_local(&local);
        let remote_snapshot = RemoteSnapshot::from_entries(
            remote.iter().map(|(n, f)| (n.clone(), ContentDigest::of(&f.data).into())),
        );
        let mtime_of = |name: &str| remote.get(name).map(|f| Timestamp::from_secs(f.mtime));
        let manifest = SyncManifest::new();

        let once = plan_decisions(&local_snapshot, &remote_snapshot, OrphanPolicy::Manifest, &manifest, mtime_of);
        let again = plan_decisions(&local_snapshot, &remote_snapshot, OrphanPolicy::Manifest, &manifest, mtime_of);
        prop_assert_eq!(&once, &again);

        for decision in &once {
            let (l, r) = (local.get(&decision.name), remote.get(&decision.name));
            if let (Some(l), Some(r)) = (l, r) {
                let expected = if l.data == r.data {
                    Action::UpToDate(ContentDigest::of(&l.data))
                } else if l.mtime > r.mtime {
                    Action::Push
                } else if l.mtime < r.mtime {
                    Action::Pull
                } else {
                    Action::Skip(SkipReason::TiedModTime)
                };
                prop_assert_eq!(decision.action, expected);
            }
        }
    }

    #[test]
    fn ignored_names_are_untouched(
        local_ignored in prop::collection::btree_set(ignored_name_strategy(), 0..4),
        remote_ignored in prop::collection::btree_set(ignored_name_strategy(), 0..4),
    ) {
        let store = Arc::new(MemoryStore::new());
        let client = Client::new(Arc::clone(&store), OrphanPolicy::Mirror);
        for name in &local_ignored {
            client.dir.write(name, b"local");
        }
        for name in &remote_ignored {
            store.insert(name, b"remote", Timestamp::from_secs(1));
        }

        let report = client.reconciler.run_pass().unwrap();
        prop_assert_eq!(report.mutations(), 0);
        prop_assert_eq!(store.mutations(), 0);
        prop_assert_eq!(store.gets(), 0);
        let local_names: Vec<String> = local_ignored.into_iter().collect();
        prop_assert_eq!(client.dir.names(), local_names);
    }
}

//! Sync agent runtime.
//!
//! Three loops cooperate through one queue:
//!
//! - the translator loop turns raw events into intents and ticks the
//!   debounce clock;
//! - the reconciliation loop plans a full pass every interval;
//! - a single worker drains the queue and runs each item to completion on
//!   a blocking thread before taking the next.
//!
//! Because there is exactly one consumer, at most one transfer is in flight
//! and work for a name is never interleaved.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::manifest::SyncManifest;
use crate::reconcile::{Decision, PassReport, Reconciler};
use crate::transfer::{TransferClient, TransferOutcome};
use crate::translator::{FsEvent, Intent, IntentKind, Translator};
use crate::transport::StoreTransport;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

/// The current activity of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Not running.
    Stopped,
    /// Running, nothing in flight.
    Idle,
    /// Planning a reconciliation pass.
    Reconciling,
    /// Executing a queued item.
    Transferring,
}

impl AgentState {
    /// Returns true if the agent is doing network or disk work.
    pub fn is_active(&self) -> bool {
        matches!(self, AgentState::Reconciling | AgentState::Transferring)
    }
}

/// Statistics about agent activity.
#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    /// Reconciliation passes whose decisions were all executed.
    pub passes_completed: u64,
    /// Passes abandoned because a snapshot was unavailable.
    pub passes_failed: u64,
    /// Intents taken from the event path.
    pub intents_processed: u64,
    /// Files uploaded.
    pub uploads: u64,
    /// Files downloaded.
    pub downloads: u64,
    /// Remote files deleted.
    pub remote_deletes: u64,
    /// Local files deleted.
    pub local_deletes: u64,
    /// Items skipped.
    pub skipped: u64,
    /// Items that failed.
    pub failures: u64,
    /// Report of the last completed pass.
    pub last_pass: Option<PassReport>,
    /// When the last pass completed.
    pub last_pass_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

impl AgentStats {
    fn record(&mut self, outcome: &SyncResult<TransferOutcome>) {
        match outcome {
            Ok(TransferOutcome::Uploaded) => self.uploads += 1,
            Ok(TransferOutcome::Downloaded) => self.downloads += 1,
            Ok(TransferOutcome::DeletedRemote) => self.remote_deletes += 1,
            Ok(TransferOutcome::DeletedLocal) => self.local_deletes += 1,
            Ok(TransferOutcome::Skipped(_)) => self.skipped += 1,
            Ok(TransferOutcome::AlreadyInSync | TransferOutcome::Missing) => {}
            Err(e) => {
                self.failures += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }
}

/// One unit of work for the worker.
#[derive(Debug)]
pub enum WorkItem {
    /// A debounced or immediate intent from the event path.
    Intent(Intent),
    /// One decision of a reconciliation pass.
    Decision(Decision),
    /// Marks the end of a pass; the reconciliation loop waits on it.
    PassEnd {
        /// When planning started.
        started: Instant,
        /// Signalled once every decision before it has run.
        done: oneshot::Sender<()>,
    },
}

/// Watches a directory and keeps it in sync with a remote store.
pub struct SyncAgent<T: StoreTransport + ?Sized + 'static> {
    config: SyncConfig,
    reconciler: Arc<Reconciler<T>>,
    state: Arc<RwLock<AgentState>>,
    stats: Arc<RwLock<AgentStats>>,
}

impl<T: StoreTransport + ?Sized + 'static> SyncAgent<T> {
    /// Creates an agent, loading the manifest if one is configured.
    pub fn new(config: SyncConfig, transport: Arc<T>) -> SyncResult<Self> {
        let manifest = match &config.manifest_path {
            Some(path) => SyncManifest::load(path)?,
            None => SyncManifest::new(),
        };
        let transfers = TransferClient::new(transport, &config.local_dir, Arc::new(manifest));
        let reconciler = Reconciler::new(transfers, config.ignore_rules(), config.orphan_policy);

        Ok(Self {
            config,
            reconciler: Arc::new(reconciler),
            state: Arc::new(RwLock::new(AgentState::Stopped)),
            stats: Arc::new(RwLock::new(AgentStats::default())),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the reconciler.
    pub fn reconciler(&self) -> &Arc<Reconciler<T>> {
        &self.reconciler
    }

    /// Gets the current state.
    pub fn state(&self) -> AgentState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> AgentStats {
        self.stats.read().clone()
    }

    /// Runs one reconciliation pass on a blocking thread.
    pub async fn sync_once(&self) -> SyncResult<PassReport> {
        let reconciler = Arc::clone(&self.reconciler);
        let report = blocking(move || reconciler.run_pass()).await?;
        self.save_manifest().await;
        Ok(report)
    }

    /// Runs until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// On shutdown the in-flight item finishes, queued work is dropped and
    /// the manifest is saved.
    pub async fn run(
        &self,
        events: mpsc::Receiver<FsEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> SyncResult<()> {
        if *shutdown.borrow() {
            return Ok(());
        }

        let (work_tx, work_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        *self.state.write() = AgentState::Idle;
        tracing::info!(
            "sync agent started for {} (orphan policy: {})",
            self.config.local_dir.display(),
            self.config.orphan_policy
        );

        tokio::join!(
            self.translate_loop(events, work_tx.clone(), shutdown.clone()),
            self.reconcile_loop(work_tx, shutdown.clone()),
            self.work_loop(work_rx, shutdown),
        );

        self.save_manifest().await;
        *self.state.write() = AgentState::Stopped;
        tracing::info!("sync agent stopped");
        Ok(())
    }

    async fn translate_loop(
        &self,
        mut events: mpsc::Receiver<FsEvent>,
        work_tx: mpsc::Sender<WorkItem>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut translator = Translator::new(self.config.ignore_rules(), self.config.debounce_window);
        let mut tick = tokio::time::interval(self.config.debounce_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            let ready = tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv(), if events_open => match event {
                    Some(event) => translator.observe(&event, Instant::now()),
                    None => {
                        tracing::debug!("event source closed");
                        events_open = false;
                        continue;
                    }
                },
                _ = tick.tick() => translator.due(Instant::now()),
            };

            for intent in ready {
                if work_tx.send(WorkItem::Intent(intent)).await.is_err() {
                    return;
                }
            }
        }
    }

    async fn reconcile_loop(
        &self,
        work_tx: mpsc::Sender<WorkItem>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(self.config.reconcile_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = interval.tick() => {}
            }

            let started = Instant::now();
            *self.state.write() = AgentState::Reconciling;
            let reconciler = Arc::clone(&self.reconciler);
            let planned = tokio::task::spawn_blocking(move || reconciler.plan()).await;
            *self.state.write() = AgentState::Idle;

            let decisions = match planned {
                Ok(Ok(decisions)) => decisions,
                Ok(Err(e)) => {
                    tracing::warn!("reconciliation pass abandoned: {}", e);
                    let mut stats = self.stats.write();
                    stats.passes_failed += 1;
                    stats.last_error = Some(e.to_string());
                    continue;
                }
                Err(e) => {
                    tracing::error!("reconciliation planner panicked: {}", e);
                    continue;
                }
            };

            tracing::debug!("planned {} decisions", decisions.len());
            for decision in decisions {
                if work_tx.send(WorkItem::Decision(decision)).await.is_err() {
                    return;
                }
            }

            let (done, finished) = oneshot::channel();
            let end = WorkItem::PassEnd { started, done };
            if work_tx.send(end).await.is_err() {
                return;
            }
            // A pass is never planned while the previous one is still queued.
            tokio::select! {
                _ = shutdown.changed() => break,
                result = finished => {
                    if result.is_err() {
                        return;
                    }
                }
            }
        }
    }

    async fn work_loop(
        &self,
        mut work_rx: mpsc::Receiver<WorkItem>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut pass = PassReport::default();

        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                item = work_rx.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            match item {
                WorkItem::Intent(intent) => {
                    let outcome = self.execute_intent(intent).await;
                    let mut stats = self.stats.write();
                    stats.intents_processed += 1;
                    stats.record(&outcome);
                }
                WorkItem::Decision(decision) => {
                    let outcome = self.execute_decision(decision).await;
                    pass.record(&outcome);
                    self.stats.write().record(&outcome);
                }
                WorkItem::PassEnd { started, done } => {
                    let mut report = std::mem::take(&mut pass);
                    report.duration = started.elapsed();
                    tracing::debug!("reconciliation pass finished: {:?}", report);
                    {
                        let mut stats = self.stats.write();
                        stats.passes_completed += 1;
                        stats.last_pass = Some(report);
                        stats.last_pass_time = Some(Instant::now());
                    }
                    self.save_manifest().await;
                    let _ = done.send(());
                }
            }
        }
    }

    async fn execute_intent(&self, intent: Intent) -> SyncResult<TransferOutcome> {
        let reconciler = Arc::clone(&self.reconciler);
        let name = intent.name.clone();
        let kind = intent.kind;
        let outcome = self
            .transfer(move || match kind {
                IntentKind::Upload => reconciler.transfers().push(&name),
                IntentKind::Delete => reconciler.transfers().remove(&name),
            })
            .await;
        if let Err(e) = &outcome {
            tracing::warn!("{:?} '{}' failed: {}", intent.kind, intent.name, e);
        }
        outcome
    }

    async fn execute_decision(&self, decision: Decision) -> SyncResult<TransferOutcome> {
        let reconciler = Arc::clone(&self.reconciler);
        let label = format!("{:?} '{}'", decision.action, decision.name);
        let outcome = self.transfer(move || reconciler.execute(&decision)).await;
        if let Err(e) = &outcome {
            tracing::warn!("{} failed: {}", label, e);
        }
        outcome
    }

    async fn transfer<F>(&self, f: F) -> SyncResult<TransferOutcome>
    where
        F: FnOnce() -> SyncResult<TransferOutcome> + Send + 'static,
    {
        *self.state.write() = AgentState::Transferring;
        let result = blocking(f).await;
        *self.state.write() = AgentState::Idle;
        result
    }

    async fn save_manifest(&self) {
        let Some(path) = self.config.manifest_path.clone() else {
            return;
        };
        let manifest = Arc::clone(self.reconciler.transfers().manifest());
        let target = path.clone();
        if let Err(e) = blocking(move || manifest.save(&target)).await {
            tracing::warn!("cannot save manifest to {}: {}", path.display(), e);
        }
    }
}

/// Runs disk or network work on a blocking thread.
async fn blocking<F, R>(f: F) -> SyncResult<R>
where
    F: FnOnce() -> SyncResult<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or(Err(SyncError::Cancelled))
}

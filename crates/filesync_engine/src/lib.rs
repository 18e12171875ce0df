//! # filesync engine
//!
//! Keeps a local directory and a remote file store in sync.
//!
//! This crate provides:
//! - Debounced translation of filesystem events into upload/delete intents
//! - Periodic full reconciliation of local and remote snapshots
//! - SHA-256 content comparison with last-write-wins conflict resolution
//! - HTTP transport abstraction with a `reqwest` client
//! - A manifest of names known to be in sync on both sides
//!
//! ## Architecture
//!
//! Two independent triggers feed one work queue:
//! 1. The event path: `notify` events are debounced per name and become
//!    intents (upload after a quiet window, delete immediately)
//! 2. The reconciliation path: every interval, a fresh remote listing and a
//!    fresh local scan are compared and every difference becomes a decision
//!
//! A single worker executes queued items one at a time, so the two paths
//! never race on the same name.
//!
//! ## Key Invariants
//!
//! - Identical digests never cause a transfer
//! - Content that could not be read never matches anything
//! - A conflict transfers only from the strictly newer side; equal mtimes
//!   skip the name
//! - Ignored names are never uploaded, downloaded or deleted
//! - Remote state is re-read immediately before every transfer

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod agent;
mod config;
mod conflict;
mod error;
mod http;
mod ignore;
mod manifest;
mod reconcile;
mod snapshot;
mod transfer;
mod translator;
mod transport;
mod watcher;

pub use agent::{AgentState, AgentStats, SyncAgent, WorkItem};
pub use config::{OrphanPolicy, SyncConfig, DEFAULT_IGNORE_PATTERNS};
pub use conflict::{resolve, Resolution};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpResponse, HttpTransport, LoopbackClient, LoopbackServer, ReqwestClient};
pub use ignore::IgnoreRules;
pub use manifest::SyncManifest;
pub use reconcile::{plan_decisions, Action, Decision, PassReport, Reconciler};
pub use snapshot::{FileRecord, LocalSnapshot, RemoteSnapshot};
pub use transfer::{SkipReason, TransferClient, TransferOutcome};
pub use translator::{FsEvent, FsEventKind, Intent, IntentKind, PendingIntent, Translator};
pub use transport::{MemoryStore, StoreTransport};
pub use watcher::{spawn_watcher, translate_notify_event};

//! Debounced translation of filesystem events into sync intents.
//!
//! Editors save in bursts: a create, several writes, a metadata touch.
//! The translator keeps one pending upload per name and only emits it once
//! the name has been quiet for the debounce window. Deletes are not
//! debounced.

use crate::ignore::IgnoreRules;
use filesync_protocol::file_name_of;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Kind of a raw filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// A file appeared.
    Created,
    /// A file's content or metadata changed.
    Modified,
    /// A file was removed.
    Deleted,
    /// A file was renamed from `path` to `dest_path`.
    Moved,
}

/// A raw filesystem event for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// What happened.
    pub kind: FsEventKind,
    /// Affected path (the source, for moves).
    pub path: PathBuf,
    /// Destination of a move.
    pub dest_path: Option<PathBuf>,
    /// Whether the path is a directory.
    pub is_dir: bool,
}

impl FsEvent {
    /// Creates a non-move event for a file.
    pub fn new(kind: FsEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            dest_path: None,
            is_dir: false,
        }
    }

    /// Creates a move event for a file.
    pub fn moved(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            kind: FsEventKind::Moved,
            path: from.into(),
            dest_path: Some(to.into()),
            is_dir: false,
        }
    }

    /// Marks the event as concerning a directory.
    pub fn dir(mut self) -> Self {
        self.is_dir = true;
        self
    }
}

/// Kind of a sync intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Push the local copy.
    Upload,
    /// Remove the remote copy.
    Delete,
}

/// A request to sync one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    /// Flat file name.
    pub name: String,
    /// What to do.
    pub kind: IntentKind,
}

impl Intent {
    fn upload(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: IntentKind::Upload,
        }
    }

    fn delete(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: IntentKind::Delete,
        }
    }
}

/// A pending, not yet emitted intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingIntent {
    /// Always [`IntentKind::Upload`]; deletes are never pending.
    pub kind: IntentKind,
    /// When the intent becomes due.
    pub deadline: Instant,
}

/// Per-name debounce state.
///
/// Owned by a single task; the map is only touched by [`Translator::observe`]
/// and [`Translator::due`].
#[derive(Debug)]
pub struct Translator {
    ignore: IgnoreRules,
    window: Duration,
    pending: HashMap<String, PendingIntent>,
}

impl Translator {
    /// Creates a translator with the given debounce window.
    pub fn new(ignore: IgnoreRules, window: Duration) -> Self {
        Self {
            ignore,
            window,
            pending: HashMap::new(),
        }
    }

    /// Returns the debounce window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feeds one event. Returns intents that are due immediately (deletes).
    pub fn observe(&mut self, event: &FsEvent, now: Instant) -> Vec<Intent> {
        if event.is_dir {
            return Vec::new();
        }

        let mut ready = Vec::new();
        match event.kind {
            FsEventKind::Created | FsEventKind::Modified => {
                if let Some(name) = self.accept(&event.path) {
                    self.schedule_upload(name, now);
                }
            }
            FsEventKind::Deleted => {
                if let Some(name) = self.accept(&event.path) {
                    self.pending.remove(name);
                    ready.push(Intent::delete(name));
                }
            }
            FsEventKind::Moved => {
                if let Some(name) = self.accept(&event.path) {
                    self.pending.remove(name);
                    ready.push(Intent::delete(name));
                }
                if let Some(dest) = event.dest_path.as_deref().and_then(|p| self.accept(p)) {
                    self.schedule_upload(dest, now);
                }
            }
        }
        ready
    }

    /// Emits and clears every upload whose deadline has passed.
    ///
    /// Intents come out in name order.
    pub fn due(&mut self, now: Instant) -> Vec<Intent> {
        let mut ready: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(name, _)| name.clone())
            .collect();
        ready.sort();

        ready
            .into_iter()
            .filter_map(|name| {
                let pending = self.pending.remove(&name)?;
                tracing::debug!("debounce elapsed for '{}'", name);
                Some(Intent {
                    name,
                    kind: pending.kind,
                })
            })
            .collect()
    }

    /// Returns the pending intent for `name`.
    pub fn pending(&self, name: &str) -> Option<&PendingIntent> {
        self.pending.get(name)
    }

    /// Number of pending intents.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    fn accept<'a>(&self, path: &'a std::path::Path) -> Option<&'a str> {
        let name = file_name_of(path)?;
        if self.ignore.is_ignored(name) {
            tracing::trace!("ignoring event for '{}'", name);
            return None;
        }
        Some(name)
    }

    fn schedule_upload(&mut self, name: &str, now: Instant) {
        let deadline = now + self.window;
        self.pending
            .entry(name.to_string())
            .and_modify(|p| p.deadline = deadline)
            .or_insert(PendingIntent {
                kind: IntentKind::Upload,
                deadline,
            });
    }
}

//! Filesystem watch adapter over `notify`.

use crate::error::SyncResult;
use crate::translator::{FsEvent, FsEventKind};
use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc;

/// Converts one `notify` event into raw events.
///
/// Access events are dropped. A rename whose direction the platform could
/// not tell is reported as a delete or a modify depending on whether the
/// path still exists.
pub fn translate_notify_event(event: &Event) -> Vec<FsEvent> {
    let is_dir = |p: &Path| p.is_dir();

    let per_path = |kind: FsEventKind| -> Vec<FsEvent> {
        event
            .paths
            .iter()
            .map(|p| FsEvent {
                kind,
                path: p.clone(),
                dest_path: None,
                is_dir: is_dir(p),
            })
            .collect()
    };

    match &event.kind {
        EventKind::Create(_) => per_path(FsEventKind::Created),
        EventKind::Remove(_) => per_path(FsEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if event.paths.len() >= 2 => {
                let to = &event.paths[1];
                vec![FsEvent {
                    kind: FsEventKind::Moved,
                    path: event.paths[0].clone(),
                    dest_path: Some(to.clone()),
                    is_dir: is_dir(to),
                }]
            }
            RenameMode::From => per_path(FsEventKind::Deleted),
            RenameMode::To => per_path(FsEventKind::Created),
            _ => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        FsEventKind::Modified
                    } else {
                        FsEventKind::Deleted
                    };
                    FsEvent {
                        kind,
                        path: p.clone(),
                        dest_path: None,
                        is_dir: is_dir(p),
                    }
                })
                .collect(),
        },
        EventKind::Modify(_) => per_path(FsEventKind::Modified),
        _ => Vec::new(),
    }
}

/// Watches `dir` (non-recursively) and forwards raw events to `tx`.
///
/// Events are delivered until the returned watcher is dropped or the
/// receiver closes.
pub fn spawn_watcher(dir: &Path, tx: mpsc::Sender<FsEvent>) -> SyncResult<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for fs_event in translate_notify_event(&event) {
                    if tx.blocking_send(fs_event).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!("watcher error: {}", e),
        },
        Config::default(),
    )?;

    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    tracing::info!("watching {}", dir.display());
    Ok(watcher)
}

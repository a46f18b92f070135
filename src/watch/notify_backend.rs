// src/watch/notify_backend.rs

use std::path::Path;

use anyhow::{Context, Result};
use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::types::PollMode;
use crate::watch::backend::{TargetSink, WatchBackend, WatcherHandle};

/// Production watch backend built on `notify`.
///
/// One `notify` watcher per physical target, watching that single path
/// non-recursively. With `PollMode::Off` the platform's native backend is
/// used; otherwise a `PollWatcher` stats the path at the configured
/// interval.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyBackend {
    poll: PollMode,
}

impl NotifyBackend {
    pub fn new(poll: PollMode) -> Self {
        Self { poll }
    }
}

/// Native or polling watcher, kept alive for as long as the handle is open.
enum NotifyWatcher {
    Recommended(RecommendedWatcher),
    Polling(PollWatcher),
}

impl NotifyWatcher {
    fn watch(&mut self, path: &Path) -> notify::Result<()> {
        match self {
            Self::Recommended(w) => w.watch(path, RecursiveMode::NonRecursive),
            Self::Polling(w) => w.watch(path, RecursiveMode::NonRecursive),
        }
    }
}

/// Dropping the inner watcher stops its event thread.
struct NotifyHandle {
    inner: Option<NotifyWatcher>,
}

impl WatcherHandle for NotifyHandle {
    fn close(&mut self) {
        self.inner.take();
    }
}

/// Only content changes count; access and removal events do not.
fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any
    )
}

impl WatchBackend for NotifyBackend {
    fn watch(&mut self, path: &Path, sink: TargetSink) -> Result<Box<dyn WatcherHandle>> {
        let target = sink.target();
        // Closure called synchronously by notify whenever an event arrives.
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if is_change(&event.kind) {
                    sink.changed();
                }
            }
            Err(err) => {
                sink.failed(err.to_string());
            }
        };

        let mut watcher = match self.poll.interval() {
            None => NotifyWatcher::Recommended(
                RecommendedWatcher::new(handler, Config::default())
                    .context("creating native file watcher")?,
            ),
            Some(interval) => NotifyWatcher::Polling(
                PollWatcher::new(handler, Config::default().with_poll_interval(interval))
                    .context("creating polling file watcher")?,
            ),
        };

        watcher
            .watch(path)
            .with_context(|| format!("watching {:?}", path))?;

        debug!(%target, ?path, poll = ?self.poll, "notify watcher started");

        Ok(Box::new(NotifyHandle {
            inner: Some(watcher),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};

    #[test]
    fn change_kinds() {
        assert!(is_change(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_change(&EventKind::Create(CreateKind::File)));
        assert!(is_change(&EventKind::Any));
        assert!(!is_change(&EventKind::Access(AccessKind::Any)));
        assert!(!is_change(&EventKind::Remove(RemoveKind::File)));
    }
}

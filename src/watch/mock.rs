// src/watch/mock.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::{TargetId, TargetSink, WatchBackend, WatcherHandle};

#[derive(Debug)]
struct MockWatcher {
    path: PathBuf,
    sink: TargetSink,
    closed: Arc<AtomicBool>,
}

impl MockWatcher {
    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct MockState {
    /// Every path passed to `watch`, in call order.
    calls: Vec<PathBuf>,
    watchers: Vec<MockWatcher>,
    failing: Vec<PathBuf>,
}

/// In-memory watch primitive.
///
/// Clones share state, so a test keeps one clone and hands the other to the
/// orchestrator. Nothing touches the real filesystem: tests simulate edits
/// with [`MockWatchBackend::emit_change`].
#[derive(Debug, Clone, Default)]
pub struct MockWatchBackend {
    state: Arc<Mutex<MockState>>,
}

struct MockHandle {
    closed: Arc<AtomicBool>,
}

impl WatcherHandle for MockHandle {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl MockWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `watch` of `path` fail.
    pub fn fail_on(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.failing.push(path.as_ref().to_path_buf());
    }

    /// Paths passed to `watch` so far, including ones that failed.
    pub fn watch_calls(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn watch_count(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let state = self.state.lock().unwrap();
        state.calls.iter().filter(|p| p.as_path() == path).count()
    }

    /// Number of watchers that have not been closed.
    pub fn open_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.watchers.iter().filter(|w| w.is_open()).count()
    }

    pub fn is_open(&self, path: impl AsRef<Path>) -> bool {
        !self.open_targets(path).is_empty()
    }

    /// Target ids of the open watchers on `path`.
    pub fn open_targets(&self, path: impl AsRef<Path>) -> Vec<TargetId> {
        let path = path.as_ref();
        let state = self.state.lock().unwrap();
        state
            .watchers
            .iter()
            .filter(|w| w.is_open() && w.path == path)
            .map(|w| w.sink.target())
            .collect()
    }

    /// Simulate an edit to `path`; every open watcher on it fires.
    /// Returns how many watchers fired.
    pub fn emit_change(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let state = self.state.lock().unwrap();
        state
            .watchers
            .iter()
            .filter(|w| w.is_open() && w.path == path)
            .filter(|w| w.sink.changed())
            .count()
    }

    /// Like `emit_change`, but closed watchers fire too. Models a callback
    /// that was already in flight when its watcher was closed.
    pub fn emit_change_late(&self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let state = self.state.lock().unwrap();
        state
            .watchers
            .iter()
            .filter(|w| w.path == path)
            .filter(|w| w.sink.changed())
            .count()
    }

    pub fn emit_error(&self, path: impl AsRef<Path>, message: &str) -> usize {
        let path = path.as_ref();
        let state = self.state.lock().unwrap();
        state
            .watchers
            .iter()
            .filter(|w| w.is_open() && w.path == path)
            .filter(|w| w.sink.failed(message))
            .count()
    }
}

impl WatchBackend for MockWatchBackend {
    fn watch(&mut self, path: &Path, sink: TargetSink) -> Result<Box<dyn WatcherHandle>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(path.to_path_buf());

        if state.failing.iter().any(|p| p == path) {
            return Err(anyhow!("mock watch failure: {:?}", path));
        }

        let closed = Arc::new(AtomicBool::new(false));
        state.watchers.push(MockWatcher {
            path: path.to_path_buf(),
            sink,
            closed: Arc::clone(&closed),
        });
        Ok(Box::new(MockHandle { closed }))
    }
}

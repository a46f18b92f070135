// src/watch/backend.rs

//! Pluggable watch-primitive abstraction.
//!
//! The registry talks to a `WatchBackend` instead of `notify` directly, so
//! tests can swap in [`super::mock::MockWatchBackend`] and drive change and
//! error events by hand.
//!
//! - [`super::notify_backend::NotifyBackend`] is the production backend.
//! - Every watcher is handed a [`TargetSink`] tagged with the `TargetId`
//!   the registry assigned; the watcher reports through it and never
//!   touches orchestrator state itself.

use std::fmt;
use std::path::Path;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::engine::RuntimeEvent;

/// Sender half of the orchestrator's event channel.
pub type EventSender = mpsc::UnboundedSender<RuntimeEvent>;

/// Identity of one physical watch target.
///
/// Ids are never reused within an orchestrator, so an event from a target
/// that has been torn down can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callback endpoint given to a single watcher.
#[derive(Debug, Clone)]
pub struct TargetSink {
    target: TargetId,
    tx: EventSender,
}

impl TargetSink {
    pub fn new(target: TargetId, tx: EventSender) -> Self {
        Self { target, tx }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Report that the watched path changed. Returns false once the
    /// orchestrator has shut down.
    pub fn changed(&self) -> bool {
        self.tx
            .send(RuntimeEvent::TargetChanged {
                target: self.target,
            })
            .is_ok()
    }

    /// Report a watch-primitive error.
    pub fn failed(&self, message: impl Into<String>) -> bool {
        self.tx
            .send(RuntimeEvent::TargetFailed {
                target: self.target,
                message: message.into(),
            })
            .is_ok()
    }
}

/// A live watcher. `close` must stop further callbacks.
pub trait WatcherHandle: Send {
    fn close(&mut self);
}

/// Trait abstracting how a single path is watched.
pub trait WatchBackend: Send {
    /// Start watching `path`, reporting through `sink`.
    fn watch(&mut self, path: &Path, sink: TargetSink) -> Result<Box<dyn WatcherHandle>>;
}

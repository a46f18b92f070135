// src/orchestrator.rs

//! Host-facing handle.
//!
//! The builder reports its lifecycle through the methods on
//! [`Orchestrator`]; the single subscriber reads [`Notification`]s from the
//! receiver returned by [`Orchestrator::spawn`].

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{Caches, PackageInfo};
use crate::engine::{
    CoreOrchestrator, NotificationReceiver, Runtime, RuntimeEvent,
};
use crate::errors::Result;
use crate::pipeline::{CacheCollector, OutputMeter};
use crate::types::{BuildOutcome, LogicalId, WatchOptions};
use crate::watch::{EventSender, WatchBackend};

/// Handle to a running orchestrator.
///
/// Dropping the handle shuts the orchestrator down; [`Orchestrator::close`]
/// does the same but waits until every watcher is closed.
pub struct Orchestrator {
    events: EventSender,
    caches: Caches,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("caches", &self.caches)
            .field("running", &self.task.is_some())
            .finish()
    }
}

impl Orchestrator {
    /// Start an orchestrator on the current Tokio runtime.
    ///
    /// Configuration errors (e.g. a malformed ignore pattern) are reported
    /// here, before anything is watched.
    pub fn spawn<B>(
        options: WatchOptions,
        backend: B,
        caches: Caches,
    ) -> Result<(Self, NotificationReceiver)>
    where
        B: WatchBackend + 'static,
    {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notes_tx, notes_rx) = mpsc::unbounded_channel();

        let core = CoreOrchestrator::new(&options, Box::new(backend), caches.clone(), events_tx.clone())?;
        let runtime = Runtime::new(core, events_rx, events_tx.clone(), notes_tx);
        let task = tokio::spawn(runtime.run());

        debug!(?options, "orchestrator spawned");

        Ok((
            Self {
                events: events_tx,
                caches,
                task: Some(task),
            },
            notes_rx,
        ))
    }

    fn send(&self, event: RuntimeEvent) {
        if self.events.send(event).is_err() {
            debug!("orchestrator already closed; event dropped");
        }
    }

    pub fn file_discovered(&self, path: impl Into<String>) {
        self.send(RuntimeEvent::FileDiscovered { path: path.into() });
    }

    /// The builder resolved `path` and exposes it under `alias`. The alias
    /// is the id reported in updates; the cache entry lives under `path`.
    pub fn file_exposed(&self, path: impl Into<String>, alias: impl Into<LogicalId>) {
        self.send(RuntimeEvent::FileExposed {
            path: path.into(),
            alias: alias.into(),
        });
    }

    pub fn package_discovered(&self, package: PackageInfo) {
        self.send(RuntimeEvent::PackageDiscovered { package });
    }

    /// A transform of `owner` read `dep`; changes to `dep` invalidate `owner`.
    pub fn transform_dependency(&self, owner: impl Into<LogicalId>, dep: impl Into<String>) {
        self.send(RuntimeEvent::TransformDependency {
            owner: owner.into(),
            dep: dep.into(),
        });
    }

    pub fn build_started(&self) {
        self.send(RuntimeEvent::BuildStarted);
    }

    /// Call on success and failure alike.
    pub fn build_finished(&self, outcome: BuildOutcome) {
        self.send(RuntimeEvent::BuildFinished { outcome });
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Cache collection stage for the next dependency walk.
    pub fn collector(&self) -> CacheCollector {
        CacheCollector::new(self.caches.modules.clone())
    }

    /// Diagnostics stage for the next build's output stream.
    ///
    /// The meter reports through the orchestrator's event loop, so a meter
    /// still running at `close` publishes nothing.
    pub fn meter(&self) -> OutputMeter {
        OutputMeter::new(self.events.clone())
    }

    /// Close every watcher and cancel the pending timer.
    ///
    /// Returns once the orchestrator has stopped; nothing is published
    /// afterwards, including by meters handed out earlier.
    pub async fn close(mut self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(RuntimeEvent::ShutdownRequested { ack: Some(ack_tx) });
        let _ = ack_rx.await;
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                debug!(error = %err, "orchestrator task ended abnormally");
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.events.send(RuntimeEvent::ShutdownRequested { ack: None });
        }
    }
}

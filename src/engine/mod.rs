// src/engine/mod.rs

//! Orchestration engine for depwatch.
//!
//! This module ties together:
//! - the watch registry (which physical watchers back which logical file)
//! - the invalidation debouncer (quiet-period coalescing of edits)
//! - the build-phase gate (no delivery while a build is consuming the cache)
//! - the main runtime event loop that reacts to:
//!   - builder discoveries (files, packages, transform dependencies)
//!   - watcher change / error callbacks
//!   - debounce timer fires
//!   - build start / finish
//!   - shutdown
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::cache::PackageInfo;
use crate::types::{BuildOutcome, LogicalId};
use crate::watch::TargetId;

/// Events flowing into the runtime from the builder, watchers and timers.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// The builder resolved a file into the bundle.
    FileDiscovered { path: String },
    /// The builder resolved `path` and exposes it under `alias`.
    FileExposed { path: String, alias: LogicalId },
    /// The builder read a package manifest.
    PackageDiscovered { package: PackageInfo },
    /// A transform of `owner` declared that it read `dep`.
    TransformDependency { owner: LogicalId, dep: String },
    BuildStarted,
    BuildFinished { outcome: BuildOutcome },
    /// A physical watch target saw a change.
    TargetChanged { target: TargetId },
    /// The watch primitive reported an error for a target.
    TargetFailed { target: TargetId, message: String },
    /// An output meter saw its stream end.
    OutputMeasured { bytes: usize, elapsed: Duration },
    /// The debounce timer armed with `generation` elapsed.
    TimerFired { generation: u64 },
    /// Stop watching. `ack` is answered once every watcher is closed.
    ShutdownRequested { ack: Option<oneshot::Sender<()>> },
}

/// Everything the orchestrator tells its single subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// These logical files changed; rebuild. Sorted, no duplicates.
    Update(Vec<LogicalId>),
    /// Passthrough of a watch-primitive error.
    WatchError { path: String, message: String },
    /// Bytes written by the last build's output stream.
    Bytes(usize),
    /// Time from the end of the record phase to the end of output.
    Time(Duration),
    Log(String),
}

pub type NotificationSender = mpsc::UnboundedSender<Notification>;
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

pub mod core;
pub mod debounce;
pub mod event_handlers;
pub mod gate;
pub mod runtime;

pub use core::CoreOrchestrator;
pub use debounce::{DebounceState, Debouncer};
pub use event_handlers::{CoreCommand, CoreStep};
pub use gate::BuildGate;
pub use runtime::Runtime;

// src/engine/event_handlers.rs

//! Event handling logic for the core orchestrator.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::{Caches, PackageInfo};
use crate::engine::debounce::Debouncer;
use crate::engine::gate::BuildGate;
use crate::engine::Notification;
use crate::types::BuildOutcome;
use crate::watch::{TargetId, WatchOutcome, WatchRegistry};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Replace any running debounce timer with one that fires
    /// `TimerFired { generation }` after `delay`.
    ArmTimer { generation: u64, delay: Duration },
    /// Abort the running debounce timer.
    CancelTimer,
    /// Hand a notification to the subscriber.
    Publish(Notification),
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub fn running(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub fn idle() -> Self {
        Self::running(Vec::new())
    }

    pub fn stopped(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

/// Arm a watcher for `(logical, physical)`.
///
/// A refusal from the watch primitive is not fatal; it is forwarded to the
/// subscriber as a `WatchError`.
pub fn handle_watch_request(registry: &mut WatchRegistry, logical: &str, physical: &str) -> CoreStep {
    match registry.watch_file(logical, physical) {
        Ok(WatchOutcome::Watching(_) | WatchOutcome::AlreadyWatched | WatchOutcome::Ignored) => {
            CoreStep::idle()
        }
        Err(err) => {
            warn!(logical, physical, error = %err, "failed to watch file");
            CoreStep::running(vec![CoreCommand::Publish(Notification::WatchError {
                path: physical.to_string(),
                message: format!("{err:#}"),
            })])
        }
    }
}

/// Watch a package's manifest and remember the package.
pub fn handle_package(registry: &mut WatchRegistry, caches: &Caches, package: PackageInfo) -> CoreStep {
    let manifest = package.manifest_path();
    let step = handle_watch_request(registry, &manifest, &manifest);
    caches.packages.insert(manifest, package);
    step
}

/// Invalidate one logical file.
///
/// Order matters: cache entries are evicted before the id becomes dirty,
/// and the timer is re-armed last. Entries are evicted under the logical id
/// and under every physical path behind it, since an aliased file is cached
/// under its real path.
pub fn invalidate(
    registry: &mut WatchRegistry,
    debouncer: &mut Debouncer,
    gate: &BuildGate,
    caches: &Caches,
    id: &str,
) -> CoreStep {
    caches.evict(id);
    for path in registry.paths_of(id) {
        if path != id {
            caches.evict(path);
        }
    }
    let newly_dirty = debouncer.mark_dirty(id);

    if !gate.is_building() {
        // Rediscovered and re-watched by the next build pass.
        registry.unwatch(id);
    }

    debug!(id, newly_dirty, building = gate.is_building(), "invalidated");
    CoreStep::running(vec![debouncer.arm()])
}

/// A physical target changed: invalidate the logical file it backs.
pub fn handle_target_changed(
    registry: &mut WatchRegistry,
    debouncer: &mut Debouncer,
    gate: &BuildGate,
    caches: &Caches,
    target: TargetId,
) -> CoreStep {
    let Some(owner) = registry.owner_of(target) else {
        debug!(%target, "change from a closed target ignored");
        return CoreStep::idle();
    };
    let logical = owner.logical.clone();
    invalidate(registry, debouncer, gate, caches, &logical)
}

/// Forward a watch-primitive error verbatim. The target is left as-is.
pub fn handle_target_failed(registry: &WatchRegistry, target: TargetId, message: String) -> CoreStep {
    let Some(owner) = registry.owner_of(target) else {
        debug!(%target, "error from a closed target ignored");
        return CoreStep::idle();
    };
    warn!(path = %owner.path, logical = %owner.logical, %message, "watch error");
    CoreStep::running(vec![CoreCommand::Publish(Notification::WatchError {
        path: owner.path.clone(),
        message,
    })])
}

pub fn handle_timer_fired(debouncer: &mut Debouncer, gate: &BuildGate, generation: u64) -> CoreStep {
    match debouncer.fire(generation, gate.is_building()) {
        Some(command) => {
            if let CoreCommand::Publish(Notification::Update(ids)) = &command {
                info!(?ids, "delivering update");
            }
            CoreStep::running(vec![command])
        }
        None => CoreStep::idle(),
    }
}

/// Report a finished output stream: `Time`, `Bytes`, then a summary line.
pub fn handle_output_measured(bytes: usize, elapsed: Duration) -> CoreStep {
    let log = format!("{bytes} bytes written ({:.2} seconds)", elapsed.as_secs_f64());
    CoreStep::running(vec![
        CoreCommand::Publish(Notification::Time(elapsed)),
        CoreCommand::Publish(Notification::Bytes(bytes)),
        CoreCommand::Publish(Notification::Log(log)),
    ])
}

pub fn handle_build_started(gate: &mut BuildGate) -> CoreStep {
    gate.start();
    CoreStep::idle()
}

pub fn handle_build_finished(
    debouncer: &mut Debouncer,
    gate: &mut BuildGate,
    outcome: BuildOutcome,
) -> CoreStep {
    gate.finish(outcome);
    CoreStep::running(debouncer.release().into_iter().collect())
}

/// Close every watcher and cancel the pending timer.
pub fn handle_shutdown(registry: &mut WatchRegistry, debouncer: &mut Debouncer) -> CoreStep {
    let closed = registry.close_all();
    info!(closed, "closed all watchers");
    CoreStep::stopped(debouncer.cancel().into_iter().collect())
}

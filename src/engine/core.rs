// src/engine/core.rs

//! Pure core orchestrator state machine.
//!
//! This module contains a synchronous, deterministic core that consumes
//! [`RuntimeEvent`]s and produces:
//! - an updated core state (watchers, dirty set, gate)
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the channel, one at a time
//! - running and aborting the debounce timer task
//! - publishing notifications to the subscriber
//!
//! Because every mutation happens inside `step`, and the shell feeds events
//! strictly one after another, cancel+rearm of the timer and the gate check
//! at fire time can never interleave with another event.

use crate::cache::Caches;
use crate::engine::debounce::{DebounceState, Debouncer};
use crate::engine::event_handlers::{
    handle_build_finished, handle_build_started, handle_output_measured, handle_package,
    handle_shutdown,
    handle_target_changed, handle_target_failed, handle_timer_fired, handle_watch_request,
    invalidate, CoreStep,
};
use crate::engine::gate::BuildGate;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::types::{LogicalId, WatchOptions};
use crate::watch::{EventSender, IgnoreFilter, WatchBackend, WatchRegistry};

#[derive(Debug)]
pub struct CoreOrchestrator {
    registry: WatchRegistry,
    debouncer: Debouncer,
    gate: BuildGate,
    caches: Caches,
    closed: bool,
}

impl CoreOrchestrator {
    /// Build a core. Fails fast on malformed ignore patterns.
    ///
    /// `events` is the sender every watcher reports through; it must feed
    /// the same loop that calls [`CoreOrchestrator::step`].
    pub fn new(
        options: &WatchOptions,
        backend: Box<dyn WatchBackend>,
        caches: Caches,
        events: EventSender,
    ) -> Result<Self> {
        let ignore = IgnoreFilter::new(&options.ignore)?;
        Ok(Self {
            registry: WatchRegistry::new(backend, ignore, events),
            debouncer: Debouncer::new(options.delay),
            gate: BuildGate::new(),
            caches,
            closed: false,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_building(&self) -> bool {
        self.gate.is_building()
    }

    pub fn debounce_state(&self) -> DebounceState {
        self.debouncer.state()
    }

    /// Ids invalidated since the last delivered update, sorted.
    pub fn dirty(&self) -> Vec<LogicalId> {
        self.debouncer.dirty().cloned().collect()
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    ///
    /// Once closed, every event is a no-op.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        if self.closed {
            return CoreStep::stopped(Vec::new());
        }

        match event {
            RuntimeEvent::FileDiscovered { path } => {
                handle_watch_request(&mut self.registry, &path, &path)
            }
            RuntimeEvent::FileExposed { path, alias } => {
                handle_watch_request(&mut self.registry, &alias, &path)
            }
            RuntimeEvent::PackageDiscovered { package } => {
                handle_package(&mut self.registry, &self.caches, package)
            }
            RuntimeEvent::TransformDependency { owner, dep } => {
                handle_watch_request(&mut self.registry, &owner, &dep)
            }
            RuntimeEvent::BuildStarted => handle_build_started(&mut self.gate),
            RuntimeEvent::BuildFinished { outcome } => {
                handle_build_finished(&mut self.debouncer, &mut self.gate, outcome)
            }
            RuntimeEvent::TargetChanged { target } => handle_target_changed(
                &mut self.registry,
                &mut self.debouncer,
                &self.gate,
                &self.caches,
                target,
            ),
            RuntimeEvent::TargetFailed { target, message } => {
                handle_target_failed(&self.registry, target, message)
            }
            RuntimeEvent::OutputMeasured { bytes, elapsed } => {
                handle_output_measured(bytes, elapsed)
            }
            RuntimeEvent::TimerFired { generation } => {
                handle_timer_fired(&mut self.debouncer, &self.gate, generation)
            }
            RuntimeEvent::ShutdownRequested { .. } => self.close(),
        }
    }

    /// Invalidate `id` directly, as if one of its watchers fired.
    pub fn invalidate(&mut self, id: &str) -> CoreStep {
        if self.closed {
            return CoreStep::stopped(Vec::new());
        }
        invalidate(
            &mut self.registry,
            &mut self.debouncer,
            &self.gate,
            &self.caches,
            id,
        )
    }

    /// Close every watcher and cancel the pending timer. Idempotent.
    pub fn close(&mut self) -> CoreStep {
        if self.closed {
            return CoreStep::stopped(Vec::new());
        }
        self.closed = true;
        handle_shutdown(&mut self.registry, &mut self.debouncer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::cache::{CacheEntry, PackageInfo};
    use crate::engine::event_handlers::CoreCommand;
    use crate::engine::Notification;
    use crate::types::BuildOutcome;
    use crate::watch::mock::MockWatchBackend;
    use crate::watch::TargetId;

    struct Fixture {
        core: CoreOrchestrator,
        mock: MockWatchBackend,
        caches: Caches,
        _rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    }

    fn fixture(options: WatchOptions) -> Fixture {
        let mock = MockWatchBackend::new();
        let caches = Caches::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let core = CoreOrchestrator::new(&options, Box::new(mock.clone()), caches.clone(), tx)
            .unwrap();
        Fixture {
            core,
            mock,
            caches,
            _rx: rx,
        }
    }

    fn discover(core: &mut CoreOrchestrator, path: &str) -> CoreStep {
        core.step(RuntimeEvent::FileDiscovered {
            path: path.to_string(),
        })
    }

    fn target(mock: &MockWatchBackend, path: &str) -> TargetId {
        mock.open_targets(path)[0]
    }

    fn changed(core: &mut CoreOrchestrator, target: TargetId) -> u64 {
        let step = core.step(RuntimeEvent::TargetChanged { target });
        match step.commands.as_slice() {
            [CoreCommand::ArmTimer { generation, .. }] => *generation,
            other => panic!("expected a single ArmTimer, got {other:?}"),
        }
    }

    fn fire(core: &mut CoreOrchestrator, generation: u64) -> CoreStep {
        core.step(RuntimeEvent::TimerFired { generation })
    }

    fn entry() -> CacheEntry {
        CacheEntry {
            source: "module.exports = 1".to_string(),
            deps: BTreeMap::new(),
        }
    }

    #[test]
    fn invalid_ignore_pattern_fails_construction() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let options = WatchOptions::default().with_ignore(["a/{b"]);
        let result = CoreOrchestrator::new(
            &options,
            Box::new(MockWatchBackend::new()),
            Caches::default(),
            tx,
        );
        assert!(result.is_err());
    }

    #[test]
    fn two_files_coalesce_into_one_update() {
        let mut f = fixture(WatchOptions::default());
        discover(&mut f.core, "/src/a.js");
        discover(&mut f.core, "/src/b.js");

        let first = changed(&mut f.core, target(&f.mock, "/src/b.js"));
        let second = changed(&mut f.core, target(&f.mock, "/src/a.js"));

        assert!(fire(&mut f.core, first).commands.is_empty());
        let step = fire(&mut f.core, second);
        assert_eq!(
            step.commands,
            vec![CoreCommand::Publish(Notification::Update(vec![
                "/src/a.js".to_string(),
                "/src/b.js".to_string(),
            ]))]
        );
        assert_eq!(f.core.debounce_state(), DebounceState::Idle);
        assert!(f.core.dirty().is_empty());
    }

    #[test]
    fn eviction_happens_with_invalidation() {
        let mut f = fixture(WatchOptions::default());
        f.caches.modules.insert("/src/a.js", entry());
        discover(&mut f.core, "/src/a.js");

        changed(&mut f.core, target(&f.mock, "/src/a.js"));
        assert!(!f.caches.modules.contains("/src/a.js"));
        assert_eq!(f.core.dirty(), vec!["/src/a.js"]);
    }

    #[test]
    fn idle_invalidation_tears_down_watchers() {
        let mut f = fixture(WatchOptions::default());
        discover(&mut f.core, "/src/a.js");
        f.core.step(RuntimeEvent::TransformDependency {
            owner: "/src/a.js".to_string(),
            dep: "/src/lines.txt".to_string(),
        });
        assert_eq!(f.mock.open_count(), 2);

        changed(&mut f.core, target(&f.mock, "/src/lines.txt"));
        assert_eq!(f.mock.open_count(), 0);
        assert_eq!(f.core.registry().logical_count(), 0);

        // Next build pass rediscovers it.
        discover(&mut f.core, "/src/a.js");
        assert_eq!(f.mock.watch_count("/src/a.js"), 2);
    }

    #[test]
    fn invalidation_during_build_keeps_watchers_and_defers_delivery() {
        let mut f = fixture(WatchOptions::default());
        discover(&mut f.core, "/src/a.js");
        f.core.step(RuntimeEvent::BuildStarted);

        let generation = changed(&mut f.core, target(&f.mock, "/src/a.js"));
        assert!(f.mock.is_open("/src/a.js"));

        assert!(fire(&mut f.core, generation).commands.is_empty());
        assert_eq!(f.core.debounce_state(), DebounceState::Deferred);

        let step = f.core.step(RuntimeEvent::BuildFinished {
            outcome: BuildOutcome::Failed,
        });
        let rearmed = match step.commands.as_slice() {
            [CoreCommand::ArmTimer { generation, delay }] => {
                assert_eq!(*delay, Duration::from_millis(100));
                *generation
            }
            other => panic!("expected re-arm, got {other:?}"),
        };
        assert_eq!(
            fire(&mut f.core, rearmed).commands,
            vec![CoreCommand::Publish(Notification::Update(vec![
                "/src/a.js".to_string()
            ]))]
        );
    }

    #[test]
    fn multi_target_file_appears_once() {
        let mut f = fixture(WatchOptions::default());
        discover(&mut f.core, "/src/main.js");
        f.core.step(RuntimeEvent::TransformDependency {
            owner: "/src/main.js".to_string(),
            dep: "/src/lines.txt".to_string(),
        });
        f.core.step(RuntimeEvent::BuildStarted);

        changed(&mut f.core, target(&f.mock, "/src/main.js"));
        let generation = changed(&mut f.core, target(&f.mock, "/src/lines.txt"));
        f.core.step(RuntimeEvent::BuildFinished {
            outcome: BuildOutcome::Success,
        });

        assert_eq!(
            fire(&mut f.core, generation).commands,
            vec![CoreCommand::Publish(Notification::Update(vec![
                "/src/main.js".to_string()
            ]))]
        );
    }

    #[test]
    fn ignored_files_are_never_watched() {
        let mut f = fixture(WatchOptions::default());
        discover(&mut f.core, "/w/node_modules/robot/index.js");
        f.core.step(RuntimeEvent::TransformDependency {
            owner: "/w/main.js".to_string(),
            dep: "/w/node_modules/robot/data.txt".to_string(),
        });
        assert!(f.mock.watch_calls().is_empty());
    }

    #[test]
    fn package_manifest_is_watched_and_cached() {
        let mut f = fixture(WatchOptions::default());
        let package = PackageInfo::new("/w/lib");
        let manifest = package.manifest_path();
        f.core.step(RuntimeEvent::PackageDiscovered { package });

        assert!(f.mock.is_open(&manifest));
        assert!(f.caches.packages.contains(&manifest));

        changed(&mut f.core, target(&f.mock, &manifest));
        assert!(!f.caches.packages.contains(&manifest));
    }

    #[test]
    fn watch_failures_and_errors_are_forwarded() {
        let mut f = fixture(WatchOptions::default());
        f.mock.fail_on("/gone.js");
        let step = discover(&mut f.core, "/gone.js");
        match step.commands.as_slice() {
            [CoreCommand::Publish(Notification::WatchError { path, message })] => {
                assert_eq!(path, "/gone.js");
                assert!(message.contains("mock watch failure"));
            }
            other => panic!("expected WatchError, got {other:?}"),
        }

        discover(&mut f.core, "/a.js");
        let step = f.core.step(RuntimeEvent::TargetFailed {
            target: target(&f.mock, "/a.js"),
            message: "permission denied".to_string(),
        });
        assert_eq!(
            step.commands,
            vec![CoreCommand::Publish(Notification::WatchError {
                path: "/a.js".to_string(),
                message: "permission denied".to_string(),
            })]
        );
        assert!(f.mock.is_open("/a.js"));
    }

    #[test]
    fn close_cancels_timer_and_silences_everything() {
        let mut f = fixture(WatchOptions::default());
        f.caches.modules.insert("/a.js", entry());
        discover(&mut f.core, "/a.js");
        discover(&mut f.core, "/b.js");
        let a = target(&f.mock, "/a.js");
        let generation = changed(&mut f.core, target(&f.mock, "/b.js"));

        assert!(!f.core.is_closed());
        let step = f.core.close();
        assert!(f.core.is_closed());
        assert!(!step.keep_running);
        assert_eq!(step.commands, vec![CoreCommand::CancelTimer]);
        assert_eq!(f.mock.open_count(), 0);

        // A late callback and the stale timer do nothing.
        assert!(f.core.step(RuntimeEvent::TargetChanged { target: a }).commands.is_empty());
        assert!(fire(&mut f.core, generation).commands.is_empty());
        assert!(f.caches.modules.contains("/a.js"));
        assert!(f.core.close().commands.is_empty());
    }

    #[test]
    fn file_discovered_by_path_evicts_its_entry() {
        let mut f = fixture(WatchOptions::default());
        f.caches.modules.insert("/w/lib/abc.js", entry());
        discover(&mut f.core, "/w/lib/abc.js");

        changed(&mut f.core, target(&f.mock, "/w/lib/abc.js"));
        assert!(f.caches.modules.is_empty());
        assert_eq!(f.core.dirty(), vec!["/w/lib/abc.js"]);
    }

    #[test]
    fn exposed_file_is_reported_by_alias_and_evicted_by_path() {
        let mut f = fixture(WatchOptions::default());
        f.caches.modules.insert("/w/lib/abc.js", entry());
        f.core.step(RuntimeEvent::FileExposed {
            path: "/w/lib/abc.js".to_string(),
            alias: "abc".to_string(),
        });
        assert_eq!(f.core.registry().paths_of("abc"), vec!["/w/lib/abc.js"]);

        let generation = changed(&mut f.core, target(&f.mock, "/w/lib/abc.js"));
        assert!(f.caches.modules.is_empty());
        assert_eq!(
            fire(&mut f.core, generation).commands,
            vec![CoreCommand::Publish(Notification::Update(vec!["abc".to_string()]))]
        );
    }

    #[test]
    fn output_measurement_is_published_in_order() {
        let mut f = fixture(WatchOptions::default());
        let step = f.core.step(RuntimeEvent::OutputMeasured {
            bytes: 11,
            elapsed: Duration::from_millis(1500),
        });
        assert_eq!(
            step.commands,
            vec![
                CoreCommand::Publish(Notification::Time(Duration::from_millis(1500))),
                CoreCommand::Publish(Notification::Bytes(11)),
                CoreCommand::Publish(Notification::Log(
                    "11 bytes written (1.50 seconds)".to_string()
                )),
            ]
        );

        f.core.close();
        let step = f.core.step(RuntimeEvent::OutputMeasured {
            bytes: 11,
            elapsed: Duration::from_millis(1500),
        });
        assert!(step.commands.is_empty());
    }

    #[test]
    fn zero_delay_delivers_each_edit_separately() {
        let mut f = fixture(WatchOptions::default().with_delay(Duration::ZERO));
        for _ in 0..3 {
            discover(&mut f.core, "/time.js");
            let generation = changed(&mut f.core, target(&f.mock, "/time.js"));
            assert_eq!(
                fire(&mut f.core, generation).commands,
                vec![CoreCommand::Publish(Notification::Update(vec![
                    "/time.js".to_string()
                ]))]
            );
        }
    }
}

// src/engine/debounce.rs

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::debug;

use crate::engine::Notification;
use crate::engine::event_handlers::CoreCommand;
use crate::types::LogicalId;

/// Where the debouncer is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// No timer armed, nothing waiting to be delivered.
    Idle,
    /// A timer is armed; the dirty set is non-empty.
    Pending,
    /// The timer fired during a build; it is re-armed when the build ends.
    Deferred,
}

/// Quiet-period coalescing of invalidations into one update.
///
/// There is at most one pending timer, identified by its generation.
/// Arming bumps the generation, so a fire from an older timer is stale and
/// ignored. The dirty set only grows until it is delivered.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    dirty: BTreeSet<LogicalId>,
    pending: Option<u64>,
    generation: u64,
    deferred: bool,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            dirty: BTreeSet::new(),
            pending: None,
            generation: 0,
            deferred: false,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> DebounceState {
        if self.pending.is_some() {
            DebounceState::Pending
        } else if self.deferred {
            DebounceState::Deferred
        } else {
            DebounceState::Idle
        }
    }

    pub fn dirty(&self) -> impl Iterator<Item = &LogicalId> {
        self.dirty.iter()
    }

    /// Record `id` as changed. Returns false if it was already dirty.
    pub fn mark_dirty(&mut self, id: &str) -> bool {
        self.dirty.insert(id.to_string())
    }

    /// Replace any pending timer with a fresh one.
    pub fn arm(&mut self) -> CoreCommand {
        self.generation += 1;
        self.pending = Some(self.generation);
        CoreCommand::ArmTimer {
            generation: self.generation,
            delay: self.delay,
        }
    }

    /// The timer armed with `generation` elapsed.
    ///
    /// Returns the update to publish, or `None` if the fire is stale, a
    /// build is running (the debouncer defers), or nothing is dirty.
    pub fn fire(&mut self, generation: u64, building: bool) -> Option<CoreCommand> {
        if self.pending != Some(generation) {
            debug!(generation, pending = ?self.pending, "stale timer fire ignored");
            return None;
        }
        self.pending = None;

        if building {
            debug!(dirty = self.dirty.len(), "build in flight; deferring update");
            self.deferred = true;
            return None;
        }

        self.deferred = false;
        if self.dirty.is_empty() {
            return None;
        }
        let ids: Vec<LogicalId> = std::mem::take(&mut self.dirty).into_iter().collect();
        Some(CoreCommand::Publish(Notification::Update(ids)))
    }

    /// A build ended. Re-arm if a delivery was deferred behind it.
    pub fn release(&mut self) -> Option<CoreCommand> {
        if !self.deferred {
            return None;
        }
        self.deferred = false;
        Some(self.arm())
    }

    /// Drop the pending timer, if any.
    pub fn cancel(&mut self) -> Option<CoreCommand> {
        self.deferred = false;
        self.pending.take().map(|_| CoreCommand::CancelTimer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed_generation(cmd: CoreCommand) -> u64 {
        match cmd {
            CoreCommand::ArmTimer { generation, .. } => generation,
            other => panic!("expected ArmTimer, got {other:?}"),
        }
    }

    fn update(cmd: Option<CoreCommand>) -> Vec<LogicalId> {
        match cmd {
            Some(CoreCommand::Publish(Notification::Update(ids))) => ids,
            other => panic!("expected an update, got {other:?}"),
        }
    }

    #[test]
    fn coalesces_until_the_latest_timer_fires() {
        let mut d = Debouncer::new(Duration::from_millis(100));
        assert_eq!(d.state(), DebounceState::Idle);

        d.mark_dirty("b");
        let first = armed_generation(d.arm());
        d.mark_dirty("a");
        let second = armed_generation(d.arm());
        assert_eq!(d.state(), DebounceState::Pending);

        assert!(d.fire(first, false).is_none());
        assert_eq!(update(d.fire(second, false)), vec!["a", "b"]);
        assert_eq!(d.state(), DebounceState::Idle);
        assert_eq!(d.dirty().count(), 0);
    }

    #[test]
    fn duplicate_ids_collapse() {
        let mut d = Debouncer::new(Duration::ZERO);
        assert!(d.mark_dirty("a"));
        assert!(!d.mark_dirty("a"));
        let generation = armed_generation(d.arm());
        assert_eq!(update(d.fire(generation, false)), vec!["a"]);
    }

    #[test]
    fn defers_while_building_and_rearms_on_release() {
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.mark_dirty("a");
        let generation = armed_generation(d.arm());

        assert!(d.fire(generation, true).is_none());
        assert_eq!(d.state(), DebounceState::Deferred);
        assert_eq!(d.dirty().count(), 1);

        let rearmed = armed_generation(d.release().expect("re-arm after build"));
        assert_eq!(d.state(), DebounceState::Pending);
        assert_eq!(update(d.fire(rearmed, false)), vec!["a"]);
    }

    #[test]
    fn release_without_deferral_is_a_no_op() {
        let mut d = Debouncer::new(Duration::from_millis(100));
        assert!(d.release().is_none());
        d.mark_dirty("a");
        d.arm();
        assert!(d.release().is_none());
        assert_eq!(d.state(), DebounceState::Pending);
    }

    #[test]
    fn cancel_makes_the_pending_fire_stale() {
        let mut d = Debouncer::new(Duration::from_millis(100));
        d.mark_dirty("a");
        let generation = armed_generation(d.arm());
        assert!(matches!(d.cancel(), Some(CoreCommand::CancelTimer)));
        assert!(d.cancel().is_none());
        assert!(d.fire(generation, false).is_none());
    }
}

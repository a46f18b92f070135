// src/watch/registry.rs

//! Per-logical-file bookkeeping of physical watchers.
//!
//! A logical file may be backed by several physical paths: its own path
//! plus any real files a transform declared as dependencies. Each
//! `(logical, physical)` pair gets at most one watcher, and a change on any
//! of them is reported under the logical id.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use tracing::debug;

use crate::types::LogicalId;
use crate::watch::backend::{EventSender, TargetId, TargetSink, WatchBackend, WatcherHandle};
use crate::watch::ignore::IgnoreFilter;

/// A physical path being observed on behalf of one logical file.
pub struct WatchTarget {
    id: TargetId,
    path: String,
    handle: Box<dyn WatcherHandle>,
}

impl WatchTarget {
    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn close(&mut self) {
        self.handle.close();
    }
}

impl fmt::Debug for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchTarget")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Result of a `watch_file` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The physical path matched an ignore pattern.
    Ignored,
    /// A watcher for this pair already exists.
    AlreadyWatched,
    Watching(TargetId),
}

/// Who a target belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOwner {
    pub logical: LogicalId,
    pub path: String,
}

pub struct WatchRegistry {
    backend: Box<dyn WatchBackend>,
    ignore: IgnoreFilter,
    events: EventSender,
    targets: HashMap<LogicalId, Vec<WatchTarget>>,
    owners: HashMap<TargetId, TargetOwner>,
    next_target: u64,
}

impl fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("ignore", &self.ignore)
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

impl WatchRegistry {
    pub fn new(backend: Box<dyn WatchBackend>, ignore: IgnoreFilter, events: EventSender) -> Self {
        Self {
            backend,
            ignore,
            events,
            targets: HashMap::new(),
            owners: HashMap::new(),
            next_target: 1,
        }
    }

    /// Watch `physical` on behalf of `logical`.
    ///
    /// Ignored paths and already-watched pairs are no-ops. An error means the
    /// watch primitive refused the path; nothing is recorded in that case.
    pub fn watch_file(&mut self, logical: &str, physical: &str) -> Result<WatchOutcome> {
        if self.ignore.should_ignore(physical) {
            debug!(logical, physical, "path ignored; not watching");
            return Ok(WatchOutcome::Ignored);
        }
        if self.is_watching(logical, physical) {
            return Ok(WatchOutcome::AlreadyWatched);
        }

        let id = TargetId(self.next_target);
        self.next_target += 1;

        let sink = TargetSink::new(id, self.events.clone());
        let handle = self.backend.watch(Path::new(physical), sink)?;

        self.targets
            .entry(logical.to_string())
            .or_default()
            .push(WatchTarget {
                id,
                path: physical.to_string(),
                handle,
            });
        self.owners.insert(
            id,
            TargetOwner {
                logical: logical.to_string(),
                path: physical.to_string(),
            },
        );

        debug!(logical, physical, target = %id, "watch target armed");
        Ok(WatchOutcome::Watching(id))
    }

    pub fn is_watching(&self, logical: &str, physical: &str) -> bool {
        self.targets
            .get(logical)
            .is_some_and(|ts| ts.iter().any(|t| t.path == physical))
    }

    /// Resolve a live target. Torn-down targets resolve to `None`.
    pub fn owner_of(&self, target: TargetId) -> Option<&TargetOwner> {
        self.owners.get(&target)
    }

    /// Close and forget every target of `logical`. Returns how many closed.
    pub fn unwatch(&mut self, logical: &str) -> usize {
        let Some(mut targets) = self.targets.remove(logical) else {
            return 0;
        };
        for target in targets.iter_mut() {
            target.close();
            self.owners.remove(&target.id);
        }
        debug!(logical, closed = targets.len(), "watch targets torn down");
        targets.len()
    }

    /// Close every target of every logical file.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for (_, mut targets) in self.targets.drain() {
            for target in targets.iter_mut() {
                target.close();
                closed += 1;
            }
        }
        self.owners.clear();
        closed
    }

    /// Number of logical files with at least one target.
    pub fn logical_count(&self) -> usize {
        self.targets.len()
    }

    pub fn target_count(&self) -> usize {
        self.owners.len()
    }

    /// Physical paths backing `logical`, in registration order.
    pub fn paths_of(&self, logical: &str) -> Vec<&str> {
        self.targets
            .get(logical)
            .map(|ts| ts.iter().map(|t| t.path()).collect())
            .unwrap_or_default()
    }
}

// src/pipeline/collect.rs

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::{CacheEntry, ModuleCache};

/// One file visited by the builder's dependency walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepRow {
    /// Resolved path on disk.
    pub file: String,
    /// Alias the file is exposed under, if any. Informational only; the
    /// cache is keyed by `file`.
    pub expose: Option<String>,
    pub source: String,
    pub deps: BTreeMap<String, String>,
}

impl DepRow {
    pub fn new(file: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            expose: None,
            source: source.into(),
            deps: BTreeMap::new(),
        }
    }

    pub fn exposed_as(mut self, alias: impl Into<String>) -> Self {
        self.expose = Some(alias.into());
        self
    }

    pub fn with_dep(mut self, specifier: impl Into<String>, resolved: impl Into<String>) -> Self {
        self.deps.insert(specifier.into(), resolved.into());
        self
    }

    /// Key the row is cached under: the file behind any alias, which is
    /// also the path its watcher reports.
    pub fn cache_key(&self) -> &str {
        &self.file
    }
}

/// Pass-through stage that refreshes the module cache for every row the
/// dependency walk produces.
///
/// A fresh collector is attached on every build, including the first, so
/// the cache is warm before any update can matter.
#[derive(Debug, Clone)]
pub struct CacheCollector {
    modules: ModuleCache,
}

impl CacheCollector {
    pub fn new(modules: ModuleCache) -> Self {
        Self { modules }
    }

    /// Cache `row` and hand it back unchanged.
    pub fn observe(&self, row: DepRow) -> DepRow {
        debug!(key = %row.cache_key(), deps = row.deps.len(), "caching module");
        self.modules.insert(
            row.cache_key(),
            CacheEntry {
                source: row.source.clone(),
                deps: row.deps.clone(),
            },
        );
        row
    }

    /// Install the collector between `upstream` and the returned receiver.
    ///
    /// The stage ends when `upstream` closes or the downstream receiver is
    /// dropped.
    pub fn attach(self, mut upstream: mpsc::Receiver<DepRow>) -> mpsc::Receiver<DepRow> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(row) = upstream.recv().await {
                if tx.send(self.observe(row)).await.is_err() {
                    break;
                }
            }
        });
        rx
    }
}

// src/cache.rs

//! Cache stores shared between the builder and the orchestrator.
//!
//! The builder (through [`crate::pipeline::CacheCollector`]) fills these so
//! unchanged files are not re-read or re-parsed on the next build. The
//! orchestrator only ever removes entries: the instant a file is
//! invalidated its entry is evicted, so a build either sees the old value
//! or a genuine miss.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::types::LogicalId;

/// Cached result of reading and parsing one logical file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub source: String,
    /// Import specifier -> resolved file, exactly as the builder reported it.
    pub deps: BTreeMap<String, String>,
}

/// A package manifest the builder discovered while resolving modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Directory holding `package.json`.
    pub dir: PathBuf,
    pub name: Option<String>,
    pub version: Option<String>,
}

impl PackageInfo {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            name: None,
            version: None,
        }
    }

    /// Path of the manifest file; this is the id the package is watched
    /// and cached under.
    pub fn manifest_path(&self) -> String {
        self.dir.join("package.json").to_string_lossy().into_owned()
    }
}

/// Cloneable handle over a string-keyed map shared across tasks.
pub struct SharedCache<V> {
    entries: Arc<Mutex<HashMap<LogicalId, V>>>,
}

impl<V> Clone for SharedCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V> Default for SharedCache<V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V> fmt::Debug for SharedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCache")
            .field("len", &self.len())
            .finish()
    }
}

impl<V> SharedCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    // Every operation is a single map call, so a poisoned map is still
    // consistent.
    fn guard(&self) -> MutexGuard<'_, HashMap<LogicalId, V>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, id: impl Into<LogicalId>, value: V) {
        self.guard().insert(id.into(), value);
    }

    /// Remove `id`; returns true if an entry was present.
    pub fn remove(&self, id: &str) -> bool {
        self.guard().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.guard().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Sorted snapshot of the keys.
    pub fn keys(&self) -> Vec<LogicalId> {
        let mut keys: Vec<LogicalId> = self.guard().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl<V: Clone> SharedCache<V> {
    pub fn get(&self, id: &str) -> Option<V> {
        self.guard().get(id).cloned()
    }
}

pub type ModuleCache = SharedCache<CacheEntry>;
pub type PackageCache = SharedCache<PackageInfo>;

/// The two caches an orchestrator evicts from.
#[derive(Debug, Clone, Default)]
pub struct Caches {
    pub modules: ModuleCache,
    pub packages: PackageCache,
}

impl Caches {
    /// Drop `id` from both caches. Returns true if either held it.
    pub fn evict(&self, id: &str) -> bool {
        let module = self.modules.remove(id);
        let package = self.packages.remove(id);
        if module || package {
            debug!(id, module, package, "evicted cache entry");
        }
        module || package
    }
}

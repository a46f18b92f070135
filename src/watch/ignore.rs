// src/watch/ignore.rs

use std::collections::HashMap;
use std::fmt;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::errors::{DepwatchError, Result};

/// Memoized "should this path ever be watched?" decision.
///
/// The memo is keyed by the literal path string, so callers must pass a
/// consistent representation (`./a.js` and `a.js` are different keys).
pub struct IgnoreFilter {
    patterns: Vec<String>,
    matcher: GlobSet,
    memo: HashMap<String, bool>,
}

impl fmt::Debug for IgnoreFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreFilter")
            .field("patterns", &self.patterns)
            .field("memoized", &self.memo.len())
            .finish_non_exhaustive()
    }
}

impl IgnoreFilter {
    /// Compile the given glob patterns. An empty list ignores nothing.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        let matcher = build_globset(&patterns)?;
        Ok(Self {
            patterns,
            matcher,
            memo: HashMap::new(),
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn should_ignore(&mut self, path: &str) -> bool {
        if let Some(&ignored) = self.memo.get(path) {
            return ignored;
        }
        let ignored = self.matcher.is_match(path);
        self.memo.insert(path.to_string(), ignored);
        ignored
    }

    /// Number of distinct paths decided so far.
    pub fn memoized(&self) -> usize {
        self.memo.len()
    }
}

/// Build a GlobSet from simple string patterns.
///
/// `*` and `?` never cross a `/`; only `**` spans directories.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .map_err(|source| DepwatchError::InvalidPattern {
                pattern: pat.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| DepwatchError::ConfigError(format!("building ignore globset: {e}")))
}

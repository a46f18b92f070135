// src/config/model.rs

use serde::Deserialize;

use crate::types::WatchOptions;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// delay = 100
/// ignore = ["**/node_modules/**", "**/*.gen.js"]
/// poll = 250
///
/// [build]
/// cmd = "make bundle"
/// entries = ["src/main.js"]
/// ```
///
/// `[watch]` is optional and every key in it has a default.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    pub build: BuildSection,
}

/// `[watch]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchSection {
    /// Quiet period in milliseconds. Signed so a negative value can be
    /// reported instead of failing deserialization with a type error.
    #[serde(default)]
    pub delay: Option<i64>,

    /// One glob or a list of globs.
    #[serde(default)]
    pub ignore: Option<IgnoreSetting>,

    /// `false`, `true`, or a polling interval in milliseconds.
    #[serde(default)]
    pub poll: Option<PollSetting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IgnoreSetting {
    One(String),
    Many(Vec<String>),
}

impl IgnoreSetting {
    pub fn patterns(&self) -> Vec<String> {
        match self {
            IgnoreSetting::One(p) => vec![p.clone()],
            IgnoreSetting::Many(ps) => ps.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PollSetting {
    Enabled(bool),
    IntervalMs(i64),
}

/// `[build]` section: what the host binary runs on every update.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildSection {
    /// Shell command that produces the bundle.
    pub cmd: String,

    /// Entry files, relative to the config file's directory.
    #[serde(default)]
    pub entries: Vec<String>,
}

/// Validated configuration. Construct with `ConfigFile::try_from`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    watch: WatchOptions,
    build: BuildSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(watch: WatchOptions, build: BuildSection) -> Self {
        Self { watch, build }
    }

    pub fn watch_options(&self) -> &WatchOptions {
        &self.watch
    }

    pub fn build(&self) -> &BuildSection {
        &self.build
    }
}

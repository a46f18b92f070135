use std::time::Duration;

/// Identity of a logical file: its resolved path, or the alias it is
/// exposed under.
pub type LogicalId = String;

/// Quiet period used when no `delay` is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Polling interval used by `PollMode::On`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ignore glob used when no `ignore` patterns are configured.
pub const DEFAULT_IGNORE_PATTERN: &str = "**/node_modules/**";

/// How the low-level watch primitive observes a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollMode {
    /// Native OS notifications (inotify / FSEvents / ReadDirectoryChanges).
    #[default]
    Off,
    /// Stat polling at [`DEFAULT_POLL_INTERVAL`].
    On,
    /// Stat polling at an explicit interval.
    Interval(Duration),
}

impl PollMode {
    /// The polling interval, or `None` for native notifications.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            PollMode::Off => None,
            PollMode::On => Some(DEFAULT_POLL_INTERVAL),
            PollMode::Interval(d) => Some(*d),
        }
    }
}

/// Orchestrator settings, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Quiet period between the last invalidation and the update.
    pub delay: Duration,
    /// Glob patterns; a matching path is never watched.
    pub ignore: Vec<String>,
    pub poll: PollMode,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            ignore: vec![DEFAULT_IGNORE_PATTERN.to_string()],
            poll: PollMode::default(),
        }
    }
}

impl WatchOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_ignore<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_poll(mut self, poll: PollMode) -> Self {
        self.poll = poll;
        self
    }
}

/// How a build ended. The gate releases on both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Success,
    Failed,
}

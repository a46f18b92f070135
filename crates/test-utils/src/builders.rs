#![allow(dead_code)]

use std::time::Duration;

use depwatch::config::{BuildSection, ConfigFile, IgnoreSetting, PollSetting, RawConfigFile, WatchSection};
use depwatch::engine::NotificationReceiver;
use depwatch::types::LogicalId;
use depwatch::watch::mock::MockWatchBackend;
use depwatch::{Caches, Notification, Orchestrator, WatchOptions};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            config: RawConfigFile {
                watch: WatchSection::default(),
                build: BuildSection {
                    cmd: cmd.to_string(),
                    entries: Vec::new(),
                },
            },
        }
    }

    pub fn entry(mut self, path: &str) -> Self {
        self.config.build.entries.push(path.to_string());
        self
    }

    pub fn delay_ms(mut self, ms: i64) -> Self {
        self.config.watch.delay = Some(ms);
        self
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        let mut patterns = self
            .config
            .watch
            .ignore
            .take()
            .map(|s| s.patterns())
            .unwrap_or_default();
        patterns.push(pattern.to_string());
        self.config.watch.ignore = Some(IgnoreSetting::Many(patterns));
        self
    }

    pub fn poll(mut self, setting: PollSetting) -> Self {
        self.config.watch.poll = Some(setting);
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// `WatchOptions` with the given delay and no ignore patterns.
pub fn options_with_delay(ms: u64) -> WatchOptions {
    WatchOptions::default()
        .with_delay(Duration::from_millis(ms))
        .with_ignore(Vec::<String>::new())
}

/// An orchestrator running on the in-memory watch backend.
///
/// Must be created inside a Tokio runtime.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub notifications: NotificationReceiver,
    pub backend: MockWatchBackend,
}

impl Harness {
    pub fn spawn(options: WatchOptions) -> Self {
        Self::with_caches(options, Caches::default())
    }

    pub fn with_caches(options: WatchOptions, caches: Caches) -> Self {
        let backend = MockWatchBackend::new();
        let (orchestrator, notifications) =
            Orchestrator::spawn(options, backend.clone(), caches).expect("spawn orchestrator");
        Self {
            orchestrator,
            notifications,
            backend,
        }
    }

    /// Let the orchestrator task drain whatever has been sent so far.
    ///
    /// Only yields; with a paused clock this does not advance time.
    pub async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Announce `path` and wait until its watcher is open.
    pub async fn discover(&self, path: &str) {
        self.orchestrator.file_discovered(path);
        self.settle().await;
    }

    /// Next notification, if one is already queued.
    pub fn try_next(&mut self) -> Option<Notification> {
        self.notifications.try_recv().ok()
    }

    /// Wait for the next `Update`, skipping other notifications.
    pub async fn next_update(&mut self) -> Option<Vec<LogicalId>> {
        while let Some(note) = self.notifications.recv().await {
            if let Notification::Update(ids) = note {
                return Some(ids);
            }
        }
        None
    }

    /// Close the orchestrator, handing back what the test still needs.
    pub async fn close(self) -> (NotificationReceiver, MockWatchBackend) {
        self.orchestrator.close().await;
        (self.notifications, self.backend)
    }
}

// tests/notify_backend.rs
//
// End-to-end against the real filesystem.

mod common;

use std::time::Duration;

use tokio::time::timeout;

use depwatch::watch::NotifyBackend;
use depwatch::{Caches, CacheEntry, Notification, Orchestrator, PollMode, WatchOptions};
use depwatch_test_utils::{init_tracing, with_timeout};

use common::{id_of, write_file};

fn options(poll: PollMode) -> WatchOptions {
    WatchOptions::default()
        .with_delay(Duration::from_millis(50))
        .with_poll(poll)
}

async fn edit_until_update(
    path: &std::path::Path,
    notifications: &mut depwatch::engine::NotificationReceiver,
) -> Vec<String> {
    // Keep touching the file: the first write can land before the watch is armed.
    with_timeout(async {
        let mut n = 0;
        loop {
            n += 1;
            std::fs::write(path, format!("module.exports = {n}")).unwrap();
            if let Ok(Some(Notification::Update(ids))) =
                timeout(Duration::from_millis(300), notifications.recv()).await
            {
                return ids;
            }
        }
    })
    .await
}

#[tokio::test]
async fn native_watcher_reports_an_edit() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "main.js", "module.exports = 0");
    let id = id_of(dir.path(), "main.js");

    let caches = Caches::default();
    caches.modules.insert(
        id.clone(),
        CacheEntry {
            source: "module.exports = 0".to_string(),
            deps: Default::default(),
        },
    );

    let (orch, mut notifications) =
        Orchestrator::spawn(options(PollMode::Off), NotifyBackend::default(), caches.clone())
            .unwrap();
    orch.file_discovered(id.clone());

    let ids = edit_until_update(&file, &mut notifications).await;
    assert_eq!(ids, vec![id.clone()]);
    assert!(!caches.modules.contains(&id));

    orch.close().await;
}

#[tokio::test]
async fn polling_watcher_reports_an_edit() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "lib/util.js", "module.exports = 0");
    let id = id_of(dir.path(), "lib/util.js");

    let interval = PollMode::Interval(Duration::from_millis(50));
    let (orch, mut notifications) =
        Orchestrator::spawn(options(interval), NotifyBackend::new(interval), Caches::default())
            .unwrap();
    orch.file_discovered(id.clone());

    let ids = edit_until_update(&file, &mut notifications).await;
    assert_eq!(ids, vec![id]);

    orch.close().await;
}

#[tokio::test]
async fn missing_file_is_a_watch_error_not_a_failure() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let id = id_of(dir.path(), "gone.js");

    let (orch, mut notifications) =
        Orchestrator::spawn(options(PollMode::Off), NotifyBackend::default(), Caches::default())
            .unwrap();
    orch.file_discovered(id.clone());

    let note = with_timeout(notifications.recv()).await;
    match note {
        Some(Notification::WatchError { path, .. }) => assert_eq!(path, id),
        other => panic!("expected WatchError, got {other:?}"),
    }

    orch.close().await;
}

#[tokio::test]
async fn node_modules_are_not_watched_by_default() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "node_modules/dep/index.js", "module.exports = 0");
    let id = id_of(dir.path(), "node_modules/dep/index.js");

    let (orch, mut notifications) =
        Orchestrator::spawn(options(PollMode::Off), NotifyBackend::default(), Caches::default())
            .unwrap();
    orch.file_discovered(id);
    tokio::time::sleep(Duration::from_millis(100)).await;

    std::fs::write(&file, "module.exports = 1").unwrap();
    let got = timeout(Duration::from_millis(400), notifications.recv()).await;
    assert!(got.is_err(), "unexpected notification: {got:?}");

    orch.close().await;
}

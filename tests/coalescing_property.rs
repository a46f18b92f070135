use std::collections::BTreeSet;

use proptest::prelude::*;
use tokio::sync::mpsc;

use depwatch::engine::{CoreCommand, CoreOrchestrator, Notification, RuntimeEvent};
use depwatch::watch::mock::MockWatchBackend;
use depwatch::{BuildOutcome, Caches};
use depwatch_test_utils::builders::options_with_delay;

fn path(i: usize) -> String {
    format!("/proj/src/file_{i}.js")
}

/// Feed every queued watcher event into the core, returning its commands.
fn drain(core: &mut CoreOrchestrator, rx: &mut mpsc::UnboundedReceiver<RuntimeEvent>) -> Vec<CoreCommand> {
    let mut commands = Vec::new();
    while let Ok(event) = rx.try_recv() {
        commands.extend(core.step(event).commands);
    }
    commands
}

fn armed(commands: &[CoreCommand]) -> Vec<u64> {
    commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::ArmTimer { generation, .. } => Some(*generation),
            _ => None,
        })
        .collect()
}

fn updates(commands: &[CoreCommand]) -> Vec<Vec<String>> {
    commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Publish(Notification::Update(ids)) => Some(ids.clone()),
            _ => None,
        })
        .collect()
}

proptest! {
    // However edits interleave, one quiet period yields exactly one update
    // naming each edited file once, in sorted order.
    #[test]
    fn one_update_per_quiet_period(
        (files, edits) in (1usize..8).prop_flat_map(|n| {
            (Just(n), proptest::collection::vec(0..n, 1..30))
        }),
        building in any::<bool>(),
    ) {
        let mock = MockWatchBackend::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut core = CoreOrchestrator::new(
            &options_with_delay(100),
            Box::new(mock.clone()),
            Caches::default(),
            tx,
        ).unwrap();

        for i in 0..files {
            core.step(RuntimeEvent::FileDiscovered { path: path(i) });
        }
        if building {
            core.step(RuntimeEvent::BuildStarted);
        }

        let mut generations = Vec::new();
        for &i in &edits {
            mock.emit_change(path(i));
            generations.extend(armed(&drain(&mut core, &mut rx)));
        }

        let mut delivered = Vec::new();
        for generation in generations.iter().copied() {
            let step = core.step(RuntimeEvent::TimerFired { generation });
            delivered.extend(updates(&step.commands));
        }
        if building {
            prop_assert!(delivered.is_empty());
            let step = core.step(RuntimeEvent::BuildFinished { outcome: BuildOutcome::Success });
            let rearmed = armed(&step.commands);
            prop_assert_eq!(rearmed.len(), 1);
            let step = core.step(RuntimeEvent::TimerFired { generation: rearmed[0] });
            delivered.extend(updates(&step.commands));
        }

        let expected: Vec<String> = edits
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(path)
            .collect();
        prop_assert_eq!(delivered, vec![expected]);
        prop_assert!(core.dirty().is_empty());
    }
}

// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::core::CoreOrchestrator;
use super::{CoreCommand, NotificationSender, RuntimeEvent};
use crate::watch::EventSender;

/// Drives the core orchestrator in response to `RuntimeEvent`s.
///
/// This is a pure IO shell around `CoreOrchestrator`, which contains all the
/// semantics. This struct handles async IO: reading events from the channel
/// one at a time, running the debounce timer as a Tokio task, and publishing
/// notifications.
pub struct Runtime {
    core: CoreOrchestrator,
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    /// Used by timer tasks to report back into the same loop.
    event_tx: EventSender,
    notifications: NotificationSender,
    timer: Option<JoinHandle<()>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("timer_armed", &self.timer.is_some())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        core: CoreOrchestrator,
        event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        event_tx: EventSender,
        notifications: NotificationSender,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx,
            notifications,
            timer: None,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core.
    /// - Executes the commands the core returns (timers, notifications).
    /// - Stops after a shutdown request, acknowledging it once every
    ///   watcher is closed and the timer is cancelled.
    pub async fn run(mut self) {
        info!("depwatch runtime started");

        while let Some(mut event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");

            let ack = match &mut event {
                RuntimeEvent::ShutdownRequested { ack } => ack.take(),
                _ => None,
            };

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command);
            }

            if let Some(ack) = ack {
                let _ = ack.send(());
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        self.cancel_timer();
        info!("runtime exiting");
    }

    fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::ArmTimer { generation, delay } => self.arm_timer(generation, delay),
            CoreCommand::CancelTimer => self.cancel_timer(),
            CoreCommand::Publish(notification) => {
                if self.notifications.send(notification).is_err() {
                    debug!("notification receiver dropped");
                }
            }
        }
    }

    fn arm_timer(&mut self, generation: u64, delay: Duration) {
        self.cancel_timer();
        let tx = self.event_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RuntimeEvent::TimerFired { generation });
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// src/pipeline/measure.rs

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::engine::RuntimeEvent;
use crate::watch::EventSender;

/// Pass-through stage on a build's output stream that reports how many
/// bytes were written and how long it took.
///
/// The clock starts when the meter is created; call [`OutputMeter::mark`]
/// when the builder's record phase ends to restart it. The measurement is
/// sent to the orchestrator's event loop, which publishes `Time`, `Bytes`
/// and `Log` unless it has been closed.
#[derive(Debug)]
pub struct OutputMeter {
    events: EventSender,
    started: Instant,
}

impl OutputMeter {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            started: Instant::now(),
        }
    }

    pub fn mark(&mut self) {
        self.started = Instant::now();
    }

    /// Install the meter between `upstream` and the returned receiver.
    pub fn attach(self, mut upstream: mpsc::Receiver<Vec<u8>>) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut bytes = 0usize;
            while let Some(chunk) = upstream.recv().await {
                bytes += chunk.len();
                // Keep counting even if nobody reads the output.
                let _ = tx.send(chunk).await;
            }
            let _ = self.events.send(RuntimeEvent::OutputMeasured {
                bytes,
                elapsed: self.started.elapsed(),
            });
        });
        rx
    }
}

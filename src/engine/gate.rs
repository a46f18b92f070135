// src/engine/gate.rs

use tracing::{debug, warn};

use crate::types::BuildOutcome;

/// Build-phase gate.
///
/// Set strictly between a build start and the matching finish (success or
/// failure). While set, update delivery is held back; invalidation itself
/// is never blocked.
#[derive(Debug, Default)]
pub struct BuildGate {
    in_flight: bool,
    builds: u64,
}

impl BuildGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_building(&self) -> bool {
        self.in_flight
    }

    /// Number of builds started so far.
    pub fn builds_started(&self) -> u64 {
        self.builds
    }

    pub fn start(&mut self) {
        if self.in_flight {
            warn!("build started while another build is in flight");
        }
        self.in_flight = true;
        self.builds += 1;
        debug!(build = self.builds, "build gate closed");
    }

    /// Returns true if a build was actually in flight.
    pub fn finish(&mut self, outcome: BuildOutcome) -> bool {
        let was_building = self.in_flight;
        if !was_building {
            debug!(?outcome, "build finished without a matching start");
        }
        self.in_flight = false;
        debug!(build = self.builds, ?outcome, "build gate opened");
        was_building
    }
}

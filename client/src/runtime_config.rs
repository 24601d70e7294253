use std::{default::Default, time::Duration};

use mashup_shared::PhaseTimeouts;

/// Contains Config properties which will be used by a runtime container
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Bound on the PREPARE round-trip of a coordinated transaction
    pub prepare_timeout: Duration,
    /// Bound on each COMMIT round-trip of a coordinated transaction
    pub commit_timeout: Duration,
    /// How long a Source keeps the checkpoints and events of components it
    /// tore down, so that they can be restored if the Target fails
    pub checkpoint_grace_period: Duration,
    /// How long the outcome of a finished transaction is remembered, to
    /// answer late replies and `transaction_state` queries
    pub transaction_retention: Duration,
}

impl RuntimeConfig {
    pub fn phase_timeouts(&self) -> PhaseTimeouts {
        PhaseTimeouts {
            prepare: self.prepare_timeout,
            commit: self.commit_timeout,
        }
    }

    /// How long a participant waits for the coordinator after PREPARE
    /// before giving the transaction up
    pub fn participant_timeout(&self) -> Duration {
        self.prepare_timeout + self.commit_timeout
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            prepare_timeout: Duration::from_secs(10),
            commit_timeout: Duration::from_secs(30),
            checkpoint_grace_period: Duration::from_secs(60),
            transaction_retention: Duration::from_secs(300),
        }
    }
}

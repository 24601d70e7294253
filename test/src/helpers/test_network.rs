use std::{
    collections::{BTreeMap, HashSet},
    time::{Duration, Instant},
};

use log::debug;

use mashup_client::{Device, DistributionManager, RuntimeConfig, RuntimeError};
use mashup_shared::{Envelope, SessionId};

use super::{fixtures::catalog, TestComponentManager};

pub type TestRuntime = DistributionManager<TestComponentManager>;

/// Devices in one process, passing messages through in-memory queues
pub struct TestNetwork {
    runtimes: BTreeMap<SessionId, TestRuntime>,
    offline: HashSet<SessionId>,
    over_the_wire: bool,
    now: Instant,
    errors: Vec<(SessionId, RuntimeError)>,
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            runtimes: BTreeMap::new(),
            offline: HashSet::new(),
            over_the_wire: false,
            now: Instant::now(),
            errors: Vec::new(),
        }
    }

    /// Encodes and decodes every envelope on its way
    pub fn over_the_wire(mut self) -> Self {
        self.over_the_wire = true;
        self
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn add_device(&mut self, device: Device) {
        self.add_device_with_config(device, RuntimeConfig::default());
    }

    pub fn add_device_with_config(&mut self, device: Device, config: RuntimeConfig) {
        let mut runtime = DistributionManager::new(
            config,
            device.clone(),
            "mashup-app",
            TestComponentManager::new(),
            Box::new(catalog()),
        );
        for other in self.runtimes.values_mut() {
            if let Some(known) = other.get_device(other.session_id()).cloned() {
                runtime.register_device(known);
            }
            other.register_device(device.clone());
        }
        self.runtimes.insert(device.session_id().clone(), runtime);
    }

    pub fn runtime(&self, session: &str) -> &TestRuntime {
        self.runtimes
            .get(&SessionId::from(session))
            .unwrap_or_else(|| panic!("no device {}", session))
    }

    pub fn runtime_mut(&mut self, session: &str) -> &mut TestRuntime {
        self.runtimes
            .get_mut(&SessionId::from(session))
            .unwrap_or_else(|| panic!("no device {}", session))
    }

    pub fn components(&self, session: &str) -> &TestComponentManager {
        self.runtime(session).component_manager()
    }

    pub fn components_mut(&mut self, session: &str) -> &mut TestComponentManager {
        self.runtime_mut(session).component_manager_mut()
    }

    /// Drops every message to or from `session` while offline
    pub fn set_offline(&mut self, session: &str, offline: bool) {
        if offline {
            self.offline.insert(session.into());
        } else {
            self.offline.remove(&SessionId::from(session));
        }
    }

    /// Delivers messages until every queue is empty. Returns how many were delivered.
    pub fn exchange_messages(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            let round = self.exchange_round();
            if round == 0 {
                return delivered;
            }
            delivered += round;
        }
    }

    /// Delivers only what is queued right now; replies stay queued
    pub fn exchange_round(&mut self) -> usize {
        let mut in_flight: Vec<Envelope> = Vec::new();
        for runtime in self.runtimes.values_mut() {
            in_flight.extend(runtime.take_outgoing_messages());
        }

        let mut delivered = 0;
        for envelope in in_flight {
            let envelope = if self.over_the_wire {
                Envelope::decode(&envelope.encode()).expect("envelope survives the wire")
            } else {
                envelope
            };
            if self.offline.contains(&envelope.from) || self.offline.contains(&envelope.to) {
                debug!("dropping {} from {} to {}", envelope.message.name(), envelope.from, envelope.to);
                continue;
            }
            let to = envelope.to.clone();
            let Some(runtime) = self.runtimes.get_mut(&to) else {
                continue;
            };
            if let Err(error) = runtime.receive_message(envelope, self.now) {
                self.errors.push((to, error));
            }
            delivered += 1;
        }
        delivered
    }

    /// Moves time forward, runs every device's timeouts, then exchanges messages
    pub fn advance(&mut self, duration: Duration) {
        self.now += duration;
        let now = self.now;
        for runtime in self.runtimes.values_mut() {
            runtime.update(now);
        }
        self.exchange_messages();
    }

    /// Shares every device's Distribution with every other device
    pub fn publish_distributions(&mut self) {
        let distributions: Vec<_> = self
            .runtimes
            .values()
            .map(|runtime| runtime.local_distribution().clone())
            .collect();
        for runtime in self.runtimes.values_mut() {
            let remote = distributions
                .iter()
                .filter(|distribution| distribution.session_id() != runtime.session_id())
                .cloned()
                .collect();
            runtime.update_distributions(remote);
        }
    }

    /// Errors returned by `receive_message` so far
    pub fn take_errors(&mut self) -> Vec<(SessionId, RuntimeError)> {
        std::mem::take(&mut self.errors)
    }
}

mod coordinator;
mod migration_source;
mod migration_target;
mod realization_participant;

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    time::Instant,
};

use log::{debug, info, warn};
use serde_json::Value;

use mashup_shared::{
    AccessControlManager, AccessRight, Acl, ApplicationContext, CapabilityCoverageRanker,
    CommitRole, ComponentCatalog, ComponentCheckpoint, ComponentItem, ComponentTypeId,
    DistributedTransaction, Distribution, DistributionModification, DistributionOptionsVector,
    DownstreamEvent, Envelope, InstanceId, Migration, MigrationCommitRequest,
    MigrationPrepareRequest, ModificationId, ProtocolMessage, Realization,
    RealizationCommitRequest, RealizationPrepareRequest, Role, SessionId, SubstituteRanker,
    TransactionId, TransactionState, UserId,
};

use crate::{
    component_manager::ComponentManager, device::Device, event_buffer::EventBuffer,
    events::RuntimeEvents, runtime_config::RuntimeConfig, RuntimeError,
};

use self::{
    coordinator::Coordinated, migration_source::SourceSession, migration_target::TargetSession,
    realization_participant::RealizationSession,
};

/// The runtime container of one device for one application.
///
/// Owns the local Distribution, coordinates the transactions this device
/// requests and plays the Source/Target roles in the others. It performs no
/// IO: feed inbound messages to `receive_message`, drive timeouts with
/// `update` and send what `take_outgoing_messages` returns.
pub struct DistributionManager<M: ComponentManager> {
    config: RuntimeConfig,
    local: Device,
    application: ApplicationContext,
    local_distribution: Distribution,
    remote_distributions: BTreeMap<SessionId, Distribution>,
    devices: HashMap<SessionId, Device>,
    catalog: Box<dyn ComponentCatalog>,
    ranker: Box<dyn SubstituteRanker>,
    component_manager: M,
    access_control: AccessControlManager,
    coordinated: HashMap<TransactionId, Coordinated>,
    // outcome and the instant it is forgotten
    finished: HashMap<TransactionId, (TransactionState, Instant)>,
    sources: HashMap<TransactionId, SourceSession>,
    expired_backups: HashMap<TransactionId, Instant>,
    targets: HashMap<TransactionId, TargetSession>,
    realizations: HashMap<(TransactionId, Role), RealizationSession>,
    event_buffer: EventBuffer,
    loopback: VecDeque<ProtocolMessage>,
    outgoing: VecDeque<Envelope>,
    events: RuntimeEvents,
    next_transaction: u64,
}

impl<M: ComponentManager> DistributionManager<M> {
    pub fn new(
        config: RuntimeConfig,
        local: Device,
        application: impl Into<ApplicationContext>,
        component_manager: M,
        catalog: Box<dyn ComponentCatalog>,
    ) -> Self {
        let application = application.into();
        let session_id = local.session_id().clone();
        let local_distribution =
            Distribution::new(session_id.clone(), format!("{}@{}", application, session_id));

        let mut devices = HashMap::new();
        devices.insert(session_id, local.clone());

        Self {
            config,
            local,
            application,
            local_distribution,
            remote_distributions: BTreeMap::new(),
            devices,
            catalog,
            ranker: Box::new(CapabilityCoverageRanker),
            component_manager,
            access_control: AccessControlManager::new(),
            coordinated: HashMap::new(),
            finished: HashMap::new(),
            sources: HashMap::new(),
            expired_backups: HashMap::new(),
            targets: HashMap::new(),
            realizations: HashMap::new(),
            event_buffer: EventBuffer::new(),
            loopback: VecDeque::new(),
            outgoing: VecDeque::new(),
            events: RuntimeEvents::new(),
            next_transaction: 0,
        }
    }

    /// Replaces the placement heuristic used to rank substitutes
    pub fn with_ranker(mut self, ranker: Box<dyn SubstituteRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    // Accessors

    pub fn session_id(&self) -> &SessionId {
        self.local.session_id()
    }

    pub fn application(&self) -> &ApplicationContext {
        &self.application
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn component_manager(&self) -> &M {
        &self.component_manager
    }

    pub fn component_manager_mut(&mut self) -> &mut M {
        &mut self.component_manager
    }

    pub fn access_control(&self) -> &AccessControlManager {
        &self.access_control
    }

    pub fn local_distribution(&self) -> &Distribution {
        &self.local_distribution
    }

    pub fn is_suspended(&self, instance_id: &InstanceId) -> bool {
        self.event_buffer.is_suspended(instance_id)
    }

    // Devices & Distributions

    pub fn register_device(&mut self, device: Device) {
        if device.session_id() == self.local.session_id() {
            warn!("Ignoring registration of the local device {}", device.session_id());
            return;
        }
        debug!("registered device {}", device.session_id());
        self.devices.insert(device.session_id().clone(), device);
    }

    pub fn get_device(&self, session_id: &SessionId) -> Option<&Device> {
        self.devices.get(session_id)
    }

    pub fn get_distribution_from_device(&self, device: &Device) -> Option<&Distribution> {
        if device.session_id() == self.local.session_id() {
            return Some(&self.local_distribution);
        }
        self.remote_distributions.get(device.session_id())
    }

    /// The local Distribution first, then the known remote ones
    pub fn get_distributions(&self) -> Vec<&Distribution> {
        let mut distributions = vec![&self.local_distribution];
        distributions.extend(self.remote_distributions.values());
        distributions
    }

    /// Replaces what this device knows of other devices' Distributions.
    /// The local Distribution only changes through transactions.
    pub fn update_distributions(&mut self, distributions: Vec<Distribution>) {
        for distribution in distributions {
            if distribution.session_id() == self.local.session_id() {
                warn!("Ignoring update of the local distribution of {}", self.local.session_id());
                continue;
            }
            self.remote_distributions
                .insert(distribution.session_id().clone(), distribution);
        }
    }

    /// Modifications of every transaction this device has in its PREPARE phase
    pub fn get_preparing_modifications(&self) -> Vec<DistributionModification> {
        let mut seen: HashSet<ModificationId> = HashSet::new();
        let mut modifications = Vec::new();

        let coordinated = self
            .coordinated
            .values()
            .filter(|c| c.transaction().state() == TransactionState::Preparing)
            .flat_map(|c| c.transaction().modifications().iter());
        let sources = self
            .sources
            .values()
            .filter(|s| s.is_prepared())
            .flat_map(|s| s.modifications().iter());
        let targets = self.targets.values().flat_map(|t| t.modifications().iter());
        let realizations = self
            .realizations
            .values()
            .flat_map(|r| r.modifications().iter());

        for modification in coordinated.chain(sources).chain(targets).chain(realizations) {
            if seen.insert(modification.mod_id().clone()) {
                modifications.push(modification.clone());
            }
        }
        modifications
    }

    /// Partitions the components running here by what `client_id` can execute
    pub fn request_current_migration_options(
        &self,
        client_id: &SessionId,
    ) -> Result<DistributionOptionsVector, RuntimeError> {
        let device = self
            .devices
            .get(client_id)
            .ok_or_else(|| RuntimeError::UnknownDevice {
                session_id: client_id.to_string(),
            })?;
        let component_types: Vec<ComponentTypeId> = self
            .local_distribution
            .components()
            .iter()
            .map(|item| item.component_type_id().clone())
            .collect();

        Ok(DistributionOptionsVector::compute(
            device.profile(),
            &component_types,
            self.catalog.as_ref(),
            self.ranker.as_ref(),
        ))
    }

    // Sharing

    /// Marks a local component instance as shared under `acl`; the device's
    /// user is added as an editor if absent
    pub fn share_component(&mut self, instance_id: &InstanceId, mut acl: Acl) -> Result<(), RuntimeError> {
        if !self.local_distribution.contains_instance(instance_id) {
            return Err(self.unknown_instance(instance_id));
        }
        if let Some(owner) = self.local.user() {
            acl.entry(owner.clone()).or_insert(AccessRight::Edit);
        }
        self.access_control
            .try_register_component_acl(instance_id, acl)?;
        Ok(())
    }

    pub fn update_acl(&mut self, instance_id: &InstanceId, user_id: &UserId, right: AccessRight) -> bool {
        self.access_control.update_acl(instance_id, user_id, right)
    }

    // Transactions

    /// Coordinates the migration of running components away from `source`
    pub fn request_migration(
        &mut self,
        source: impl Into<SessionId>,
        modifications: Vec<DistributionModification>,
        now: Instant,
    ) -> Result<TransactionId, RuntimeError> {
        let transaction_id = self.next_transaction_id("mig");
        let acls = self.registered_acls(&modifications);

        let mut migration = Migration::new(
            transaction_id.clone(),
            self.local.session_id().clone(),
            self.application.clone(),
            source,
        )
        .with_acls(acls);
        for modification in modifications {
            migration.add_modification(modification)?;
        }
        migration.begin_prepare(now, self.config.phase_timeouts())?;

        info!("{} requested migration {}", self.local.session_id(), transaction_id);
        self.coordinated
            .insert(transaction_id.clone(), Coordinated::Migration(migration));
        self.settle(now);
        Ok(transaction_id)
    }

    /// Coordinates the first placement of new components. Instances listed
    /// in `acls` are created as shared.
    pub fn request_realization(
        &mut self,
        modifications: Vec<DistributionModification>,
        acls: BTreeMap<InstanceId, Acl>,
        now: Instant,
    ) -> Result<TransactionId, RuntimeError> {
        let transaction_id = self.next_transaction_id("real");

        let mut realization = Realization::new(
            transaction_id.clone(),
            self.local.session_id().clone(),
            self.application.clone(),
        )
        .with_acls(acls);
        for modification in modifications {
            realization.add_modification(modification)?;
        }
        realization.begin_prepare(now, self.config.phase_timeouts())?;

        info!("{} requested realization {}", self.local.session_id(), transaction_id);
        self.coordinated
            .insert(transaction_id.clone(), Coordinated::Realization(realization));
        self.settle(now);
        Ok(transaction_id)
    }

    /// Cancels a transaction before COMMIT, as its coordinator or as one of
    /// its participants. Cancelling twice is a no-op.
    pub fn cancel_transaction(
        &mut self,
        transaction_id: &TransactionId,
        reason: &str,
        now: Instant,
    ) -> Result<(), RuntimeError> {
        let result = self.try_cancel_transaction(transaction_id, reason, now);
        self.settle(now);
        result
    }

    /// State of a transaction coordinated by this device
    pub fn transaction_state(&self, transaction_id: &TransactionId) -> Option<TransactionState> {
        if let Some(coordinated) = self.coordinated.get(transaction_id) {
            return Some(coordinated.transaction().state());
        }
        self.finished.get(transaction_id).map(|(state, _)| *state)
    }

    // Messages

    pub fn receive_message(&mut self, envelope: Envelope, now: Instant) -> Result<(), RuntimeError> {
        if envelope.to != *self.local.session_id() {
            return Err(RuntimeError::Misrouted {
                message: envelope.message.name(),
                to: envelope.to.to_string(),
                session_id: self.local.session_id().to_string(),
            });
        }
        let result = self.handle_message(&envelope.from, envelope.message, now);
        self.settle(now);
        result
    }

    pub fn take_outgoing_messages(&mut self) -> Vec<Envelope> {
        self.outgoing.drain(..).collect()
    }

    pub fn take_events(&mut self) -> RuntimeEvents {
        std::mem::take(&mut self.events)
    }

    /// Routes an input event to a component instance, buffering it while the
    /// instance is suspended by a migration. Returns the event's sequence.
    pub fn deliver_event(
        &mut self,
        instance_id: &InstanceId,
        name: &str,
        payload: Value,
    ) -> Result<u64, RuntimeError> {
        if !self.event_buffer.is_suspended(instance_id)
            && !self.local_distribution.contains_instance(instance_id)
        {
            return Err(self.unknown_instance(instance_id));
        }

        let sequence = self.event_buffer.next_sequence();
        let event = DownstreamEvent::new(instance_id.clone(), sequence, name, payload);
        if let Some(event) = self.event_buffer.buffer(event) {
            self.component_manager.deliver(&event)?;
        }
        Ok(sequence)
    }

    /// Applies timeouts, discards expired backups and forgets old outcomes
    pub fn update(&mut self, now: Instant) {
        self.check_coordinator_timeouts(now);
        self.expire_sources(now);
        self.expire_targets(now);
        self.expire_realizations(now);
        self.settle(now);
        self.forget_finished(now);
    }

    // Private

    fn handle_message(
        &mut self,
        from: &SessionId,
        message: ProtocolMessage,
        now: Instant,
    ) -> Result<(), RuntimeError> {
        debug!("{} handling {} from {}", self.local.session_id(), message.name(), from);

        match message {
            ProtocolMessage::MigrationPrepare(params) => {
                let request = MigrationPrepareRequest::try_from(&params)?;
                let reply = match request.role {
                    Role::Source => self.source_prepare(from, &request, now),
                    _ => self.target_prepare(from, &request, now),
                };
                self.send(from, ProtocolMessage::PrepareReply(reply));
            }
            ProtocolMessage::MigrationCommit(params) => {
                let request = MigrationCommitRequest::try_from(&params)?;
                let reply = match &request.role {
                    CommitRole::Source => self.source_commit(&request.migration, now),
                    CommitRole::Target(payload) => self.target_commit(&request.migration, payload),
                };
                self.send(from, ProtocolMessage::CommitReply(reply));
            }
            ProtocolMessage::MigrationCancel(notice) => {
                self.cancel_coordinated(&notice.transaction, &notice.reason);
                self.source_cancel(&notice, now);
                self.target_cancel(&notice);
            }
            ProtocolMessage::MigrationRestore(notice) => {
                self.source_restore(&notice)?;
            }
            ProtocolMessage::MigrationComplete(notice) => {
                self.source_complete(&notice);
            }
            ProtocolMessage::MigrationEvents(forwarded) => {
                self.target_forwarded_events(from, forwarded);
            }
            ProtocolMessage::RealizationPrepare(params) => {
                let request = RealizationPrepareRequest::try_from(&params)?;
                let reply = self.on_realization_prepare_request(from, &request, now);
                self.send(from, ProtocolMessage::PrepareReply(reply));
            }
            ProtocolMessage::RealizationCommit(params) => {
                let request = RealizationCommitRequest::try_from(&params)?;
                let reply = self.realization_commit(&request);
                self.send(from, ProtocolMessage::CommitReply(reply));
            }
            ProtocolMessage::RealizationCancel(notice) => {
                self.cancel_coordinated(&notice.transaction, &notice.reason);
                self.realization_cancel(&notice);
            }
            ProtocolMessage::PrepareReply(reply) => {
                self.receive_prepare_reply(from, reply, now)?;
            }
            ProtocolMessage::CommitReply(reply) => {
                self.receive_commit_reply(from, reply, now)?;
            }
        }
        Ok(())
    }

    fn send(&mut self, to: &SessionId, message: ProtocolMessage) {
        if to == self.local.session_id() {
            self.loopback.push_back(message);
            return;
        }
        self.outgoing.push_back(Envelope::new(
            self.local.session_id().clone(),
            to.clone(),
            message,
        ));
    }

    // Runs messages addressed to this device and publishes what changed
    fn settle(&mut self, now: Instant) {
        loop {
            self.collect_coordinated(now);
            let Some(message) = self.loopback.pop_front() else {
                break;
            };
            let local = self.local.session_id().clone();
            if let Err(error) = self.handle_message(&local, message, now) {
                warn!("{} failed to handle its own message: {}", local, error);
                self.events.push_error(error);
            }
        }

        let session_id = self.local.session_id().clone();
        for change in self.local_distribution.take_changes() {
            self.events.push_distribution_change(&session_id, change);
        }
    }

    fn next_transaction_id(&mut self, prefix: &str) -> TransactionId {
        self.next_transaction += 1;
        TransactionId::new(format!(
            "{}-{}-{}",
            self.local.session_id(),
            prefix,
            self.next_transaction
        ))
    }

    fn registered_acls(&self, modifications: &[DistributionModification]) -> BTreeMap<InstanceId, Acl> {
        modifications
            .iter()
            .flat_map(|m| m.components().iter())
            .filter_map(|item| {
                self.access_control
                    .get_acl(item.instance_id())
                    .map(|acl| (item.instance_id().clone(), acl.clone()))
            })
            .collect()
    }

    fn unknown_instance(&self, instance_id: &InstanceId) -> RuntimeError {
        RuntimeError::UnknownInstance {
            instance_id: instance_id.to_string(),
            session_id: self.local.session_id().to_string(),
        }
    }

    /// Another transaction the component instance is taking part in here
    fn busy_transaction(&self, instance_id: &InstanceId, current: &TransactionId) -> Option<&TransactionId> {
        let sources = self
            .sources
            .iter()
            // a committed Source holds moving instances until it hears the outcome
            .filter(|(_, session)| {
                session.holds(instance_id)
                    && (session.is_prepared() || self.event_buffer.is_suspended(instance_id))
            })
            .map(|(id, _)| id);
        let targets = self
            .targets
            .iter()
            .filter(|(_, session)| session.holds(instance_id))
            .map(|(id, _)| id);
        let realizations = self
            .realizations
            .iter()
            .filter(|(_, session)| session.holds(instance_id))
            .map(|((id, _), _)| id);

        sources
            .chain(targets)
            .chain(realizations)
            .find(|id| *id != current)
    }

    fn ensure_idle(&self, instance_id: &InstanceId, current: &TransactionId) -> Result<(), RuntimeError> {
        match self.busy_transaction(instance_id, current) {
            Some(transaction_id) => Err(RuntimeError::InstanceBusy {
                instance_id: instance_id.to_string(),
                transaction_id: transaction_id.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Decides how each component will run here: as requested, or as the
    /// best ranked substitute. Fails if any component cannot run at all.
    fn plan_placements(&self, components: &[ComponentItem]) -> Result<Vec<ComponentItem>, RuntimeError> {
        let component_types: Vec<ComponentTypeId> = components
            .iter()
            .map(|item| item.component_type_id().clone())
            .collect();
        let options = DistributionOptionsVector::compute(
            self.local.profile(),
            &component_types,
            self.catalog.as_ref(),
            self.ranker.as_ref(),
        );

        // a substitute covering none of the original's capabilities is no placement
        let unplaceable: Vec<String> = options
            .non_executable_ids()
            .into_iter()
            .chain(
                options
                    .replaceables
                    .iter()
                    .filter(|replacement| replacement.best_matching_candidate().is_none())
                    .map(|replacement| &replacement.component.component_type_id),
            )
            .map(|id| id.to_string())
            .collect();
        if !unplaceable.is_empty() {
            return Err(RuntimeError::Capability {
                session_id: self.local.session_id().to_string(),
                component_type_ids: unplaceable.join(", "),
            });
        }

        Ok(components
            .iter()
            .map(|item| {
                match options
                    .replacement_for(item.component_type_id())
                    .and_then(|replacement| replacement.best_matching_candidate())
                {
                    Some(candidate) => {
                        info!(
                            "{} hosts component instance {} as {} instead of {} (matching degree {})",
                            self.local.session_id(),
                            item.instance_id(),
                            candidate.component.component_type_id,
                            item.component_type_id(),
                            candidate.matching_degree
                        );
                        item.substituted(candidate.component.component_type_id.clone())
                    }
                    None => item.clone(),
                }
            })
            .collect())
    }

    /// Starts components on this device, undoing everything if one fails
    fn instantiate_all(
        &mut self,
        placements: &[ComponentItem],
        checkpoints: &[ComponentCheckpoint],
    ) -> Result<(), RuntimeError> {
        let mut started: Vec<ComponentItem> = Vec::new();
        for item in placements {
            let checkpoint = checkpoints
                .iter()
                .find(|checkpoint| checkpoint.instance_id() == item.instance_id());
            if let Err(error) = self.component_manager.instantiate(item, checkpoint) {
                warn!("{} rolls back {} started component(s): {}", self.local.session_id(), started.len(), error);
                self.discard(&started);
                return Err(error.into());
            }
            if let Err(error) = self.local_distribution.add_component(item.clone()) {
                warn!("{} rolls back {} started component(s): {}", self.local.session_id(), started.len() + 1, error);
                if let Err(teardown_error) = self.component_manager.teardown(item) {
                    warn!("{}", teardown_error);
                }
                self.discard(&started);
                return Err(error.into());
            }
            started.push(item.clone());
        }
        Ok(())
    }

    fn discard(&mut self, items: &[ComponentItem]) {
        for item in items {
            if let Err(error) = self.component_manager.teardown(item) {
                warn!("{}", error);
            }
            if let Err(error) = self.local_distribution.remove_component(item) {
                debug!("{}", error);
            }
        }
    }

    fn apply_acls(&mut self, acls: &BTreeMap<InstanceId, Acl>) {
        for (instance_id, acl) in acls {
            self.access_control.apply_acl(instance_id, acl.clone());
        }
    }
}

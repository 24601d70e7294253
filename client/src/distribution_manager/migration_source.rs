use std::{collections::BTreeMap, time::Instant};

use log::{debug, info, warn};

use mashup_shared::{
    CommitReply, ComponentCheckpoint, ComponentItem, DistributionModification, DownstreamEvent,
    ForwardedEvents, InstanceId, MigrationDescriptor, MigrationPrepareRequest, ModificationType,
    PrepareReply, ProtocolMessage, Role, SessionId, TransactionId, TransactionKind,
    TransactionNotice,
};

use super::DistributionManager;
use crate::{component_manager::ComponentManager, RuntimeError};

enum SourceStage {
    Prepared { deadline: Instant },
    Committed { expires_at: Instant },
}

struct LeavingItem {
    item: ComponentItem,
    // false for REM: the component is removed rather than moved
    moving: bool,
    checkpoint: ComponentCheckpoint,
}

/// A migration this device is a Source of.
///
/// Once committed it is kept as a backup (checkpoints and buffered events)
/// until the grace period ends, so the components can be restored if a
/// Target fails. Moving instances stay suspended until the migration ends:
/// input that arrives after COMMIT is forwarded to their Target then.
pub(super) struct SourceSession {
    coordinator: SessionId,
    modifications: Vec<DistributionModification>,
    items: Vec<LeavingItem>,
    events: Vec<DownstreamEvent>,
    stage: SourceStage,
}

impl SourceSession {
    pub(super) fn coordinator(&self) -> &SessionId {
        &self.coordinator
    }

    pub(super) fn modifications(&self) -> &[DistributionModification] {
        &self.modifications
    }

    pub(super) fn is_prepared(&self) -> bool {
        matches!(self.stage, SourceStage::Prepared { .. })
    }

    pub(super) fn holds(&self, instance_id: &InstanceId) -> bool {
        self.items
            .iter()
            .any(|leaving| leaving.item.instance_id() == instance_id)
    }

    fn moving_checkpoints(&self) -> Vec<ComponentCheckpoint> {
        self.items
            .iter()
            .filter(|leaving| leaving.moving)
            .map(|leaving| leaving.checkpoint.clone())
            .collect()
    }

    // Target of the ADD that moves `instance_id`
    fn target_of(&self, instance_id: &InstanceId) -> Option<&SessionId> {
        self.modifications
            .iter()
            .filter(|modification| modification.mod_type() == ModificationType::Add)
            .find(|modification| {
                modification
                    .components()
                    .iter()
                    .any(|component| component.instance_id() == instance_id)
            })
            .map(|modification| modification.target())
    }

    fn moving_events(&self) -> Vec<DownstreamEvent> {
        self.events
            .iter()
            .filter(|event| {
                self.items
                    .iter()
                    .any(|leaving| leaving.moving && leaving.item.instance_id() == &event.instance)
            })
            .cloned()
            .collect()
    }

    fn is_expired(&self, now: Instant) -> bool {
        match self.stage {
            SourceStage::Prepared { deadline } => now >= deadline,
            SourceStage::Committed { expires_at } => now >= expires_at,
        }
    }
}

impl<M: ComponentManager> DistributionManager<M> {
    /// Suspends and checkpoints the leaving components. They keep running
    /// here until COMMIT.
    pub(super) fn source_prepare(
        &mut self,
        from: &SessionId,
        request: &MigrationPrepareRequest,
        now: Instant,
    ) -> PrepareReply {
        let transaction_id = request.migration.id.clone();
        let reject = |reason: String| {
            PrepareReply::rejected(transaction_id.clone(), TransactionKind::Migration, Role::Source, reason)
        };

        if let Some(session) = self.sources.get(&transaction_id) {
            debug!("Repeated prepare of migration {}", transaction_id);
            if !session.is_prepared() {
                return reject(format!("migration {} is already committed", transaction_id));
            }
            return PrepareReply::accepted(
                transaction_id.clone(),
                TransactionKind::Migration,
                Role::Source,
                session.moving_checkpoints(),
            );
        }

        let local = self.local.session_id().clone();
        let modifications: Vec<DistributionModification> =
            request.migration.leaving(&local).cloned().collect();
        if modifications.is_empty() {
            return reject(format!("no component of migration {} leaves {}", transaction_id, local));
        }

        let mut leaving: Vec<(ComponentItem, bool)> = Vec::new();
        for modification in &modifications {
            let moving = modification.mod_type() == ModificationType::Add;
            for component in modification.components() {
                if !self
                    .local_distribution
                    .contains_component(component.instance_id(), component.component_type_id())
                {
                    return reject(self.unknown_instance(component.instance_id()).to_string());
                }
                if let Err(error) = self.ensure_idle(component.instance_id(), &transaction_id) {
                    return reject(error.to_string());
                }
                if leaving
                    .iter()
                    .any(|(item, _)| item.instance_id() == component.instance_id())
                {
                    continue;
                }
                if let Some(item) = self.local_distribution.get_component(component.instance_id()) {
                    leaving.push((item.clone(), moving));
                }
            }
        }

        for (item, _) in &leaving {
            self.event_buffer.suspend(item.instance_id());
        }

        let mut items = Vec::with_capacity(leaving.len());
        for (item, moving) in &leaving {
            match self.component_manager.checkpoint(item) {
                Ok(checkpoint) => items.push(LeavingItem {
                    item: item.clone(),
                    moving: *moving,
                    checkpoint,
                }),
                Err(error) => {
                    warn!("{} cannot prepare migration {}: {}", local, transaction_id, error);
                    for (item, _) in &leaving {
                        self.resume_instance(item.instance_id());
                    }
                    return reject(error.to_string());
                }
            }
        }

        info!(
            "{} prepared {} component(s) to leave in migration {}",
            local,
            items.len(),
            transaction_id
        );
        let session = SourceSession {
            coordinator: from.clone(),
            modifications,
            items,
            events: Vec::new(),
            stage: SourceStage::Prepared {
                deadline: now + self.config.participant_timeout(),
            },
        };
        let checkpoints = session.moving_checkpoints();
        self.sources.insert(transaction_id.clone(), session);

        PrepareReply::accepted(transaction_id, TransactionKind::Migration, Role::Source, checkpoints)
    }

    /// Stops the leaving components and hands their buffered input to the
    /// coordinator. A teardown failure puts everything back.
    pub(super) fn source_commit(&mut self, migration: &MigrationDescriptor, now: Instant) -> CommitReply {
        let transaction_id = migration.id.clone();
        let failed = |reason: String| {
            CommitReply::failed(transaction_id.clone(), TransactionKind::Migration, Role::Source, reason)
        };

        let Some(mut session) = self.sources.remove(&transaction_id) else {
            return failed(format!(
                "migration {} was not prepared on {}",
                transaction_id,
                self.local.session_id()
            ));
        };
        if !session.is_prepared() {
            debug!("Repeated commit of migration {}", transaction_id);
            let events = session.moving_events();
            self.sources.insert(transaction_id.clone(), session);
            return CommitReply::committed(transaction_id.clone(), TransactionKind::Migration, Role::Source, events);
        }

        for (index, leaving) in session.items.iter().enumerate() {
            if let Err(error) = self.component_manager.teardown(&leaving.item) {
                warn!(
                    "{} cannot commit migration {}, restarting {} component(s): {}",
                    self.local.session_id(),
                    transaction_id,
                    index,
                    error
                );
                for stopped in &session.items[..index] {
                    if let Err(error) = self
                        .component_manager
                        .instantiate(&stopped.item, Some(&stopped.checkpoint))
                    {
                        warn!("{}", error);
                        self.events.push_error(error.into());
                    }
                }
                for leaving in &session.items {
                    self.resume_instance(leaving.item.instance_id());
                }
                return failed(error.to_string());
            }
        }

        let mut events = Vec::new();
        for leaving in &session.items {
            if let Err(error) = self.local_distribution.remove_component(&leaving.item) {
                warn!("{}", error);
            }
            if leaving.moving {
                events.extend(self.event_buffer.drain(leaving.item.instance_id()));
                continue;
            }
            let drained = self.event_buffer.resume(leaving.item.instance_id());
            if !drained.is_empty() {
                warn!(
                    "Dropping {} event(s) of removed component instance {}",
                    drained.len(),
                    leaving.item.instance_id()
                );
            }
        }
        events.sort_by_key(|event| event.sequence);

        session.events = events;
        session.stage = SourceStage::Committed {
            expires_at: now + self.config.checkpoint_grace_period,
        };
        let forwarded = session.moving_events();
        info!(
            "{} committed migration {}, forwarding {} buffered event(s)",
            self.local.session_id(),
            transaction_id,
            forwarded.len()
        );
        self.sources.insert(transaction_id.clone(), session);

        CommitReply::committed(transaction_id.clone(), TransactionKind::Migration, Role::Source, forwarded)
    }

    /// Before COMMIT this resumes the components, after it restores them
    pub(super) fn source_cancel(&mut self, notice: &TransactionNotice, _now: Instant) {
        let Some(session) = self.sources.get(&notice.transaction) else {
            return;
        };
        if session.is_prepared() {
            if let Some(session) = self.sources.remove(&notice.transaction) {
                for leaving in &session.items {
                    self.resume_instance(leaving.item.instance_id());
                }
                info!(
                    "{} resumed {} component(s) of cancelled migration {}",
                    self.local.session_id(),
                    session.items.len(),
                    notice.transaction
                );
            }
            return;
        }

        warn!(
            "Migration {} was cancelled after {} committed, restoring",
            notice.transaction,
            self.local.session_id()
        );
        if let Err(error) = self.source_restore(notice) {
            self.events.push_error(error);
        }
    }

    /// Restarts the components a failed migration took away, from the
    /// checkpoints and events kept since COMMIT
    pub(super) fn source_restore(&mut self, notice: &TransactionNotice) -> Result<(), RuntimeError> {
        let Some(mut session) = self.sources.remove(&notice.transaction) else {
            if self.expired_backups.contains_key(&notice.transaction) {
                return Err(RuntimeError::BackupUnavailable {
                    transaction_id: notice.transaction.to_string(),
                });
            }
            debug!("Nothing to restore for {} on {}", notice.transaction, self.local.session_id());
            return Ok(());
        };

        if session.is_prepared() {
            for leaving in &session.items {
                self.resume_instance(leaving.item.instance_id());
            }
            return Ok(());
        }

        let (restore, keep): (Vec<LeavingItem>, Vec<LeavingItem>) = session
            .items
            .drain(..)
            .partition(|leaving| notice.concerns(leaving.item.instance_id()));

        let mut result = Ok(());
        for leaving in &restore {
            if let Err(error) = self.restore_item(leaving, &session.events) {
                warn!("{} failed to restore {}: {}", self.local.session_id(), leaving.item.instance_id(), error);
                self.drop_buffered(leaving.item.instance_id());
                result = Err(error);
            }
        }
        info!(
            "{} restored {} component(s) of migration {}: {}",
            self.local.session_id(),
            restore.len(),
            notice.transaction,
            notice.reason
        );

        // the others reached their Target, which gets their late input
        session.items = keep;
        self.forward_late_events(&notice.transaction, &session);
        result
    }

    /// Releases the backup of a migration that ended COMPLETED and forwards
    /// the input its moved instances received since COMMIT
    pub(super) fn source_complete(&mut self, notice: &TransactionNotice) {
        let Some(session) = self.sources.remove(&notice.transaction) else {
            debug!("Nothing to release for {} on {}", notice.transaction, self.local.session_id());
            return;
        };
        if session.is_prepared() {
            warn!(
                "Migration {} completed before {} committed, resuming its components",
                notice.transaction,
                self.local.session_id()
            );
            for leaving in &session.items {
                self.resume_instance(leaving.item.instance_id());
            }
            return;
        }

        self.forward_late_events(&notice.transaction, &session);
        info!(
            "{} released the backup of completed migration {}",
            self.local.session_id(),
            notice.transaction
        );
    }

    // Ends the suspension of the moved instances and sends what was buffered
    // since COMMIT to the Target of each, in sequence order
    fn forward_late_events(&mut self, transaction_id: &TransactionId, session: &SourceSession) {
        let mut forwarded: BTreeMap<SessionId, Vec<DownstreamEvent>> = BTreeMap::new();
        for leaving in session.items.iter().filter(|leaving| leaving.moving) {
            let instance_id = leaving.item.instance_id();
            let late = self.event_buffer.resume(instance_id);
            if late.is_empty() {
                continue;
            }
            match session.target_of(instance_id) {
                Some(target) => forwarded.entry(target.clone()).or_default().extend(late),
                None => warn!(
                    "Dropping {} late event(s) of component instance {}",
                    late.len(),
                    instance_id
                ),
            }
        }

        for (target, mut events) in forwarded {
            events.sort_by_key(|event| event.sequence);
            debug!(
                "{} forwarding {} late event(s) of migration {} to {}",
                self.local.session_id(),
                events.len(),
                transaction_id,
                target
            );
            self.send(
                &target,
                ProtocolMessage::MigrationEvents(ForwardedEvents::new(transaction_id.clone(), events)),
            );
        }
    }

    fn restore_item(&mut self, leaving: &LeavingItem, events: &[DownstreamEvent]) -> Result<(), RuntimeError> {
        self.component_manager
            .instantiate(&leaving.item, Some(&leaving.checkpoint))?;
        self.local_distribution.add_component(leaving.item.clone())?;
        for event in events
            .iter()
            .filter(|event| &event.instance == leaving.item.instance_id())
        {
            if let Err(error) = self.component_manager.deliver(event) {
                warn!("{}", error);
            }
        }
        // input received since COMMIT comes after what the checkpoint missed
        self.resume_instance(leaving.item.instance_id());
        Ok(())
    }

    /// Resumes components whose coordinator went silent and drops old backups
    pub(super) fn expire_sources(&mut self, now: Instant) {
        let expired: Vec<_> = self
            .sources
            .iter()
            .filter(|(_, session)| session.is_expired(now))
            .map(|(transaction_id, _)| transaction_id.clone())
            .collect();

        for transaction_id in expired {
            let Some(session) = self.sources.remove(&transaction_id) else {
                continue;
            };
            if session.is_prepared() {
                warn!(
                    "Coordinator {} of migration {} went silent, {} resumes its components",
                    session.coordinator,
                    transaction_id,
                    self.local.session_id()
                );
                for leaving in &session.items {
                    self.resume_instance(leaving.item.instance_id());
                }
            } else {
                debug!("Discarding backup of migration {}", transaction_id);
                self.forward_late_events(&transaction_id, &session);
                self.expired_backups
                    .insert(transaction_id, now + self.config.transaction_retention);
            }
        }
    }

    fn drop_buffered(&mut self, instance_id: &InstanceId) {
        let dropped = self.event_buffer.resume(instance_id);
        if !dropped.is_empty() {
            warn!(
                "Dropping {} buffered event(s) of component instance {}",
                dropped.len(),
                instance_id
            );
        }
    }

    /// Redelivers what was buffered for a suspended instance, in order
    pub(super) fn resume_instance(&mut self, instance_id: &InstanceId) {
        for event in self.event_buffer.resume(instance_id) {
            if let Err(error) = self.component_manager.deliver(&event) {
                warn!("{}", error);
            }
        }
    }
}

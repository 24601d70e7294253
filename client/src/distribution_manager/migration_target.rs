use std::time::Instant;

use log::{debug, info, warn};

use mashup_shared::{
    CommitReply, ComponentItem, DistributionModification, DownstreamEvent, ForwardedEvents,
    InstanceId, MigrationDescriptor, MigrationPrepareRequest, PrepareReply, Role, SequenceList,
    SessionId, TargetCommitPayload, TransactionKind, TransactionNotice,
};

use super::DistributionManager;
use crate::component_manager::ComponentManager;

/// A migration this device is a Target of, between PREPARE and COMMIT
pub(super) struct TargetSession {
    coordinator: SessionId,
    modifications: Vec<DistributionModification>,
    // what will run here, substitutes already applied
    placements: Vec<ComponentItem>,
    deadline: Instant,
}

impl TargetSession {
    pub(super) fn coordinator(&self) -> &SessionId {
        &self.coordinator
    }

    pub(super) fn modifications(&self) -> &[DistributionModification] {
        &self.modifications
    }

    pub(super) fn holds(&self, instance_id: &InstanceId) -> bool {
        self.placements
            .iter()
            .any(|item| item.instance_id() == instance_id)
    }
}

impl<M: ComponentManager> DistributionManager<M> {
    /// Checks that every arriving component can run here, as itself or as a
    /// substitute
    pub(super) fn target_prepare(
        &mut self,
        from: &SessionId,
        request: &MigrationPrepareRequest,
        now: Instant,
    ) -> PrepareReply {
        let transaction_id = request.migration.id.clone();
        let reject = |reason: String| {
            PrepareReply::rejected(transaction_id.clone(), TransactionKind::Migration, Role::Target, reason)
        };

        if self.targets.contains_key(&transaction_id) {
            debug!("Repeated prepare of migration {}", transaction_id);
            return PrepareReply::accepted(transaction_id.clone(), TransactionKind::Migration, Role::Target, Vec::new());
        }

        let local = self.local.session_id().clone();
        let modifications: Vec<DistributionModification> =
            request.migration.arriving(&local).cloned().collect();
        if modifications.is_empty() {
            return reject(format!("no component of migration {} arrives on {}", transaction_id, local));
        }

        let components: Vec<ComponentItem> = modifications
            .iter()
            .flat_map(|modification| modification.components().iter().cloned())
            .collect();
        for component in &components {
            if self.local_distribution.contains_instance(component.instance_id()) {
                return reject(format!(
                    "component instance {} already runs on {}",
                    component.instance_id(),
                    local
                ));
            }
            if let Err(error) = self.ensure_idle(component.instance_id(), &transaction_id) {
                return reject(error.to_string());
            }
        }

        let placements = match self.plan_placements(&components) {
            Ok(placements) => placements,
            Err(error) => {
                warn!("{} rejects migration {}: {}", local, transaction_id, error);
                return reject(error.to_string());
            }
        };

        info!(
            "{} prepared to host {} component(s) of migration {}",
            local,
            placements.len(),
            transaction_id
        );
        self.targets.insert(
            transaction_id.clone(),
            TargetSession {
                coordinator: from.clone(),
                modifications,
                placements,
                deadline: now + self.config.participant_timeout(),
            },
        );

        PrepareReply::accepted(transaction_id, TransactionKind::Migration, Role::Target, Vec::new())
    }

    /// Starts the arriving components from their checkpoints, then replays
    /// the input their Source buffered
    pub(super) fn target_commit(
        &mut self,
        migration: &MigrationDescriptor,
        payload: &TargetCommitPayload,
    ) -> CommitReply {
        let transaction_id = migration.id.clone();
        let failed = |reason: String| {
            CommitReply::failed(transaction_id.clone(), TransactionKind::Migration, Role::Target, reason)
        };

        let Some(session) = self.targets.remove(&transaction_id) else {
            return failed(format!(
                "migration {} was not prepared on {}",
                transaction_id,
                self.local.session_id()
            ));
        };

        let mut replay: SequenceList<DownstreamEvent> = SequenceList::new();
        for event in &payload.events {
            if replay
                .try_insert_scan_from_back(event.sequence, event.clone())
                .is_err()
            {
                debug!("Dropping duplicate event #{} of migration {}", event.sequence, transaction_id);
            }
        }

        for item in &session.placements {
            if payload.checkpoint_for(item.instance_id()).is_none() {
                warn!(
                    "No checkpoint for component instance {}, it starts from its defaults",
                    item.instance_id()
                );
            }
        }
        if let Err(error) = self.instantiate_all(&session.placements, &payload.checkpoints) {
            return failed(error.to_string());
        }

        for (_, event) in replay.drain_ordered() {
            if !session.holds(&event.instance) {
                debug!("Skipping event for component instance {} not hosted here", event.instance);
                continue;
            }
            if let Err(error) = self.component_manager.deliver(&event) {
                warn!("{}", error);
            }
        }
        self.apply_acls(&payload.acls);

        info!(
            "{} committed migration {} and now hosts {} more component(s)",
            self.local.session_id(),
            transaction_id,
            session.placements.len()
        );
        CommitReply::committed(transaction_id.clone(), TransactionKind::Migration, Role::Target, Vec::new())
    }

    /// Replays input the Source received after its COMMIT, in the Source's
    /// sequence order
    pub(super) fn target_forwarded_events(&mut self, from: &SessionId, forwarded: ForwardedEvents) {
        let mut replay: SequenceList<DownstreamEvent> = SequenceList::new();
        for event in forwarded.events {
            let sequence = event.sequence;
            if replay.try_insert_scan_from_back(sequence, event).is_err() {
                debug!("Dropping duplicate event #{} of migration {}", sequence, forwarded.transaction);
            }
        }
        debug!(
            "{} replaying {} late event(s) of migration {} from {}",
            self.local.session_id(),
            replay.len(),
            forwarded.transaction,
            from
        );

        for (_, mut event) in replay.drain_ordered() {
            if !self.local_distribution.contains_instance(&event.instance) {
                debug!("Skipping event for component instance {} not hosted here", event.instance);
                continue;
            }
            if self.event_buffer.is_suspended(&event.instance) {
                // sequences are per device, buffer it under a local one
                event.sequence = self.event_buffer.next_sequence();
                self.event_buffer.buffer(event);
                continue;
            }
            if let Err(error) = self.component_manager.deliver(&event) {
                warn!("{}", error);
            }
        }
    }

    pub(super) fn target_cancel(&mut self, notice: &TransactionNotice) {
        if self.targets.remove(&notice.transaction).is_some() {
            info!(
                "{} dropped prepared migration {}: {}",
                self.local.session_id(),
                notice.transaction,
                notice.reason
            );
        }
    }

    pub(super) fn expire_targets(&mut self, now: Instant) {
        self.targets.retain(|transaction_id, session| {
            if now < session.deadline {
                return true;
            }
            warn!(
                "Coordinator {} of migration {} went silent, dropping it",
                session.coordinator, transaction_id
            );
            false
        });
    }
}

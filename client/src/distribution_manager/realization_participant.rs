use std::time::Instant;

use log::{debug, info, warn};

use mashup_shared::{
    CommitReply, ComponentItem, DistributionModification, InstanceId, PrepareReply,
    RealizationCommitRequest, RealizationPrepareRequest, Role, SessionId, TransactionKind,
    TransactionNotice,
};

use super::DistributionManager;
use crate::component_manager::ComponentManager;

/// One role this device plays in a Realization, between PREPARE and COMMIT
pub(super) struct RealizationSession {
    coordinator: SessionId,
    modifications: Vec<DistributionModification>,
    // empty for the Source role
    placements: Vec<ComponentItem>,
    deadline: Instant,
}

impl RealizationSession {
    pub(super) fn coordinator(&self) -> &SessionId {
        &self.coordinator
    }

    pub(super) fn modifications(&self) -> &[DistributionModification] {
        &self.modifications
    }

    pub(super) fn holds(&self, instance_id: &InstanceId) -> bool {
        self.modifications
            .iter()
            .flat_map(|modification| modification.components())
            .any(|item| item.instance_id() == instance_id)
    }
}

impl<M: ComponentManager> DistributionManager<M> {
    /// Answers the PREPARE of a Realization.
    ///
    /// As Source, vouches that none of the new instances is already placed
    /// anywhere this device knows of. As Target, checks that the components
    /// can run here, as themselves or as substitutes.
    pub fn on_realization_prepare_request(
        &mut self,
        from: &SessionId,
        request: &RealizationPrepareRequest,
        now: Instant,
    ) -> PrepareReply {
        let transaction_id = request.realization.id.clone();
        let role = request.role;
        let reject = |reason: String| {
            PrepareReply::rejected(transaction_id.clone(), TransactionKind::Realization, role, reason)
        };

        let key = (transaction_id.clone(), role);
        if self.realizations.contains_key(&key) {
            debug!("Repeated prepare of realization {} as {}", transaction_id, role);
            return PrepareReply::accepted(transaction_id.clone(), TransactionKind::Realization, role, Vec::new());
        }

        let local = self.local.session_id().clone();
        let (modifications, placements) = match role {
            Role::Source => {
                let modifications = request.realization.modifications.clone();
                for item in modifications.iter().flat_map(|m| m.components()) {
                    if let Some(holder) = self.holder_of(item.instance_id()) {
                        return reject(format!(
                            "component instance {} is already placed on {}",
                            item.instance_id(),
                            holder
                        ));
                    }
                    if let Err(error) = self.ensure_idle(item.instance_id(), &transaction_id) {
                        return reject(error.to_string());
                    }
                }
                (modifications, Vec::new())
            }
            _ => {
                let modifications: Vec<DistributionModification> =
                    request.realization.targeting(&local).cloned().collect();
                if modifications.is_empty() {
                    return reject(format!("no component of realization {} targets {}", transaction_id, local));
                }
                let components: Vec<ComponentItem> = modifications
                    .iter()
                    .flat_map(|m| m.components().iter().cloned())
                    .collect();
                for item in &components {
                    if self.local_distribution.contains_instance(item.instance_id()) {
                        return reject(format!(
                            "component instance {} already runs on {}",
                            item.instance_id(),
                            local
                        ));
                    }
                    if let Err(error) = self.ensure_idle(item.instance_id(), &transaction_id) {
                        return reject(error.to_string());
                    }
                }
                match self.plan_placements(&components) {
                    Ok(placements) => (modifications, placements),
                    Err(error) => {
                        warn!("{} rejects realization {}: {}", local, transaction_id, error);
                        return reject(error.to_string());
                    }
                }
            }
        };

        debug!("{} prepared realization {} as {}", local, transaction_id, role);
        self.realizations.insert(
            key,
            RealizationSession {
                coordinator: from.clone(),
                modifications,
                placements,
                deadline: now + self.config.participant_timeout(),
            },
        );

        PrepareReply::accepted(transaction_id.clone(), TransactionKind::Realization, role, Vec::new())
    }

    /// The Target starts the new components with no prior state; the Source
    /// only acknowledges
    pub(super) fn realization_commit(&mut self, request: &RealizationCommitRequest) -> CommitReply {
        let transaction_id = request.realization.id.clone();
        let role = request.role;
        let failed = |reason: String| {
            CommitReply::failed(transaction_id.clone(), TransactionKind::Realization, role, reason)
        };

        let Some(session) = self.realizations.remove(&(transaction_id.clone(), role)) else {
            return failed(format!(
                "realization {} was not prepared on {}",
                transaction_id,
                self.local.session_id()
            ));
        };

        if role == Role::Target {
            if let Err(error) = self.instantiate_all(&session.placements, &[]) {
                return failed(error.to_string());
            }
            self.apply_acls(&request.acls);
            info!(
                "{} committed realization {} and now hosts {} more component(s)",
                self.local.session_id(),
                transaction_id,
                session.placements.len()
            );
        }

        CommitReply::committed(transaction_id.clone(), TransactionKind::Realization, role, Vec::new())
    }

    pub(super) fn realization_cancel(&mut self, notice: &TransactionNotice) {
        for role in [Role::Source, Role::Target] {
            if self
                .realizations
                .remove(&(notice.transaction.clone(), role))
                .is_some()
            {
                info!(
                    "{} dropped prepared realization {} as {}: {}",
                    self.local.session_id(),
                    notice.transaction,
                    role,
                    notice.reason
                );
            }
        }
    }

    pub(super) fn expire_realizations(&mut self, now: Instant) {
        self.realizations.retain(|(transaction_id, role), session| {
            if now < session.deadline {
                return true;
            }
            warn!(
                "Coordinator {} of realization {} went silent, dropping the {} role",
                session.coordinator, transaction_id, role
            );
            false
        });
    }

    /// The device whose Distribution already holds this instance
    fn holder_of(&self, instance_id: &InstanceId) -> Option<&SessionId> {
        self.get_distributions()
            .into_iter()
            .find(|distribution| distribution.contains_instance(instance_id))
            .map(|distribution| distribution.session_id())
    }
}

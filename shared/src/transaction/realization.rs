use std::{
    collections::{BTreeMap, BTreeSet},
    time::Instant,
};

use log::{debug, warn};

use crate::{
    acl::access_control_manager::Acl,
    distribution::{
        error::ModificationError,
        modification::{DistributionModification, ModificationType},
    },
    messages::{
        protocol_message::ProtocolMessage,
        realization_request::{RealizationCommitRequest, RealizationDescriptor, RealizationPrepareRequest},
        reply::{CommitOutcome, CommitReply, PrepareOutcome, PrepareReply, TransactionNotice},
    },
    transaction::{
        distributed_transaction::{DistributedTransaction, PhaseTimeouts, TransactionCore, TransactionState},
        error::TransactionError,
        participant::Participant,
    },
    types::{ApplicationContext, InstanceId, Role, SessionId, TransactionId, TransactionKind},
};

/// Coordinator side of a Realization.
///
/// The initiator takes the Source role and vouches that no instance is
/// already placed; each CREATE target takes the Target role. COMMIT goes to
/// everyone at once since there is no state to carry across.
pub struct Realization {
    core: TransactionCore,
    acls: BTreeMap<InstanceId, Acl>,
    committing: bool,
}

impl Realization {
    pub fn new(
        id: impl Into<TransactionId>,
        initiator: impl Into<SessionId>,
        application: impl Into<ApplicationContext>,
    ) -> Self {
        Self {
            core: TransactionCore::new(
                id.into(),
                TransactionKind::Realization,
                initiator.into(),
                application.into(),
            ),
            acls: BTreeMap::new(),
            committing: false,
        }
    }

    /// Marks instances as shared; their ACLs travel with COMMIT
    pub fn with_acls(mut self, acls: BTreeMap<InstanceId, Acl>) -> Self {
        self.acls = acls;
        self
    }

    pub fn descriptor(&self) -> RealizationDescriptor {
        RealizationDescriptor {
            id: self.core.id().clone(),
            initiator: self.core.initiator().clone(),
            modifications: self.core.modifications().to_vec(),
        }
    }

    pub fn participants(&self) -> BTreeSet<Participant> {
        let mut participants = BTreeSet::new();
        participants.insert(Participant::source(self.core.initiator()));
        for modification in self.core.modifications() {
            participants.insert(Participant::target(modification.target()));
        }
        participants
    }

    pub fn is_committing(&self) -> bool {
        self.committing
    }

    pub fn begin_prepare(&mut self, now: Instant, timeouts: PhaseTimeouts) -> Result<(), TransactionError> {
        if self.core.modifications().is_empty() {
            return Err(TransactionError::NoModifications {
                transaction_id: self.core.id().to_string(),
            });
        }
        self.core.transition(TransactionState::Preparing, None)?;
        self.core.set_timeouts(timeouts);

        let realization = self.descriptor();
        let participants = self.participants();
        for participant in &participants {
            let request = RealizationPrepareRequest {
                role: participant.role,
                realization: realization.clone(),
            };
            self.core.send(
                &participant.session_id,
                ProtocolMessage::RealizationPrepare(request.to_params()),
            );
        }
        self.core.expect_replies(participants, now, timeouts.prepare);
        Ok(())
    }

    pub fn receive_prepare_reply(
        &mut self,
        from: &SessionId,
        reply: PrepareReply,
        now: Instant,
    ) -> Result<(), TransactionError> {
        if self.core.state().is_terminal() {
            debug!("Ignoring late prepare reply from {} for realization {}", from, self.core.id());
            return Ok(());
        }
        let participant = Participant {
            session_id: from.clone(),
            role: reply.role,
        };
        if self.committing {
            return Err(TransactionError::UnknownParticipant {
                transaction_id: self.core.id().to_string(),
                session_id: from.to_string(),
                role: reply.role.as_str(),
            });
        }
        let all_in = self.core.record_reply(&participant)?;

        match reply.outcome {
            PrepareOutcome::Rejected { reason } => {
                warn!("{} rejected prepare of realization {}: {}", from, self.core.id(), reason);
                self.abort(format!("{} {} rejected prepare: {}", participant.role, from, reason))
            }
            PrepareOutcome::Accepted { .. } if all_in => {
                self.core.transition(TransactionState::Prepared, None)?;
                self.commit(now);
                Ok(())
            }
            PrepareOutcome::Accepted { .. } => Ok(()),
        }
    }

    pub fn receive_commit_reply(
        &mut self,
        from: &SessionId,
        reply: CommitReply,
        _now: Instant,
    ) -> Result<(), TransactionError> {
        if self.core.state().is_terminal() {
            debug!("Ignoring late commit reply from {} for realization {}", from, self.core.id());
            return Ok(());
        }
        let participant = Participant {
            session_id: from.clone(),
            role: reply.role,
        };
        if !self.committing {
            return Err(TransactionError::UnknownParticipant {
                transaction_id: self.core.id().to_string(),
                session_id: from.to_string(),
                role: reply.role.as_str(),
            });
        }
        let all_in = self.core.record_reply(&participant)?;

        if let CommitOutcome::Failed { reason } = reply.outcome {
            warn!("{} failed to commit realization {}: {}", from, self.core.id(), reason);
            self.core.record_failure(format!("{} {}: {}", participant.role, from, reason));
        }
        if all_in {
            self.finish_commit()?;
        }
        Ok(())
    }

    /// Cancels before COMMIT. Idempotent once cancelled.
    pub fn cancel(&mut self, reason: &str) -> Result<(), TransactionError> {
        match self.core.state() {
            TransactionState::Cancelled => return Ok(()),
            state if state.is_terminal() => {
                return Err(TransactionError::AlreadyTerminal {
                    transaction_id: self.core.id().to_string(),
                    state: state.as_str(),
                })
            }
            _ => {}
        }
        if self.committing {
            return Err(TransactionError::CommitInProgress {
                transaction_id: self.core.id().to_string(),
            });
        }
        self.abort(reason.to_string())
    }

    pub fn check_timeout(&mut self, now: Instant) -> Result<bool, TransactionError> {
        if self.core.state().is_terminal() || !self.core.is_expired(now) {
            return Ok(false);
        }

        let silent = self.core.take_awaiting();
        let names: Vec<String> = silent.iter().map(|p| p.session_id.to_string()).collect();
        warn!(
            "Realization {} timed out waiting for {}",
            self.core.id(),
            names.join(", ")
        );

        if self.committing {
            for participant in silent {
                self.core.record_failure(format!(
                    "{} {}: commit timed out",
                    participant.role, participant.session_id
                ));
            }
            self.finish_commit()?;
        } else {
            self.abort(format!("prepare timed out waiting for {}", names.join(", ")))?;
        }
        Ok(true)
    }

    fn abort(&mut self, reason: String) -> Result<(), TransactionError> {
        if self.core.state() != TransactionState::Created {
            let sessions: BTreeSet<SessionId> =
                self.participants().into_iter().map(|p| p.session_id).collect();
            let notice = TransactionNotice::new(self.core.id().clone(), reason.clone());
            for session in sessions {
                self.core
                    .send(&session, ProtocolMessage::RealizationCancel(notice.clone()));
            }
        }
        self.core.transition(TransactionState::Cancelled, Some(reason))
    }

    fn commit(&mut self, now: Instant) {
        let realization = self.descriptor();
        let participants = self.participants();
        for participant in &participants {
            let acls = match participant.role {
                Role::Target => {
                    let instances: BTreeSet<&InstanceId> = realization
                        .targeting(&participant.session_id)
                        .flat_map(|m| m.components().iter().map(|c| c.instance_id()))
                        .collect();
                    self.acls
                        .iter()
                        .filter(|(instance, _)| instances.contains(instance))
                        .map(|(instance, acl)| (instance.clone(), acl.clone()))
                        .collect()
                }
                _ => BTreeMap::new(),
            };
            let request = RealizationCommitRequest {
                role: participant.role,
                realization: realization.clone(),
                acls,
            };
            self.core.send(
                &participant.session_id,
                ProtocolMessage::RealizationCommit(request.to_params()),
            );
        }

        let timeout = self.core.timeouts().commit;
        self.core.expect_replies(participants, now, timeout);
        self.committing = true;
    }

    // Components created on other targets stay in place; there is nothing to roll back to
    fn finish_commit(&mut self) -> Result<(), TransactionError> {
        let failures = self.core.failures().to_vec();
        self.committing = false;
        if failures.is_empty() {
            self.core.transition(TransactionState::Completed, None)
        } else {
            self.core
                .transition(TransactionState::Failed, Some(failures.join("; ")))
        }
    }
}

impl DistributedTransaction for Realization {
    fn core(&self) -> &TransactionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransactionCore {
        &mut self.core
    }

    fn check_modification(&self, modification: &DistributionModification) -> Result<(), ModificationError> {
        if modification.mod_type() != ModificationType::Create {
            return Err(ModificationError::CreateRequired {
                mod_id: modification.mod_id().to_string(),
                actual: modification.mod_type().to_string(),
            });
        }
        Ok(())
    }
}

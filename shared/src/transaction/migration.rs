use std::{
    collections::{BTreeMap, BTreeSet},
    time::Instant,
};

use log::{debug, info, warn};

use crate::{
    acl::access_control_manager::Acl,
    checkpoint::component_checkpoint::ComponentCheckpoint,
    distribution::{
        error::ModificationError,
        modification::{DistributionModification, ModificationType},
    },
    messages::{
        downstream_event::DownstreamEvent,
        migration_request::{
            CommitRole, MigrationCommitRequest, MigrationDescriptor, MigrationPrepareRequest,
            TargetCommitPayload,
        },
        protocol_message::ProtocolMessage,
        reply::{CommitOutcome, CommitReply, PrepareOutcome, PrepareReply, TransactionNotice},
    },
    transaction::{
        distributed_transaction::{DistributedTransaction, PhaseTimeouts, TransactionCore, TransactionState},
        error::TransactionError,
        participant::Participant,
    },
    types::{ApplicationContext, InstanceId, Role, SessionId, TransactionId, TransactionKind},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Preparing,
    CommittingSources,
    CommittingTargets,
    Done,
}

/// Coordinator side of a Migration, run by the initiating device.
///
/// PREPARE goes to every participant. Once all accept, COMMIT goes to the
/// Source roles, whose replies carry the events buffered since PREPARE,
/// then to the Target roles together with the checkpoints and those events.
pub struct Migration {
    core: TransactionCore,
    source: SessionId,
    acls: BTreeMap<InstanceId, Acl>,
    phase: Phase,
    checkpoints: Vec<ComponentCheckpoint>,
    buffered: Vec<DownstreamEvent>,
    failed_targets: BTreeSet<SessionId>,
}

impl Migration {
    pub fn new(
        id: impl Into<TransactionId>,
        initiator: impl Into<SessionId>,
        application: impl Into<ApplicationContext>,
        source: impl Into<SessionId>,
    ) -> Self {
        Self {
            core: TransactionCore::new(
                id.into(),
                TransactionKind::Migration,
                initiator.into(),
                application.into(),
            ),
            source: source.into(),
            acls: BTreeMap::new(),
            phase: Phase::Idle,
            checkpoints: Vec::new(),
            buffered: Vec::new(),
            failed_targets: BTreeSet::new(),
        }
    }

    /// ACLs handed to the Target of each shared instance on COMMIT
    pub fn with_acls(mut self, acls: BTreeMap<InstanceId, Acl>) -> Self {
        self.acls = acls;
        self
    }

    pub fn source(&self) -> &SessionId {
        &self.source
    }

    pub fn descriptor(&self) -> MigrationDescriptor {
        MigrationDescriptor {
            id: self.core.id().clone(),
            initiator: self.core.initiator().clone(),
            source: self.source.clone(),
            modifications: self.core.modifications().to_vec(),
        }
    }

    /// ADD makes `srcdev` a Source and the modification target a Target,
    /// REM makes the modification target a Source
    pub fn participants(&self) -> BTreeSet<Participant> {
        let mut participants = BTreeSet::new();
        for modification in self.core.modifications() {
            match modification.mod_type() {
                ModificationType::Add => {
                    participants.insert(Participant::source(&self.source));
                    participants.insert(Participant::target(modification.target()));
                }
                ModificationType::Rem => {
                    participants.insert(Participant::source(modification.target()));
                }
                ModificationType::Create => {}
            }
        }
        participants
    }

    pub fn is_committing(&self) -> bool {
        matches!(self.phase, Phase::CommittingSources | Phase::CommittingTargets)
    }

    /// Sends PREPARE to every participant and starts the prepare timeout
    pub fn begin_prepare(&mut self, now: Instant, timeouts: PhaseTimeouts) -> Result<(), TransactionError> {
        if self.core.modifications().is_empty() {
            return Err(TransactionError::NoModifications {
                transaction_id: self.core.id().to_string(),
            });
        }
        self.core.transition(TransactionState::Preparing, None)?;
        self.core.set_timeouts(timeouts);

        let migration = self.descriptor();
        let participants = self.participants();
        for participant in &participants {
            let request = MigrationPrepareRequest {
                role: participant.role,
                migration: migration.clone(),
            };
            self.core.send(
                &participant.session_id,
                ProtocolMessage::MigrationPrepare(request.to_params()),
            );
        }

        self.core.expect_replies(participants, now, timeouts.prepare);
        self.phase = Phase::Preparing;
        Ok(())
    }

    pub fn receive_prepare_reply(
        &mut self,
        from: &SessionId,
        reply: PrepareReply,
        now: Instant,
    ) -> Result<(), TransactionError> {
        if self.core.state().is_terminal() {
            debug!("Ignoring late prepare reply from {} for migration {}", from, self.core.id());
            return Ok(());
        }
        let participant = Participant {
            session_id: from.clone(),
            role: reply.role,
        };
        if self.phase != Phase::Preparing {
            return Err(self.unknown(&participant));
        }
        let all_in = self.core.record_reply(&participant)?;

        match reply.outcome {
            PrepareOutcome::Rejected { reason } => {
                warn!("{} rejected prepare of migration {}: {}", from, self.core.id(), reason);
                self.abort(format!("{} {} rejected prepare: {}", participant.role, from, reason))?;
            }
            PrepareOutcome::Accepted { checkpoints } => {
                self.checkpoints.extend(checkpoints);
                if all_in {
                    self.core.transition(TransactionState::Prepared, None)?;
                    self.commit_sources(now);
                }
            }
        }
        Ok(())
    }

    pub fn receive_commit_reply(
        &mut self,
        from: &SessionId,
        reply: CommitReply,
        now: Instant,
    ) -> Result<(), TransactionError> {
        if self.core.state().is_terminal() {
            debug!("Ignoring late commit reply from {} for migration {}", from, self.core.id());
            return Ok(());
        }
        let participant = Participant {
            session_id: from.clone(),
            role: reply.role,
        };
        let expected_role = match self.phase {
            Phase::CommittingSources => Role::Source,
            Phase::CommittingTargets => Role::Target,
            _ => return Err(self.unknown(&participant)),
        };
        if participant.role != expected_role {
            return Err(self.unknown(&participant));
        }
        let all_in = self.core.record_reply(&participant)?;

        match reply.outcome {
            CommitOutcome::Committed { events } => {
                if participant.role == Role::Source {
                    self.buffered.extend(events);
                }
            }
            CommitOutcome::Failed { reason } => {
                warn!("{} failed to commit migration {}: {}", from, self.core.id(), reason);
                if participant.role == Role::Target {
                    self.failed_targets.insert(from.clone());
                }
                self.core.record_failure(format!("{} {}: {}", participant.role, from, reason));
            }
        }

        if all_in {
            self.finish_commit_round(now)?;
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
        if self.is_committing() {
            return Err(TransactionError::CommitInProgress {
                transaction_id: self.core.id().to_string(),
            });
        }
        self.abort(reason.to_string())
    }

    /// Applies the round-trip timeout.
    ///
    /// Before COMMIT this cancels; during COMMIT every silent participant
    /// counts as failed. Returns whether the deadline had passed.
    pub fn check_timeout(&mut self, now: Instant) -> Result<bool, TransactionError> {
        if self.core.state().is_terminal() || !self.core.is_expired(now) {
            return Ok(false);
        }

        let silent = self.core.take_awaiting();
        let names: Vec<String> = silent.iter().map(|p| p.session_id.to_string()).collect();
        warn!(
            "Migration {} timed out waiting for {}",
            self.core.id(),
            names.join(", ")
        );

        match self.phase {
            Phase::Idle | Phase::Preparing => {
                self.abort(format!("prepare timed out waiting for {}", names.join(", ")))?;
            }
            Phase::CommittingSources | Phase::CommittingTargets => {
                for participant in silent {
                    if participant.role == Role::Target {
                        self.failed_targets.insert(participant.session_id.clone());
                    }
                    self.core.record_failure(format!(
                        "{} {}: commit timed out",
                        participant.role, participant.session_id
                    ));
                }
                self.finish_commit_round(now)?;
            }
            Phase::Done => {}
        }
        Ok(true)
    }

    fn unknown(&self, participant: &Participant) -> TransactionError {
        TransactionError::UnknownParticipant {
            transaction_id: self.core.id().to_string(),
            session_id: participant.session_id.to_string(),
            role: participant.role.as_str(),
        }
    }

    fn notify_sessions(&mut self, sessions: BTreeSet<SessionId>, message: ProtocolMessage) {
        for session in sessions {
            self.core.send(&session, message.clone());
        }
    }

    // Cancels every participant and ends CANCELLED
    fn abort(&mut self, reason: String) -> Result<(), TransactionError> {
        if self.phase != Phase::Idle {
            let sessions = self.participants().into_iter().map(|p| p.session_id).collect();
            let notice = TransactionNotice::new(self.core.id().clone(), reason.clone());
            self.notify_sessions(sessions, ProtocolMessage::MigrationCancel(notice));
        }
        self.phase = Phase::Done;
        self.core.transition(TransactionState::Cancelled, Some(reason))
    }

    // Sources keep buffering after their COMMIT until they hear the outcome
    fn complete(&mut self) -> Result<(), TransactionError> {
        let sources = self
            .participants()
            .into_iter()
            .filter(|p| p.role == Role::Source)
            .map(|p| p.session_id)
            .collect();
        let notice = TransactionNotice::new(self.core.id().clone(), "completed");
        self.notify_sessions(sources, ProtocolMessage::MigrationComplete(notice));
        self.phase = Phase::Done;
        self.core.transition(TransactionState::Completed, None)
    }

    fn commit_sources(&mut self, now: Instant) {
        let migration = self.descriptor();
        let sources: BTreeSet<Participant> = self
            .participants()
            .into_iter()
            .filter(|p| p.role == Role::Source)
            .collect();

        info!("Migration {} committing {} source(s)", self.core.id(), sources.len());
        for participant in &sources {
            let request = MigrationCommitRequest {
                role: CommitRole::Source,
                migration: migration.clone(),
            };
            self.core.send(
                &participant.session_id,
                ProtocolMessage::MigrationCommit(request.to_params()),
            );
        }

        let timeout = self.core.timeouts().commit;
        self.core.expect_replies(sources, now, timeout);
        self.phase = Phase::CommittingSources;
    }

    fn commit_targets(&mut self, now: Instant) -> Result<(), TransactionError> {
        let targets: BTreeSet<Participant> = self
            .participants()
            .into_iter()
            .filter(|p| p.role == Role::Target)
            .collect();
        if targets.is_empty() {
            return self.complete();
        }

        let migration = self.descriptor();
        for participant in &targets {
            let payload = self.payload_for(&migration, &participant.session_id);
            let request = MigrationCommitRequest {
                role: CommitRole::Target(payload),
                migration: migration.clone(),
            };
            self.core.send(
                &participant.session_id,
                ProtocolMessage::MigrationCommit(request.to_params()),
            );
        }

        let timeout = self.core.timeouts().commit;
        self.core.expect_replies(targets, now, timeout);
        self.phase = Phase::CommittingTargets;
        Ok(())
    }

    // Checkpoints, events and ACLs of the instances arriving on `target`
    fn payload_for(&self, migration: &MigrationDescriptor, target: &SessionId) -> TargetCommitPayload {
        let instances: BTreeSet<&InstanceId> = migration
            .arriving(target)
            .flat_map(|m| m.components().iter().map(|c| c.instance_id()))
            .collect();

        let mut events: Vec<DownstreamEvent> = self
            .buffered
            .iter()
            .filter(|e| instances.contains(&e.instance))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence);

        TargetCommitPayload {
            checkpoints: self
                .checkpoints
                .iter()
                .filter(|c| instances.contains(c.instance_id()))
                .cloned()
                .collect(),
            events,
            acls: self
                .acls
                .iter()
                .filter(|(instance, _)| instances.contains(instance))
                .map(|(instance, acl)| (instance.clone(), acl.clone()))
                .collect(),
        }
    }

    fn finish_commit_round(&mut self, now: Instant) -> Result<(), TransactionError> {
        let failures = self.core.failures().to_vec();
        match self.phase {
            Phase::CommittingSources if failures.is_empty() => self.commit_targets(now),
            Phase::CommittingSources => {
                // Nothing reached a Target yet: every Source puts its components back
                let sources = self
                    .participants()
                    .into_iter()
                    .filter(|p| p.role == Role::Source)
                    .map(|p| p.session_id)
                    .collect();
                let targets = self
                    .participants()
                    .into_iter()
                    .filter(|p| p.role == Role::Target)
                    .map(|p| p.session_id)
                    .collect();
                let reason = failures.join("; ");
                let notice = TransactionNotice::new(self.core.id().clone(), reason.clone());
                self.notify_sessions(sources, ProtocolMessage::MigrationRestore(notice.clone()));
                self.notify_sessions(targets, ProtocolMessage::MigrationCancel(notice));
                self.phase = Phase::Done;
                self.core.transition(TransactionState::Failed, Some(reason))
            }
            Phase::CommittingTargets if failures.is_empty() => self.complete(),
            Phase::CommittingTargets => {
                let reason = failures.join("; ");
                let migration = self.descriptor();
                let failed_targets: Vec<SessionId> = self.failed_targets.iter().cloned().collect();
                let mut instances = Vec::new();
                for target in &failed_targets {
                    instances.extend(
                        migration
                            .arriving(target)
                            .flat_map(|m| m.components().iter().map(|c| c.instance_id().clone())),
                    );
                    self.core.send(
                        target,
                        ProtocolMessage::MigrationCancel(TransactionNotice::new(
                            self.core.id().clone(),
                            reason.clone(),
                        )),
                    );
                }
                let source = self.source.clone();
                self.core.send(
                    &source,
                    ProtocolMessage::MigrationRestore(
                        TransactionNotice::new(self.core.id().clone(), reason.clone())
                            .with_instances(instances),
                    ),
                );
                self.phase = Phase::Done;
                self.core.transition(TransactionState::Failed, Some(reason))
            }
            Phase::Idle | Phase::Preparing | Phase::Done => Ok(()),
        }
    }
}

impl DistributedTransaction for Migration {
    fn core(&self) -> &TransactionCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TransactionCore {
        &mut self.core
    }

    fn check_modification(&self, modification: &DistributionModification) -> Result<(), ModificationError> {
        if modification.mod_type() == ModificationType::Create {
            return Err(ModificationError::CreateOutsideRealization {
                mod_id: modification.mod_id().to_string(),
            });
        }
        Ok(())
    }
}

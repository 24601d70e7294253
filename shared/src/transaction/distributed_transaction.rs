use std::{
    collections::BTreeSet,
    fmt, mem,
    time::{Duration, Instant},
};

use log::{info, warn};

use crate::{
    distribution::{error::ModificationError, modification::DistributionModification},
    messages::protocol_message::ProtocolMessage,
    transaction::{error::TransactionError, participant::Participant},
    types::{ApplicationContext, SessionId, TransactionId, TransactionKind},
};

/// Lifecycle of a distributed transaction.
///
/// `Created -> Preparing -> Prepared -> Completed | Failed`, with
/// `Cancelled` reachable from every state before COMMIT starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionState {
    Created,
    Preparing,
    Prepared,
    Completed,
    Cancelled,
    Failed,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Created => "created",
            TransactionState::Preparing => "preparing",
            TransactionState::Prepared => "prepared",
            TransactionState::Completed => "completed",
            TransactionState::Cancelled => "cancelled",
            TransactionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Completed | TransactionState::Cancelled | TransactionState::Failed
        )
    }

    fn can_become(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (Created, Preparing)
                | (Created, Cancelled)
                | (Preparing, Prepared)
                | (Preparing, Cancelled)
                | (Prepared, Cancelled)
                | (Prepared, Completed)
                | (Prepared, Failed)
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Preparing,
    Prepared,
    Completed,
    Cancelled,
    Failed,
}

impl LifecycleEvent {
    fn entering(state: TransactionState) -> Option<Self> {
        match state {
            TransactionState::Created => None,
            TransactionState::Preparing => Some(LifecycleEvent::Preparing),
            TransactionState::Prepared => Some(LifecycleEvent::Prepared),
            TransactionState::Completed => Some(LifecycleEvent::Completed),
            TransactionState::Cancelled => Some(LifecycleEvent::Cancelled),
            TransactionState::Failed => Some(LifecycleEvent::Failed),
        }
    }
}

/// Fired on every lifecycle transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionEvent {
    pub transaction_id: TransactionId,
    pub transaction_kind: TransactionKind,
    pub kind: LifecycleEvent,
    pub reason: Option<String>,
}

/// Bounds on the two network round-trips of a transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseTimeouts {
    pub prepare: Duration,
    pub commit: Duration,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        Self {
            prepare: Duration::from_secs(10),
            commit: Duration::from_secs(30),
        }
    }
}

/// State shared by every kind of distributed transaction: identity,
/// modifications, lifecycle, the replies still awaited and the messages
/// waiting to be sent.
pub struct TransactionCore {
    id: TransactionId,
    kind: TransactionKind,
    initiator: SessionId,
    application: ApplicationContext,
    modifications: Vec<DistributionModification>,
    state: TransactionState,
    timeouts: PhaseTimeouts,
    deadline: Option<Instant>,
    awaiting: BTreeSet<Participant>,
    failures: Vec<String>,
    events: Vec<TransactionEvent>,
    outgoing: Vec<(SessionId, ProtocolMessage)>,
}

impl TransactionCore {
    pub fn new(
        id: TransactionId,
        kind: TransactionKind,
        initiator: SessionId,
        application: ApplicationContext,
    ) -> Self {
        Self {
            id,
            kind,
            initiator,
            application,
            modifications: Vec::new(),
            state: TransactionState::Created,
            timeouts: PhaseTimeouts::default(),
            deadline: None,
            awaiting: BTreeSet::new(),
            failures: Vec::new(),
            events: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn initiator(&self) -> &SessionId {
        &self.initiator
    }

    pub fn application(&self) -> &ApplicationContext {
        &self.application
    }

    pub fn modifications(&self) -> &[DistributionModification] {
        &self.modifications
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn awaiting(&self) -> &BTreeSet<Participant> {
        &self.awaiting
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    pub fn push_modification(&mut self, modification: DistributionModification) -> Result<(), TransactionError> {
        self.ensure_unfrozen("add a modification")?;
        self.modifications.push(modification);
        Ok(())
    }

    pub fn clear_modifications(&mut self) -> Result<(), TransactionError> {
        self.ensure_unfrozen("clear modifications")?;
        self.modifications.clear();
        Ok(())
    }

    fn ensure_unfrozen(&self, operation: &'static str) -> Result<(), TransactionError> {
        if self.state != TransactionState::Created {
            return Err(TransactionError::ModificationsFrozen {
                transaction_id: self.id.to_string(),
                operation,
            });
        }
        Ok(())
    }

    /// Moves to `next`, firing the matching lifecycle event
    pub fn transition(&mut self, next: TransactionState, reason: Option<String>) -> Result<(), TransactionError> {
        if self.state.is_terminal() {
            return Err(TransactionError::AlreadyTerminal {
                transaction_id: self.id.to_string(),
                state: self.state.as_str(),
            });
        }
        if !self.state.can_become(next) {
            return Err(TransactionError::IllegalTransition {
                transaction_id: self.id.to_string(),
                from: self.state.as_str(),
                to: next.as_str(),
            });
        }

        match (&reason, next) {
            (Some(reason), TransactionState::Cancelled | TransactionState::Failed) => {
                warn!("{:?} {} is {}: {}", self.kind, self.id, next, reason)
            }
            _ => info!("{:?} {} is {}", self.kind, self.id, next),
        }

        self.state = next;
        if next.is_terminal() {
            self.deadline = None;
            self.awaiting.clear();
        }
        if let Some(kind) = LifecycleEvent::entering(next) {
            self.events.push(TransactionEvent {
                transaction_id: self.id.clone(),
                transaction_kind: self.kind,
                kind,
                reason,
            });
        }
        Ok(())
    }

    pub fn set_timeouts(&mut self, timeouts: PhaseTimeouts) {
        self.timeouts = timeouts;
    }

    pub fn timeouts(&self) -> PhaseTimeouts {
        self.timeouts
    }

    /// Starts a round-trip: the replies of `participants` are awaited until
    /// `now + timeout`
    pub fn expect_replies(&mut self, participants: BTreeSet<Participant>, now: Instant, timeout: Duration) {
        self.awaiting = participants;
        self.failures.clear();
        self.deadline = Some(now + timeout);
    }

    /// Marks the reply of `participant` as received.
    ///
    /// Returns whether every awaited reply is now in.
    pub fn record_reply(&mut self, participant: &Participant) -> Result<bool, TransactionError> {
        if !self.awaiting.remove(participant) {
            return Err(TransactionError::UnknownParticipant {
                transaction_id: self.id.to_string(),
                session_id: participant.session_id.to_string(),
                role: participant.role.as_str(),
            });
        }
        Ok(self.awaiting.is_empty())
    }

    pub fn record_failure(&mut self, reason: String) {
        self.failures.push(reason);
    }

    /// Empties the awaited set, returning who never answered
    pub fn take_awaiting(&mut self) -> BTreeSet<Participant> {
        mem::take(&mut self.awaiting)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    pub fn send(&mut self, to: &SessionId, message: ProtocolMessage) {
        self.outgoing.push((to.clone(), message));
    }

    pub fn take_outgoing(&mut self) -> Vec<(SessionId, ProtocolMessage)> {
        mem::take(&mut self.outgoing)
    }

    pub fn take_events(&mut self) -> Vec<TransactionEvent> {
        mem::take(&mut self.events)
    }
}

/// Behaviour common to Migration and Realization
pub trait DistributedTransaction {
    fn core(&self) -> &TransactionCore;

    fn core_mut(&mut self) -> &mut TransactionCore;

    /// Rejects modifications this kind of transaction cannot carry
    fn check_modification(&self, modification: &DistributionModification) -> Result<(), ModificationError>;

    fn id(&self) -> &TransactionId {
        self.core().id()
    }

    fn kind(&self) -> TransactionKind {
        self.core().kind()
    }

    fn initiator(&self) -> &SessionId {
        self.core().initiator()
    }

    fn application(&self) -> &ApplicationContext {
        self.core().application()
    }

    fn modifications(&self) -> &[DistributionModification] {
        self.core().modifications()
    }

    fn state(&self) -> TransactionState {
        self.core().state()
    }

    fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    fn add_modification(&mut self, modification: DistributionModification) -> Result<(), TransactionError> {
        self.check_modification(&modification)?;
        self.core_mut().push_modification(modification)
    }

    fn clear_modifications(&mut self) -> Result<(), TransactionError> {
        self.core_mut().clear_modifications()
    }

    fn take_events(&mut self) -> Vec<TransactionEvent> {
        self.core_mut().take_events()
    }

    fn take_outgoing(&mut self) -> Vec<(SessionId, ProtocolMessage)> {
        self.core_mut().take_outgoing()
    }
}

use std::time::Instant;

use log::{debug, warn};

use mashup_shared::{
    CommitReply, DistributedTransaction, Migration, PrepareReply, ProtocolMessage, Realization,
    SessionId, TransactionError, TransactionId, TransactionKind, TransactionNotice,
    TransactionState,
};

use super::DistributionManager;
use crate::{component_manager::ComponentManager, RuntimeError};

/// A transaction this device coordinates
pub(super) enum Coordinated {
    Migration(Migration),
    Realization(Realization),
}

impl Coordinated {
    pub(super) fn transaction(&self) -> &dyn DistributedTransaction {
        match self {
            Coordinated::Migration(migration) => migration,
            Coordinated::Realization(realization) => realization,
        }
    }

    fn transaction_mut(&mut self) -> &mut dyn DistributedTransaction {
        match self {
            Coordinated::Migration(migration) => migration,
            Coordinated::Realization(realization) => realization,
        }
    }

    fn receive_prepare_reply(
        &mut self,
        from: &SessionId,
        reply: PrepareReply,
        now: Instant,
    ) -> Result<(), TransactionError> {
        match self {
            Coordinated::Migration(migration) => migration.receive_prepare_reply(from, reply, now),
            Coordinated::Realization(realization) => {
                realization.receive_prepare_reply(from, reply, now)
            }
        }
    }

    fn receive_commit_reply(
        &mut self,
        from: &SessionId,
        reply: CommitReply,
        now: Instant,
    ) -> Result<(), TransactionError> {
        match self {
            Coordinated::Migration(migration) => migration.receive_commit_reply(from, reply, now),
            Coordinated::Realization(realization) => {
                realization.receive_commit_reply(from, reply, now)
            }
        }
    }

    fn cancel(&mut self, reason: &str) -> Result<(), TransactionError> {
        match self {
            Coordinated::Migration(migration) => migration.cancel(reason),
            Coordinated::Realization(realization) => realization.cancel(reason),
        }
    }

    fn check_timeout(&mut self, now: Instant) -> Result<bool, TransactionError> {
        match self {
            Coordinated::Migration(migration) => migration.check_timeout(now),
            Coordinated::Realization(realization) => realization.check_timeout(now),
        }
    }
}

impl<M: ComponentManager> DistributionManager<M> {
    /// Sends what the coordinated transactions queued and retires finished ones
    pub(super) fn collect_coordinated(&mut self, now: Instant) {
        let mut outgoing = Vec::new();
        let mut lifecycle = Vec::new();
        let mut done = Vec::new();

        for (transaction_id, coordinated) in self.coordinated.iter_mut() {
            let transaction = coordinated.transaction_mut();
            outgoing.extend(transaction.take_outgoing());
            lifecycle.extend(transaction.take_events());
            if transaction.is_terminal() {
                done.push(transaction_id.clone());
            }
        }

        for (to, message) in outgoing {
            self.send(&to, message);
        }
        for event in lifecycle {
            self.events.push_transaction_event(event);
        }
        let forget_at = now + self.config.transaction_retention;
        for transaction_id in done {
            if let Some(coordinated) = self.coordinated.remove(&transaction_id) {
                self.finished
                    .insert(transaction_id, (coordinated.transaction().state(), forget_at));
            }
        }
    }

    /// Drops outcomes and expired-backup markers older than the retention
    pub(super) fn forget_finished(&mut self, now: Instant) {
        self.finished.retain(|transaction_id, (_, forget_at)| {
            if now < *forget_at {
                return true;
            }
            debug!("Forgetting finished transaction {}", transaction_id);
            false
        });
        self.expired_backups.retain(|_, forget_at| now < *forget_at);
    }

    pub(super) fn receive_prepare_reply(
        &mut self,
        from: &SessionId,
        reply: PrepareReply,
        now: Instant,
    ) -> Result<(), RuntimeError> {
        if self.finished.contains_key(&reply.transaction) {
            debug!("Ignoring late prepare reply from {} for {}", from, reply.transaction);
            return Ok(());
        }
        let coordinated = self.coordinated.get_mut(&reply.transaction).ok_or_else(|| {
            RuntimeError::UnknownTransaction {
                transaction_id: reply.transaction.to_string(),
                session_id: self.local.session_id().to_string(),
            }
        })?;
        coordinated.receive_prepare_reply(from, reply, now)?;
        Ok(())
    }

    pub(super) fn receive_commit_reply(
        &mut self,
        from: &SessionId,
        reply: CommitReply,
        now: Instant,
    ) -> Result<(), RuntimeError> {
        if self.finished.contains_key(&reply.transaction) {
            debug!("Ignoring late commit reply from {} for {}", from, reply.transaction);
            return Ok(());
        }
        let coordinated = self.coordinated.get_mut(&reply.transaction).ok_or_else(|| {
            RuntimeError::UnknownTransaction {
                transaction_id: reply.transaction.to_string(),
                session_id: self.local.session_id().to_string(),
            }
        })?;
        coordinated.receive_commit_reply(from, reply, now)?;
        Ok(())
    }

    /// A participant asked the coordinator to cancel
    pub(super) fn cancel_coordinated(&mut self, transaction_id: &TransactionId, reason: &str) {
        let Some(coordinated) = self.coordinated.get_mut(transaction_id) else {
            return;
        };
        if let Err(error) = coordinated.cancel(reason) {
            warn!("Cannot cancel {} on participant request: {}", transaction_id, error);
        }
    }

    pub(super) fn check_coordinator_timeouts(&mut self, now: Instant) {
        let mut errors = Vec::new();
        for (transaction_id, coordinated) in self.coordinated.iter_mut() {
            match coordinated.check_timeout(now) {
                Ok(true) => debug!("{} timed out", transaction_id),
                Ok(false) => {}
                Err(error) => errors.push(RuntimeError::from(error)),
            }
        }
        for error in errors {
            self.events.push_error(error);
        }
    }

    pub(super) fn try_cancel_transaction(
        &mut self,
        transaction_id: &TransactionId,
        reason: &str,
        now: Instant,
    ) -> Result<(), RuntimeError> {
        if let Some((state, _)) = self.finished.get(transaction_id) {
            return match state {
                TransactionState::Cancelled => Ok(()),
                state => Err(TransactionError::AlreadyTerminal {
                    transaction_id: transaction_id.to_string(),
                    state: state.as_str(),
                }
                .into()),
            };
        }
        if let Some(coordinated) = self.coordinated.get_mut(transaction_id) {
            coordinated.cancel(reason)?;
            return Ok(());
        }

        // participant side: leave the transaction and tell its coordinator
        let Some((coordinator, kind)) = self.participation(transaction_id)? else {
            return Err(RuntimeError::UnknownTransaction {
                transaction_id: transaction_id.to_string(),
                session_id: self.local.session_id().to_string(),
            });
        };
        let notice = TransactionNotice::new(
            transaction_id.clone(),
            format!("{} cancelled: {}", self.local.session_id(), reason),
        );
        let message = match kind {
            TransactionKind::Migration => {
                self.source_cancel(&notice, now);
                self.target_cancel(&notice);
                ProtocolMessage::MigrationCancel(notice)
            }
            TransactionKind::Realization => {
                self.realization_cancel(&notice);
                ProtocolMessage::RealizationCancel(notice)
            }
        };
        self.send(&coordinator, message);
        Ok(())
    }

    /// The coordinator and kind of a transaction this device takes part in,
    /// if it may still leave it
    fn participation(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<(SessionId, TransactionKind)>, RuntimeError> {
        if let Some(session) = self.sources.get(transaction_id) {
            if !session.is_prepared() {
                return Err(TransactionError::CommitInProgress {
                    transaction_id: transaction_id.to_string(),
                }
                .into());
            }
            return Ok(Some((session.coordinator().clone(), TransactionKind::Migration)));
        }
        if let Some(session) = self.targets.get(transaction_id) {
            return Ok(Some((session.coordinator().clone(), TransactionKind::Migration)));
        }
        Ok(self
            .realizations
            .iter()
            .find(|((id, _), _)| id == transaction_id)
            .map(|(_, session)| (session.coordinator().clone(), TransactionKind::Realization)))
    }
}

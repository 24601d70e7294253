use thiserror::Error;

use crate::distribution::error::ModificationError;

/// Errors raised by the transaction lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// The requested lifecycle transition is not allowed from the current state
    #[error("Transaction {transaction_id} cannot go from {from} to {to}")]
    IllegalTransition {
        transaction_id: String,
        from: &'static str,
        to: &'static str,
    },

    /// Modifications can only change before PREPARING begins
    #[error("Cannot {operation} on transaction {transaction_id}: modifications are frozen once preparing starts")]
    ModificationsFrozen {
        transaction_id: String,
        operation: &'static str,
    },

    /// The transaction already completed, was cancelled or failed
    #[error("Transaction {transaction_id} is already {state}")]
    AlreadyTerminal {
        transaction_id: String,
        state: &'static str,
    },

    /// A reply came from a device that is not an awaited participant
    #[error("Transaction {transaction_id} is not awaiting a {role} reply from {session_id}")]
    UnknownParticipant {
        transaction_id: String,
        session_id: String,
        role: &'static str,
    },

    /// PREPARE was requested on a transaction without modifications
    #[error("Transaction {transaction_id} has no modifications")]
    NoModifications { transaction_id: String },

    /// Cancellation was requested after COMMIT started
    #[error("Transaction {transaction_id} is committing and can no longer be cancelled")]
    CommitInProgress { transaction_id: String },

    /// The modification is not valid for this kind of transaction
    #[error(transparent)]
    Modification(#[from] ModificationError),
}

use thiserror::Error;

use mashup_shared::{
    AclError, CheckpointError, DistributionError, TransactionError, ValidationError,
};

use crate::component_manager::ComponentManagerError;

/// Errors surfaced by a runtime container
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// No device with this session id has been registered
    #[error("Unknown device {session_id}")]
    UnknownDevice { session_id: String },

    /// No transaction with this id is known to the device
    #[error("Transaction {transaction_id} is unknown to {session_id}")]
    UnknownTransaction {
        transaction_id: String,
        session_id: String,
    },

    /// The component instance is not hosted on this device
    #[error("Component instance {instance_id} is not hosted on {session_id}")]
    UnknownInstance {
        instance_id: String,
        session_id: String,
    },

    /// The component instance already takes part in another transaction
    #[error("Component instance {instance_id} is busy in transaction {transaction_id}")]
    InstanceBusy {
        instance_id: String,
        transaction_id: String,
    },

    /// The device cannot execute the listed component types, even with substitutes
    #[error("{session_id} cannot execute component types: {component_type_ids}")]
    Capability {
        session_id: String,
        component_type_ids: String,
    },

    /// An inbound message was addressed to another device
    #[error("Message {message} addressed to {to} was delivered to {session_id}")]
    Misrouted {
        message: &'static str,
        to: String,
        session_id: String,
    },

    /// A restore arrived after the backup of the torn down components was discarded
    #[error("Backup of transaction {transaction_id} is no longer available, components cannot be restored")]
    BackupUnavailable { transaction_id: String },

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Acl(#[from] AclError),

    #[error(transparent)]
    ComponentManager(#[from] ComponentManagerError),
}

use serde::{Deserialize, Serialize};

use crate::{
    checkpoint::component_checkpoint::ComponentCheckpoint,
    messages::downstream_event::DownstreamEvent,
    types::{InstanceId, Role, TransactionId, TransactionKind},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrepareOutcome {
    /// The participant is ready; a migration Source attaches its checkpoints
    Accepted {
        #[serde(default)]
        checkpoints: Vec<ComponentCheckpoint>,
    },
    Rejected { reason: String },
}

/// A participant's answer to a PREPARE request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrepareReply {
    pub transaction: TransactionId,
    pub kind: TransactionKind,
    pub role: Role,
    pub outcome: PrepareOutcome,
}

impl PrepareReply {
    pub fn accepted(
        transaction: TransactionId,
        kind: TransactionKind,
        role: Role,
        checkpoints: Vec<ComponentCheckpoint>,
    ) -> Self {
        Self {
            transaction,
            kind,
            role,
            outcome: PrepareOutcome::Accepted { checkpoints },
        }
    }

    pub fn rejected(transaction: TransactionId, kind: TransactionKind, role: Role, reason: impl Into<String>) -> Self {
        Self {
            transaction,
            kind,
            role,
            outcome: PrepareOutcome::Rejected {
                reason: reason.into(),
            },
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, PrepareOutcome::Accepted { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Side effects applied; a migration Source attaches the events it
    /// buffered since PREPARE
    Committed {
        #[serde(default)]
        events: Vec<DownstreamEvent>,
    },
    Failed { reason: String },
}

/// A participant's answer to a COMMIT request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommitReply {
    pub transaction: TransactionId,
    pub kind: TransactionKind,
    pub role: Role,
    pub outcome: CommitOutcome,
}

impl CommitReply {
    pub fn committed(
        transaction: TransactionId,
        kind: TransactionKind,
        role: Role,
        events: Vec<DownstreamEvent>,
    ) -> Self {
        Self {
            transaction,
            kind,
            role,
            outcome: CommitOutcome::Committed { events },
        }
    }

    pub fn failed(transaction: TransactionId, kind: TransactionKind, role: Role, reason: impl Into<String>) -> Self {
        Self {
            transaction,
            kind,
            role,
            outcome: CommitOutcome::Failed {
                reason: reason.into(),
            },
        }
    }
}

/// Notice sent by the coordinator to a participant when a transaction ends
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionNotice {
    pub transaction: TransactionId,
    pub reason: String,
    /// Instances concerned; empty means all of the participant's instances
    #[serde(default)]
    pub instances: Vec<InstanceId>,
}

impl TransactionNotice {
    pub fn new(transaction: TransactionId, reason: impl Into<String>) -> Self {
        Self {
            transaction,
            reason: reason.into(),
            instances: Vec::new(),
        }
    }

    pub fn with_instances(mut self, instances: Vec<InstanceId>) -> Self {
        self.instances = instances;
        self
    }

    pub fn concerns(&self, instance_id: &InstanceId) -> bool {
        self.instances.is_empty() || self.instances.contains(instance_id)
    }
}

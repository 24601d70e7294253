use serde::{Deserialize, Serialize};

use crate::{
    messages::{
        downstream_event::ForwardedEvents,
        error::ValidationError,
        params::{MigrationRequestParams, RealizationRequestParams},
        reply::{CommitReply, PrepareReply, TransactionNotice},
    },
    types::{SessionId, TransactionId},
};

/// Every message exchanged between runtime containers.
///
/// Requests travel as raw params and are validated by the receiver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ProtocolMessage {
    MigrationPrepare(MigrationRequestParams),
    MigrationCommit(MigrationRequestParams),
    MigrationCancel(TransactionNotice),
    MigrationRestore(TransactionNotice),
    MigrationComplete(TransactionNotice),
    MigrationEvents(ForwardedEvents),
    RealizationPrepare(RealizationRequestParams),
    RealizationCommit(RealizationRequestParams),
    RealizationCancel(TransactionNotice),
    PrepareReply(PrepareReply),
    CommitReply(CommitReply),
}

impl ProtocolMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolMessage::MigrationPrepare(_) => "migration_prepare",
            ProtocolMessage::MigrationCommit(_) => "migration_commit",
            ProtocolMessage::MigrationCancel(_) => "migration_cancel",
            ProtocolMessage::MigrationRestore(_) => "migration_restore",
            ProtocolMessage::MigrationComplete(_) => "migration_complete",
            ProtocolMessage::MigrationEvents(_) => "migration_events",
            ProtocolMessage::RealizationPrepare(_) => "realization_prepare",
            ProtocolMessage::RealizationCommit(_) => "realization_commit",
            ProtocolMessage::RealizationCancel(_) => "realization_cancel",
            ProtocolMessage::PrepareReply(_) => "prepare_reply",
            ProtocolMessage::CommitReply(_) => "commit_reply",
        }
    }

    /// Transaction id carried by the message, if it can be read without validation
    pub fn transaction_id(&self) -> Option<TransactionId> {
        match self {
            ProtocolMessage::MigrationPrepare(params) | ProtocolMessage::MigrationCommit(params) => params
                .migration
                .as_ref()
                .and_then(|m| m.mid.as_deref())
                .map(TransactionId::from),
            ProtocolMessage::RealizationPrepare(params) | ProtocolMessage::RealizationCommit(params) => params
                .realization
                .as_ref()
                .and_then(|r| r.id.as_deref())
                .map(TransactionId::from),
            ProtocolMessage::MigrationCancel(notice)
            | ProtocolMessage::MigrationRestore(notice)
            | ProtocolMessage::MigrationComplete(notice)
            | ProtocolMessage::RealizationCancel(notice) => Some(notice.transaction.clone()),
            ProtocolMessage::MigrationEvents(forwarded) => Some(forwarded.transaction.clone()),
            ProtocolMessage::PrepareReply(reply) => Some(reply.transaction.clone()),
            ProtocolMessage::CommitReply(reply) => Some(reply.transaction.clone()),
        }
    }
}

/// A routed message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: SessionId,
    pub to: SessionId,
    pub message: ProtocolMessage,
}

impl Envelope {
    pub fn new(from: SessionId, to: SessionId, message: ProtocolMessage) -> Self {
        Self { from, to, message }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(text: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(text).map_err(|err| ValidationError::Malformed {
            reason: err.to_string(),
        })
    }
}

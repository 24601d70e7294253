use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{InstanceId, TransactionId};

/// An input event destined for a component instance.
///
/// `sequence` is assigned by the device that first received the event and
/// fixes its replay order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DownstreamEvent {
    pub instance: InstanceId,
    pub sequence: u64,
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

impl DownstreamEvent {
    pub fn new(instance: impl Into<InstanceId>, sequence: u64, name: impl Into<String>, payload: Value) -> Self {
        Self {
            instance: instance.into(),
            sequence,
            name: name.into(),
            payload,
        }
    }
}

/// Input a migration Source received after its own COMMIT, sent on to the
/// Target once the migration ends
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForwardedEvents {
    pub transaction: TransactionId,
    pub events: Vec<DownstreamEvent>,
}

impl ForwardedEvents {
    pub fn new(transaction: TransactionId, events: Vec<DownstreamEvent>) -> Self {
        Self { transaction, events }
    }
}

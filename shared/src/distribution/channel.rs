use serde::{Deserialize, Serialize};

use crate::types::InstanceId;

/// A named communication channel between component instances
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    name: String,
    #[serde(default)]
    participants: Vec<InstanceId>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            participants: Vec::new(),
        }
    }

    pub fn with_participants(mut self, participants: Vec<InstanceId>) -> Self {
        self.participants = participants;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn participants(&self) -> &[InstanceId] {
        &self.participants
    }
}

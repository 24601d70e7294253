use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::SessionId;

/// A container feature: matched on id, version and class together
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DVFeature {
    pub id: String,
    pub version: String,
    pub class: String,
}

impl DVFeature {
    pub fn new(id: impl Into<String>, version: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            class: class.into(),
        }
    }
}

/// An activity/entity/operation triple a component requires or exposes
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityTriple {
    pub activity: String,
    pub entity: String,
    pub operation: String,
}

impl CapabilityTriple {
    pub fn new(activity: impl Into<String>, entity: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            entity: entity.into(),
            operation: operation.into(),
        }
    }
}

/// What a device advertises about its runtime container
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceProfile {
    session_id: SessionId,
    features: HashSet<DVFeature>,
}

impl DeviceProfile {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            features: HashSet::new(),
        }
    }

    pub fn with_feature(mut self, feature: DVFeature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn has_feature(&self, feature: &DVFeature) -> bool {
        self.features.contains(feature)
    }

    pub fn supports_all<'a>(&self, features: impl IntoIterator<Item = &'a DVFeature>) -> bool {
        features.into_iter().all(|feature| self.has_feature(feature))
    }
}

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::types::{ComponentTypeId, InstanceId};

/// Identifies one component instance placed in a Distribution.
///
/// Two items are equal when their instance ids are equal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentItem {
    instance_id: InstanceId,
    component_type_id: ComponentTypeId,
    #[serde(default)]
    capabilities: Vec<String>,
}

impl ComponentItem {
    pub fn new(instance_id: impl Into<InstanceId>, component_type_id: impl Into<ComponentTypeId>) -> Self {
        Self {
            instance_id: instance_id.into(),
            component_type_id: component_type_id.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn component_type_id(&self) -> &ComponentTypeId {
        &self.component_type_id
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Same instance, hosted as a different component type
    pub fn substituted(&self, component_type_id: ComponentTypeId) -> Self {
        Self {
            instance_id: self.instance_id.clone(),
            component_type_id,
            capabilities: self.capabilities.clone(),
        }
    }

    pub fn matches(&self, instance_id: &InstanceId, component_type_id: &ComponentTypeId) -> bool {
        self.instance_id == *instance_id && self.component_type_id == *component_type_id
    }

    pub fn to_ref(&self) -> ComponentRef {
        ComponentRef {
            instance: self.instance_id.clone(),
            component: self.component_type_id.clone(),
        }
    }
}

impl PartialEq for ComponentItem {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Eq for ComponentItem {}

impl Hash for ComponentItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instance_id.hash(state);
    }
}

/// Wire-level reference to a component: `{instance, component}`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    pub instance: InstanceId,
    pub component: ComponentTypeId,
}

impl From<&ComponentRef> for ComponentItem {
    fn from(reference: &ComponentRef) -> Self {
        ComponentItem::new(reference.instance.clone(), reference.component.clone())
    }
}

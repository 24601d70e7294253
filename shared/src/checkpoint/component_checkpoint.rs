use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    checkpoint::error::CheckpointError,
    types::{ComponentTypeId, InstanceId},
};

/// One captured property: `{name, value, type}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointProperty {
    pub name: String,
    pub value: Value,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Snapshot of a component's exposed property state, taken by the Source
/// right before teardown and restored exactly once by the Target.
///
/// Properties keep insertion order. The checkpoint only grows until `clear()`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComponentCheckpoint {
    #[serde(rename = "instance")]
    instance_id: InstanceId,
    #[serde(rename = "component")]
    component_type_id: ComponentTypeId,
    properties: Vec<CheckpointProperty>,
}

// Every field optional so that decoding can report what is missing
#[derive(Deserialize)]
struct RawCheckpoint {
    instance: Option<String>,
    component: Option<String>,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Deserialize)]
struct RawProperty {
    name: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl ComponentCheckpoint {
    pub fn new(instance_id: impl Into<InstanceId>, component_type_id: impl Into<ComponentTypeId>) -> Self {
        Self {
            instance_id: instance_id.into(),
            component_type_id: component_type_id.into(),
            properties: Vec::new(),
        }
    }

    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    pub fn component_type_id(&self) -> &ComponentTypeId {
        &self.component_type_id
    }

    pub fn properties(&self) -> &[CheckpointProperty] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&CheckpointProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Appends a property. `name` and `kind` must be non-empty, `value` may be null.
    pub fn add_property(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        kind: &str,
    ) -> Result<(), CheckpointError> {
        if name.trim().is_empty() {
            return Err(CheckpointError::InvalidArgument { argument: "name" });
        }
        if kind.trim().is_empty() {
            return Err(CheckpointError::InvalidArgument { argument: "type" });
        }

        self.properties.push(CheckpointProperty {
            name: name.to_string(),
            value: value.into(),
            kind: kind.to_string(),
        });
        Ok(())
    }

    pub fn verify_instance(&self, instance_id: &InstanceId) -> Result<(), CheckpointError> {
        if &self.instance_id != instance_id {
            return Err(CheckpointError::InstanceMismatch {
                expected: instance_id.to_string(),
                actual: self.instance_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.properties.clear();
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn serialize(&self) -> String {
        self.to_value().to_string()
    }

    pub fn deserialize(serialized: &str) -> Result<Self, CheckpointError> {
        let value: Value =
            serde_json::from_str(serialized).map_err(|err| CheckpointError::Malformed {
                reason: err.to_string(),
            })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, CheckpointError> {
        let raw: RawCheckpoint =
            serde_json::from_value(value).map_err(|err| CheckpointError::Malformed {
                reason: err.to_string(),
            })?;

        let instance = raw
            .instance
            .filter(|s| !s.is_empty())
            .ok_or(CheckpointError::InvalidArgument { argument: "instance" })?;
        let component = raw
            .component
            .filter(|s| !s.is_empty())
            .ok_or(CheckpointError::InvalidArgument {
                argument: "component",
            })?;

        let mut checkpoint = ComponentCheckpoint::new(instance, component);
        for property in raw.properties {
            checkpoint.add_property(
                property.name.as_deref().unwrap_or_default(),
                property.value,
                property.kind.as_deref().unwrap_or_default(),
            )?;
        }
        Ok(checkpoint)
    }
}

impl<'de> Deserialize<'de> for ComponentCheckpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        ComponentCheckpoint::from_value(value).map_err(D::Error::custom)
    }
}

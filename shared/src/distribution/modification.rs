use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    distribution::{
        component_item::{ComponentItem, ComponentRef},
        error::ModificationError,
    },
    types::{ComponentTypeId, InstanceId, ModificationId, SessionId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationType {
    /// First-time placement, only legal inside a Realization
    #[serde(alias = "CREATE")]
    Create,
    /// Relocate running components onto the target device
    #[serde(alias = "ADD")]
    Add,
    /// Remove running components from the target device
    #[serde(alias = "REM")]
    Rem,
}

impl ModificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationType::Create => "create",
            ModificationType::Add => "add",
            ModificationType::Rem => "rem",
        }
    }
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModificationType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "create" => Ok(ModificationType::Create),
            "add" => Ok(ModificationType::Add),
            "rem" => Ok(ModificationType::Rem),
            _ => Err(()),
        }
    }
}

/// One requested change of components on one target device
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistributionModification {
    mod_id: ModificationId,
    mod_type: ModificationType,
    target: SessionId,
    components: Vec<ComponentItem>,
}

impl DistributionModification {
    pub fn new(
        mod_id: impl Into<ModificationId>,
        mod_type: ModificationType,
        target: impl Into<SessionId>,
        components: Vec<ComponentItem>,
    ) -> Result<Self, ModificationError> {
        let mod_id = mod_id.into();
        if components.is_empty() {
            return Err(ModificationError::EmptyComponents {
                mod_id: mod_id.to_string(),
            });
        }

        Ok(Self {
            mod_id,
            mod_type,
            target: target.into(),
            components,
        })
    }

    pub fn mod_id(&self) -> &ModificationId {
        &self.mod_id
    }

    pub fn mod_type(&self) -> ModificationType {
        self.mod_type
    }

    pub fn target(&self) -> &SessionId {
        &self.target
    }

    pub fn components(&self) -> &[ComponentItem] {
        &self.components
    }

    pub fn contains_component(
        &self,
        instance_id: &InstanceId,
        component_type_id: &ComponentTypeId,
    ) -> bool {
        self.find_component(instance_id, component_type_id).is_some()
    }

    pub fn find_component(
        &self,
        instance_id: &InstanceId,
        component_type_id: &ComponentTypeId,
    ) -> Option<&ComponentItem> {
        self.components
            .iter()
            .find(|item| item.matches(instance_id, component_type_id))
    }

    pub fn serializable(&self) -> SerializedModification {
        SerializedModification::from(self)
    }
}

/// Flat wire form: `{modid, type, target, components:[{instance, component}]}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedModification {
    pub modid: ModificationId,
    #[serde(rename = "type")]
    pub mod_type: ModificationType,
    pub target: SessionId,
    pub components: Vec<ComponentRef>,
}

impl From<&DistributionModification> for SerializedModification {
    fn from(modification: &DistributionModification) -> Self {
        Self {
            modid: modification.mod_id.clone(),
            mod_type: modification.mod_type,
            target: modification.target.clone(),
            components: modification
                .components
                .iter()
                .map(ComponentItem::to_ref)
                .collect(),
        }
    }
}

impl TryFrom<SerializedModification> for DistributionModification {
    type Error = ModificationError;

    fn try_from(serialized: SerializedModification) -> Result<Self, Self::Error> {
        let components = serialized
            .components
            .iter()
            .map(ComponentItem::from)
            .collect();
        DistributionModification::new(
            serialized.modid,
            serialized.mod_type,
            serialized.target,
            components,
        )
    }
}

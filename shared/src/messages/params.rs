//! Raw wire payloads.
//!
//! Every field is optional so that a malformed request deserializes and can
//! then be rejected field by field during validation into the typed requests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    acl::access_control_manager::Acl,
    checkpoint::component_checkpoint::ComponentCheckpoint,
    distribution::{
        component_item::ComponentItem,
        modification::{DistributionModification, ModificationType},
    },
    messages::{downstream_event::DownstreamEvent, error::ValidationError},
    types::{InstanceId, Role},
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawComponentRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawModification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modid: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub mod_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<RawComponentRef>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawMigration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initdev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub srcdev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Vec<RawModification>>,
}

/// `{crole, migration, cstates?, devents?, acls?}`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationRequestParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crole: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<RawMigration>,
    /// Object keyed by instance id, or a JSON string holding that object
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cstates: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devents: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acls: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRealization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifications: Option<Vec<RawModification>>,
}

/// `{rrole, realization, acls?}`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealizationRequestParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rrole: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realization: Option<RawRealization>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acls: Option<Value>,
}

pub(crate) fn required<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, ValidationError> {
    value.as_ref().ok_or_else(|| ValidationError::MissingField {
        field: field.to_string(),
    })
}

pub(crate) fn parse_role(value: &Option<String>, field: &'static str) -> Result<Role, ValidationError> {
    let role = required(value, field)?;
    match role.as_str() {
        "source" => Ok(Role::Source),
        "target" => Ok(Role::Target),
        other => Err(ValidationError::InvalidRole {
            field,
            value: other.to_string(),
        }),
    }
}

impl RawModification {
    /// Checks that `modid`, `type`, `target` and `components` are all present
    /// and well formed. `path` prefixes field names in errors.
    pub fn validate(&self, path: &str) -> Result<DistributionModification, ValidationError> {
        let modid = required(&self.modid, &format!("{}.modid", path))?;
        let raw_type = required(&self.mod_type, &format!("{}.type", path))?;
        let components = required(&self.components, &format!("{}.components", path))?;
        let target = required(&self.target, &format!("{}.target", path))?;

        let mod_type: ModificationType =
            raw_type
                .parse()
                .map_err(|_| ValidationError::InvalidModificationType {
                    modid: modid.clone(),
                    value: raw_type.clone(),
                })?;

        let mut items = Vec::with_capacity(components.len());
        for (index, component) in components.iter().enumerate() {
            let instance = required(
                &component.instance,
                &format!("{}.components[{}].instance", path, index),
            )?;
            let component_type = required(
                &component.component,
                &format!("{}.components[{}].component", path, index),
            )?;
            items.push(ComponentItem::new(instance.as_str(), component_type.as_str()));
        }

        DistributionModification::new(modid.as_str(), mod_type, target.as_str(), items).map_err(
            |_| ValidationError::EmptyComponents {
                modid: modid.clone(),
            },
        )
    }
}

impl From<&DistributionModification> for RawModification {
    fn from(modification: &DistributionModification) -> Self {
        Self {
            modid: Some(modification.mod_id().to_string()),
            mod_type: Some(modification.mod_type().to_string()),
            target: Some(modification.target().to_string()),
            components: Some(
                modification
                    .components()
                    .iter()
                    .map(|item| RawComponentRef {
                        instance: Some(item.instance_id().to_string()),
                        component: Some(item.component_type_id().to_string()),
                    })
                    .collect(),
            ),
        }
    }
}

pub(crate) fn validate_modifications(
    raw: &[RawModification],
    path: &str,
) -> Result<Vec<DistributionModification>, ValidationError> {
    raw.iter()
        .enumerate()
        .map(|(index, m)| m.validate(&format!("{}.modifications[{}]", path, index)))
        .collect()
}

/// Decodes `cstates`: an object keyed by instance id, or a string holding one
pub fn decode_checkpoint_states(value: &Value) -> Result<Vec<ComponentCheckpoint>, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidCheckpointStates { reason };

    let object = match value {
        Value::Null => return Ok(Vec::new()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(invalid("string does not hold an object".to_string())),
            Err(err) => return Err(invalid(err.to_string())),
        },
        Value::Object(object) => object.clone(),
        _ => return Err(invalid("expected an object or a JSON string".to_string())),
    };

    let mut checkpoints = Vec::with_capacity(object.len());
    for (instance, state) in object {
        let state = match state {
            Value::String(text) => serde_json::from_str(&text).map_err(|err| invalid(err.to_string()))?,
            other => other,
        };
        let checkpoint =
            ComponentCheckpoint::from_value(state).map_err(|err| invalid(err.to_string()))?;
        checkpoint
            .verify_instance(&InstanceId::from(instance))
            .map_err(|err| invalid(err.to_string()))?;
        checkpoints.push(checkpoint);
    }
    Ok(checkpoints)
}

pub fn encode_checkpoint_states(checkpoints: &[ComponentCheckpoint]) -> Value {
    let mut object = Map::new();
    for checkpoint in checkpoints {
        object.insert(checkpoint.instance_id().to_string(), checkpoint.to_value());
    }
    Value::Object(object)
}

pub fn decode_events(values: &[Value]) -> Result<Vec<DownstreamEvent>, ValidationError> {
    values
        .iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value.clone()).map_err(|err| ValidationError::InvalidEvent {
                index,
                reason: err.to_string(),
            })
        })
        .collect()
}

pub fn encode_events(events: &[DownstreamEvent]) -> Vec<Value> {
    events
        .iter()
        .filter_map(|event| serde_json::to_value(event).ok())
        .collect()
}

pub fn decode_acls(value: &Option<Value>) -> Result<BTreeMap<InstanceId, Acl>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|err| ValidationError::InvalidAcl {
            reason: err.to_string(),
        }),
    }
}

pub fn encode_acls(acls: &BTreeMap<InstanceId, Acl>) -> Option<Value> {
    if acls.is_empty() {
        return None;
    }
    serde_json::to_value(acls).ok()
}

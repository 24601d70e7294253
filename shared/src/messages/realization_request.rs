use std::collections::BTreeMap;

use crate::{
    acl::access_control_manager::Acl,
    distribution::modification::{DistributionModification, ModificationType},
    messages::{
        error::ValidationError,
        params::{
            decode_acls, encode_acls, parse_role, required, validate_modifications,
            RawModification, RawRealization, RealizationRequestParams,
        },
    },
    types::{InstanceId, Role, SessionId, TransactionId},
};

/// The `realization` object of a request: `{id, initiator, modifications}`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealizationDescriptor {
    pub id: TransactionId,
    pub initiator: SessionId,
    pub modifications: Vec<DistributionModification>,
}

impl RealizationDescriptor {
    /// Same structural rules as a migration; every type must be CREATE
    pub fn from_raw(raw: &RawRealization) -> Result<Self, ValidationError> {
        let id = required(&raw.id, "realization.id")?;
        let initiator = required(&raw.initiator, "realization.initiator")?;
        let raw_modifications = required(&raw.modifications, "realization.modifications")?;

        if raw_modifications.is_empty() {
            return Err(ValidationError::EmptyModifications {
                transaction: id.clone(),
            });
        }

        let modifications = validate_modifications(raw_modifications, "realization")?;
        for modification in &modifications {
            if modification.mod_type() != ModificationType::Create {
                return Err(ValidationError::UnexpectedModificationType {
                    modid: modification.mod_id().to_string(),
                    expected: "a realization only accepts create",
                    actual: modification.mod_type().to_string(),
                });
            }
        }

        Ok(Self {
            id: id.as_str().into(),
            initiator: initiator.as_str().into(),
            modifications,
        })
    }

    pub fn to_raw(&self) -> RawRealization {
        RawRealization {
            id: Some(self.id.to_string()),
            initiator: Some(self.initiator.to_string()),
            modifications: Some(self.modifications.iter().map(RawModification::from).collect()),
        }
    }

    pub fn targeting<'a>(
        &'a self,
        session: &'a SessionId,
    ) -> impl Iterator<Item = &'a DistributionModification> + 'a {
        self.modifications
            .iter()
            .filter(move |m| m.target() == session)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealizationPrepareRequest {
    pub role: Role,
    pub realization: RealizationDescriptor,
}

impl TryFrom<&RealizationRequestParams> for RealizationPrepareRequest {
    type Error = ValidationError;

    fn try_from(params: &RealizationRequestParams) -> Result<Self, Self::Error> {
        let role = parse_role(&params.rrole, "rrole")?;
        let raw = required(&params.realization, "realization")?;
        Ok(Self {
            role,
            realization: RealizationDescriptor::from_raw(raw)?,
        })
    }
}

impl RealizationPrepareRequest {
    pub fn to_params(&self) -> RealizationRequestParams {
        RealizationRequestParams {
            rrole: Some(self.role.to_string()),
            realization: Some(self.realization.to_raw()),
            acls: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RealizationCommitRequest {
    pub role: Role,
    pub realization: RealizationDescriptor,
    /// ACLs of instances created as shared
    pub acls: BTreeMap<InstanceId, Acl>,
}

impl TryFrom<&RealizationRequestParams> for RealizationCommitRequest {
    type Error = ValidationError;

    fn try_from(params: &RealizationRequestParams) -> Result<Self, Self::Error> {
        let RealizationPrepareRequest { role, realization } =
            RealizationPrepareRequest::try_from(params)?;
        Ok(Self {
            role,
            realization,
            acls: decode_acls(&params.acls)?,
        })
    }
}

impl RealizationCommitRequest {
    pub fn to_params(&self) -> RealizationRequestParams {
        RealizationRequestParams {
            rrole: Some(self.role.to_string()),
            realization: Some(self.realization.to_raw()),
            acls: encode_acls(&self.acls),
        }
    }
}

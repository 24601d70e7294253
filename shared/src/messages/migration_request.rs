use std::collections::BTreeMap;

use crate::{
    acl::access_control_manager::Acl,
    checkpoint::component_checkpoint::ComponentCheckpoint,
    distribution::modification::{DistributionModification, ModificationType},
    messages::{
        downstream_event::DownstreamEvent,
        error::ValidationError,
        params::{
            decode_acls, decode_checkpoint_states, decode_events, encode_acls,
            encode_checkpoint_states, encode_events, parse_role, required,
            validate_modifications, MigrationRequestParams, RawMigration, RawModification,
        },
    },
    types::{InstanceId, Role, SessionId, TransactionId},
};

/// The `migration` object of a request: `{mid, initdev, srcdev, modifications}`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationDescriptor {
    pub id: TransactionId,
    pub initiator: SessionId,
    pub source: SessionId,
    pub modifications: Vec<DistributionModification>,
}

impl MigrationDescriptor {
    pub fn from_raw(raw: &RawMigration) -> Result<Self, ValidationError> {
        let id = required(&raw.mid, "migration.mid")?;
        let initiator = required(&raw.initdev, "migration.initdev")?;
        let source = required(&raw.srcdev, "migration.srcdev")?;
        let raw_modifications = required(&raw.modifications, "migration.modifications")?;

        if raw_modifications.is_empty() {
            return Err(ValidationError::EmptyModifications {
                transaction: id.clone(),
            });
        }

        let modifications = validate_modifications(raw_modifications, "migration")?;
        for modification in &modifications {
            if modification.mod_type() == ModificationType::Create {
                return Err(ValidationError::UnexpectedModificationType {
                    modid: modification.mod_id().to_string(),
                    expected: "create is only allowed in a realization",
                    actual: modification.mod_type().to_string(),
                });
            }
        }

        Ok(Self {
            id: id.as_str().into(),
            initiator: initiator.as_str().into(),
            source: source.as_str().into(),
            modifications,
        })
    }

    pub fn to_raw(&self) -> RawMigration {
        RawMigration {
            mid: Some(self.id.to_string()),
            initdev: Some(self.initiator.to_string()),
            srcdev: Some(self.source.to_string()),
            modifications: Some(self.modifications.iter().map(RawModification::from).collect()),
        }
    }

    /// Modifications whose components leave `session`: ADDs out of the
    /// source device and REMs on `session` itself
    pub fn leaving<'a>(
        &'a self,
        session: &'a SessionId,
    ) -> impl Iterator<Item = &'a DistributionModification> + 'a {
        let is_source = self.source == *session;
        self.modifications.iter().filter(move |m| match m.mod_type() {
            ModificationType::Add => is_source,
            ModificationType::Rem => m.target() == session,
            ModificationType::Create => false,
        })
    }

    /// ADD modifications that place components on `session`
    pub fn arriving<'a>(
        &'a self,
        session: &'a SessionId,
    ) -> impl Iterator<Item = &'a DistributionModification> + 'a {
        self.modifications
            .iter()
            .filter(move |m| m.mod_type() == ModificationType::Add && m.target() == session)
    }
}

/// Fields common to every migration request: the role and the migration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationRequest {
    pub role: Role,
    pub migration: MigrationDescriptor,
}

impl TryFrom<&MigrationRequestParams> for MigrationRequest {
    type Error = ValidationError;

    fn try_from(params: &MigrationRequestParams) -> Result<Self, Self::Error> {
        let role = parse_role(&params.crole, "crole")?;
        let raw = required(&params.migration, "migration")?;
        let migration = MigrationDescriptor::from_raw(raw)?;
        Ok(Self { role, migration })
    }
}

impl MigrationRequest {
    fn to_params(&self) -> MigrationRequestParams {
        MigrationRequestParams {
            crole: Some(self.role.to_string()),
            migration: Some(self.migration.to_raw()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationPrepareRequest {
    pub role: Role,
    pub migration: MigrationDescriptor,
}

impl TryFrom<&MigrationRequestParams> for MigrationPrepareRequest {
    type Error = ValidationError;

    fn try_from(params: &MigrationRequestParams) -> Result<Self, Self::Error> {
        let MigrationRequest { role, migration } = MigrationRequest::try_from(params)?;
        Ok(Self { role, migration })
    }
}

impl MigrationPrepareRequest {
    pub fn to_params(&self) -> MigrationRequestParams {
        MigrationRequest {
            role: self.role,
            migration: self.migration.clone(),
        }
        .to_params()
    }
}

/// What the Target needs to finish a migration
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TargetCommitPayload {
    pub checkpoints: Vec<ComponentCheckpoint>,
    pub events: Vec<DownstreamEvent>,
    pub acls: BTreeMap<InstanceId, Acl>,
}

impl TargetCommitPayload {
    pub fn checkpoint_for(&self, instance_id: &InstanceId) -> Option<&ComponentCheckpoint> {
        self.checkpoints
            .iter()
            .find(|c| c.instance_id() == instance_id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommitRole {
    Source,
    Target(TargetCommitPayload),
}

impl CommitRole {
    pub fn role(&self) -> Role {
        match self {
            CommitRole::Source => Role::Source,
            CommitRole::Target(_) => Role::Target,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MigrationCommitRequest {
    pub role: CommitRole,
    pub migration: MigrationDescriptor,
}

impl TryFrom<&MigrationRequestParams> for MigrationCommitRequest {
    type Error = ValidationError;

    fn try_from(params: &MigrationRequestParams) -> Result<Self, Self::Error> {
        let MigrationRequest { role, migration } = MigrationRequest::try_from(params)?;

        let role = match role {
            Role::Target => {
                let checkpoints = match &params.cstates {
                    Some(value) => decode_checkpoint_states(value)?,
                    None => Vec::new(),
                };
                let events = match &params.devents {
                    Some(values) => decode_events(values)?,
                    None => Vec::new(),
                };
                let acls = decode_acls(&params.acls)?;
                CommitRole::Target(TargetCommitPayload {
                    checkpoints,
                    events,
                    acls,
                })
            }
            _ => CommitRole::Source,
        };

        Ok(Self { role, migration })
    }
}

impl MigrationCommitRequest {
    pub fn to_params(&self) -> MigrationRequestParams {
        let mut params = MigrationRequest {
            role: self.role.role(),
            migration: self.migration.clone(),
        }
        .to_params();

        if let CommitRole::Target(payload) = &self.role {
            params.cstates = Some(encode_checkpoint_states(&payload.checkpoints));
            params.devents = Some(encode_events(&payload.events));
            params.acls = encode_acls(&payload.acls);
        }
        params
    }
}

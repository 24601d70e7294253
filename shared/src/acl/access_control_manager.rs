use std::collections::BTreeMap;

use log::{info, warn};

use crate::{
    acl::{access_right::AccessRight, error::AclError},
    checked_map::CheckedMap,
    types::{InstanceId, UserId},
};

pub type Acl = BTreeMap<UserId, AccessRight>;

/// Per-instance access control lists for shared components.
///
/// Entries are created on first share and never removed implicitly, since a
/// component may be shared again later.
#[derive(Default)]
pub struct AccessControlManager {
    registry: CheckedMap<InstanceId, Acl>,
}

impl AccessControlManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the ACL of a newly shared instance
    ///
    /// # Panics
    ///
    /// Panics if an ACL is already registered for the instance.
    /// Consider using `try_register_component_acl` for non-panicking error handling.
    pub fn register_component_acl(&mut self, instance_id: &InstanceId, acl: Acl) {
        self.try_register_component_acl(instance_id, acl)
            .expect("Component instance cannot register its ACL more than once!")
    }

    /// Register the ACL of a newly shared instance
    ///
    /// Returns an error if an ACL is already registered; there is no merge.
    pub fn try_register_component_acl(
        &mut self,
        instance_id: &InstanceId,
        acl: Acl,
    ) -> Result<(), AclError> {
        self.registry
            .try_insert(instance_id.clone(), acl)
            .map_err(|_| AclError::AlreadyRegistered {
                instance_id: instance_id.to_string(),
            })?;
        info!("registered ACL for component instance {}", instance_id);
        Ok(())
    }

    pub fn get_acl(&self, instance_id: &InstanceId) -> Option<&Acl> {
        self.registry.get(instance_id)
    }

    pub fn get_user_right(&self, instance_id: &InstanceId, user_id: &UserId) -> Option<&AccessRight> {
        self.registry.get(instance_id)?.get(user_id)
    }

    /// Set `user_id`'s right on the instance, creating the ACL if needed.
    ///
    /// Returns whether anything changed; re-applying the same right is a no-op.
    pub fn update_acl(&mut self, instance_id: &InstanceId, user_id: &UserId, right: AccessRight) -> bool {
        if self.get_user_right(instance_id, user_id) == Some(&right) {
            return false;
        }

        match self.registry.get_mut(instance_id) {
            Some(acl) => {
                acl.insert(user_id.clone(), right);
            }
            None => {
                let mut acl = Acl::new();
                acl.insert(user_id.clone(), right);
                self.register_absent(instance_id, acl);
            }
        }
        true
    }

    /// Registers `acl` if the instance has none yet, otherwise overrides the
    /// registered rights entry by entry
    pub fn apply_acl(&mut self, instance_id: &InstanceId, acl: Acl) {
        match self.registry.get_mut(instance_id) {
            Some(registered) => registered.extend(acl),
            None => self.register_absent(instance_id, acl),
        }
    }

    // Only called once the registry lookup came back empty
    fn register_absent(&mut self, instance_id: &InstanceId, acl: Acl) {
        if let Err(error) = self.try_register_component_acl(instance_id, acl) {
            warn!("{}", error);
        }
    }

    pub fn is_shared(&self, instance_id: &InstanceId) -> bool {
        self.registry.contains_key(instance_id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

use thiserror::Error;

/// Errors that can occur in the AccessControlManager registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AclError {
    /// An ACL exists for this instance already; rights changes go through `update_acl`
    #[error("ACL for component instance {instance_id} is already registered")]
    AlreadyRegistered { instance_id: String },
}

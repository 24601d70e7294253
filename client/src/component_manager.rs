use thiserror::Error;

use mashup_shared::{ComponentCheckpoint, ComponentItem, DownstreamEvent};

/// Errors reported by the component collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentManagerError {
    /// The component could not be created
    #[error("Failed to instantiate component instance {instance_id}: {reason}")]
    InstantiationFailed { instance_id: String, reason: String },

    /// The component's property state could not be captured
    #[error("Failed to checkpoint component instance {instance_id}: {reason}")]
    CheckpointFailed { instance_id: String, reason: String },

    /// The component could not be torn down
    #[error("Failed to tear down component instance {instance_id}: {reason}")]
    TeardownFailed { instance_id: String, reason: String },

    /// The component refused an input event
    #[error("Failed to deliver event {event} to component instance {instance_id}")]
    DeliveryFailed { instance_id: String, event: String },
}

/// Creates, snapshots and destroys the running components of one device.
///
/// Rendering, UI notification and the component internals live behind
/// this trait.
pub trait ComponentManager {
    /// Starts `item`, restoring `checkpoint` when one is given
    fn instantiate(
        &mut self,
        item: &ComponentItem,
        checkpoint: Option<&ComponentCheckpoint>,
    ) -> Result<(), ComponentManagerError>;

    /// Captures the exposed property state of a running component
    fn checkpoint(&mut self, item: &ComponentItem) -> Result<ComponentCheckpoint, ComponentManagerError>;

    fn teardown(&mut self, item: &ComponentItem) -> Result<(), ComponentManagerError>;

    fn deliver(&mut self, event: &DownstreamEvent) -> Result<(), ComponentManagerError>;
}

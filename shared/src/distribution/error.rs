use thiserror::Error;

/// Errors raised when mutating a Distribution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributionError {
    /// The component instance is already part of this Distribution
    #[error("Component instance {instance_id} is already part of distribution {distribution_id}")]
    DuplicateComponent {
        distribution_id: String,
        instance_id: String,
    },

    /// The component instance is not part of this Distribution
    #[error("Component instance {instance_id} not found in distribution {distribution_id}")]
    ComponentNotFound {
        distribution_id: String,
        instance_id: String,
    },

    /// No channel with the given name exists in this Distribution
    #[error("Channel {channel_name} not found in distribution {distribution_id}")]
    ChannelNotFound {
        distribution_id: String,
        channel_name: String,
    },
}

/// Errors raised when building a DistributionModification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModificationError {
    /// A modification must name at least one component
    #[error("Modification {mod_id} has no components")]
    EmptyComponents { mod_id: String },

    /// CREATE modifications may only be carried by a Realization
    #[error("Modification {mod_id} is a create and cannot be part of a migration")]
    CreateOutsideRealization { mod_id: String },

    /// A Realization only carries CREATE modifications
    #[error("Modification {mod_id} has type {actual}, a realization requires create")]
    CreateRequired { mod_id: String, actual: String },
}

use thiserror::Error;

/// Errors that can occur while building or decoding a ComponentCheckpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// A required argument was missing or empty
    #[error("Invalid checkpoint argument: {argument} is required")]
    InvalidArgument { argument: &'static str },

    /// The serialized form could not be decoded
    #[error("Malformed checkpoint: {reason}")]
    Malformed { reason: String },

    /// The checkpoint was taken from a different component instance
    #[error("Checkpoint of instance {actual} cannot restore instance {expected}")]
    InstanceMismatch { expected: String, actual: String },
}

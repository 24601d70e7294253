use thiserror::Error;

/// Errors raised while validating an inbound request payload.
///
/// Always fatal to the single request and reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is absent
    #[error("Missing required field '{field}'")]
    MissingField { field: String },

    /// The role field holds a value other than "source" or "target"
    #[error("Invalid role '{value}' in field '{field}' - expected \"source\" or \"target\"")]
    InvalidRole { field: &'static str, value: String },

    /// The modification type is not one of create/add/rem
    #[error("Modification {modid} has unknown type '{value}'")]
    InvalidModificationType { modid: String, value: String },

    /// The modification type is not allowed in this kind of transaction
    #[error("Modification {modid} has type '{actual}', {expected}")]
    UnexpectedModificationType {
        modid: String,
        expected: &'static str,
        actual: String,
    },

    /// A modification lists no components
    #[error("Modification {modid} has no components")]
    EmptyComponents { modid: String },

    /// A transaction lists no modifications
    #[error("Transaction {transaction} has no modifications")]
    EmptyModifications { transaction: String },

    /// `cstates` could not be decoded into checkpoints
    #[error("Invalid component states: {reason}")]
    InvalidCheckpointStates { reason: String },

    /// An entry of `devents` could not be decoded
    #[error("Invalid downstream event at index {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },

    /// `acls` could not be decoded
    #[error("Invalid ACL payload: {reason}")]
    InvalidAcl { reason: String },

    /// The envelope itself could not be decoded
    #[error("Malformed message: {reason}")]
    Malformed { reason: String },
}

//! # Mashup Shared
//! Data model, capability matching, wire payloads and transaction state
//! machines shared by every mashup runtime container.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod acl;
mod checked_map;
mod checkpoint;
mod distribution;
mod messages;
mod options;
mod sequence_list;
mod transaction;
mod types;

pub use acl::{
    access_control_manager::{AccessControlManager, Acl},
    access_right::AccessRight,
    error::AclError,
};
pub use checked_map::{CheckedMap, CheckedMapError};
pub use checkpoint::{
    component_checkpoint::{CheckpointProperty, ComponentCheckpoint},
    error::CheckpointError,
};
pub use distribution::{
    channel::Channel,
    component_item::{ComponentItem, ComponentRef},
    distribution::{Distribution, DistributionChange},
    error::{DistributionError, ModificationError},
    modification::{DistributionModification, ModificationType, SerializedModification},
};
pub use messages::{
    downstream_event::{DownstreamEvent, ForwardedEvents},
    error::ValidationError,
    migration_request::{
        CommitRole, MigrationCommitRequest, MigrationDescriptor, MigrationPrepareRequest,
        MigrationRequest, TargetCommitPayload,
    },
    params::{
        decode_acls, decode_checkpoint_states, decode_events, encode_acls,
        encode_checkpoint_states, encode_events, MigrationRequestParams, RawComponentRef,
        RawMigration, RawModification, RawRealization, RealizationRequestParams,
    },
    protocol_message::{Envelope, ProtocolMessage},
    realization_request::{RealizationCommitRequest, RealizationDescriptor, RealizationPrepareRequest},
    reply::{CommitOutcome, CommitReply, PrepareOutcome, PrepareReply, TransactionNotice},
};
pub use options::{
    catalog::{ComponentCatalog, ComponentDescriptor, StaticCatalog},
    feature::{CapabilityTriple, DVFeature, DeviceProfile},
    options_vector::{
        is_executable, DVCandidateItem, DVComponentItem, DVReplacementItem,
        DistributionOptionsVector,
    },
    ranker::{CapabilityCoverageRanker, SubstituteRanker},
};
pub use sequence_list::{SequenceError, SequenceList};
pub use transaction::{
    distributed_transaction::{
        DistributedTransaction, LifecycleEvent, PhaseTimeouts, TransactionCore, TransactionEvent,
        TransactionState,
    },
    error::TransactionError,
    migration::Migration,
    participant::Participant,
    realization::Realization,
};
pub use types::{
    ApplicationContext, ComponentTypeId, InstanceId, ModificationId, Role, SessionId,
    TransactionId, TransactionKind, UserId,
};

//! # Mashup Client
//! A runtime container that hosts part of a mashup application on one
//! device, coordinates Migrations and Realizations of its components and
//! takes part in the ones other devices coordinate.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use mashup_shared::{
        AccessRight, Acl, CapabilityTriple, ComponentCatalog, ComponentCheckpoint,
        ComponentDescriptor, ComponentItem, DVFeature, DeviceProfile, Distribution,
        DistributionChange, DistributionModification, DistributionOptionsVector, DownstreamEvent,
        Envelope, InstanceId, ModificationType, SessionId, StaticCatalog, TransactionEvent,
        TransactionId, TransactionState, UserId,
    };
}

mod component_manager;
mod device;
mod distribution_manager;
mod error;
mod event_buffer;
mod events;
mod runtime_config;

pub use component_manager::{ComponentManager, ComponentManagerError};
pub use device::Device;
pub use distribution_manager::DistributionManager;
pub use error::RuntimeError;
pub use event_buffer::EventBuffer;
pub use events::{
    DistributionChangedEvent, ErrorEvent, RuntimeEvent, RuntimeEvents,
    TransactionCancelledEvent, TransactionCompletedEvent, TransactionFailedEvent,
    TransactionPreparedEvent, TransactionPreparingEvent,
};
pub use runtime_config::RuntimeConfig;

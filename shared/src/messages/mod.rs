pub mod downstream_event;
pub mod error;
pub mod migration_request;
pub mod params;
pub mod protocol_message;
pub mod realization_request;
pub mod reply;

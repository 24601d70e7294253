pub mod channel;
pub mod component_item;
pub mod distribution;
pub mod error;
pub mod modification;

pub mod component_checkpoint;
pub mod error;

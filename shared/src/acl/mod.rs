pub mod access_control_manager;
pub mod access_right;
pub mod error;

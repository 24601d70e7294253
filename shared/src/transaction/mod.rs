pub mod distributed_transaction;
pub mod error;
pub mod migration;
pub mod participant;
pub mod realization;

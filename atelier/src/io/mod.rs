//! Side-effecting collaborators: configuration files and record stores.

pub mod config;
pub mod memory_store;
pub mod sqlite_store;
pub mod store;

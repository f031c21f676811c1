//! Stable exit codes for `atelier` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config, unreadable store, or any other failure.
pub const INVALID: i32 = 1;
/// The requested record does not exist.
pub const NOT_FOUND: i32 = 2;
/// The store holds conflicting version records.
pub const DATA_INTEGRITY: i32 = 3;
/// `atelier check-path` rejected the path.
pub const INVALID_PATH: i32 = 4;

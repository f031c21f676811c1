//! Run and artifact lifecycle engine for agent workspaces.
//!
//! A run invokes a cataloged skill inside a workspace, moves through a fixed
//! phase table, and on success produces a versioned output artifact. The crate
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (path sandbox, skill catalog,
//!   phase machine, version chains). No I/O.
//! - **[`io`]**: Side-effecting collaborators (config files, record stores).
//!
//! [`lifecycle::Coordinator`] composes the two; [`workspace`] adds the
//! workspace-level use cases served over HTTP by `atelier-server`.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod lifecycle;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workspace;

pub use error::Error;

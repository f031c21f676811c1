//! Deterministic, pure logic of the run/artifact lifecycle.
//!
//! Core modules are free of I/O side effects. They operate on in-memory values
//! and return deterministic outputs suitable for tests.

pub mod phase;
pub mod sandbox;
pub mod skills;
pub mod types;
pub mod version_chain;

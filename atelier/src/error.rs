//! Error taxonomy for lifecycle operations.
//!
//! Configuration and CLI plumbing use `anyhow`; everything a service layer
//! needs to map onto a response goes through [`Error`].

use thiserror::Error;

use crate::core::phase::RunPhase;
use crate::core::sandbox::Zone;
use crate::core::types::{EntityKind, RunId};
use crate::io::store::StoreError;

/// Errors returned by the lifecycle coordinator. Never retried internally.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u64 },

    #[error("skill '{0}' is not in the catalog")]
    SkillNotFound(String),

    #[error("path '{path}' is not confined to the {zone}/ zone")]
    InvalidPath { path: String, zone: Zone },

    /// A stored artifact path that lies in neither sandbox zone.
    #[error("path '{path}' is outside the raw/ and out/ zones")]
    OutsideSandbox { path: String },

    #[error("run phase cannot move from {from} to {to}")]
    InvalidTransition { from: RunPhase, to: RunPhase },

    #[error("run {0} can only reach success by completing with an output artifact")]
    CompletionRequired(RunId),

    #[error("runs cannot be created in phase {0}")]
    InvalidInitialPhase(RunPhase),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Duplicate version numbers inside a version group. Indicates a failure
    /// of the store's concurrency control.
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<u64>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }
}

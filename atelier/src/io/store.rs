//! Persistence collaborator: the record interface and the store contract.
//!
//! [`Records`] is what the coordinator reads and writes. A [`Store`] hands out
//! records for consistent reads or for serialized, all-or-nothing transactions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::types::{
    Artifact, ArtifactId, Message, NewArtifact, NewMessage, NewRun, NewWorkspace, Run, RunId,
    Workspace, WorkspaceId,
};
use crate::error::Error;

/// Failures of the persistence layer itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("create store directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("remove store file {}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("open store {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("store query failed")]
    Database(#[source] rusqlite::Error),
    #[error("encode {field}")]
    Encode {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

/// Record access inside a read or a transaction.
///
/// Listings come back in their documented order. Every lookup is keyed by id
/// or scoped to one workspace.
pub trait Records {
    fn workspace(&self, id: WorkspaceId) -> Result<Option<Workspace>, Error>;

    fn artifact(&self, id: ArtifactId) -> Result<Option<Artifact>, Error>;

    fn run(&self, id: RunId) -> Result<Option<Run>, Error>;

    /// All workspaces, newest first.
    fn workspaces(&self) -> Result<Vec<Workspace>, Error>;

    /// Artifacts of a workspace in id order.
    fn artifacts_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Artifact>, Error>;

    /// Members of one version group, ordered by version number.
    fn version_group(&self, workspace_id: WorkspaceId, group: &str)
    -> Result<Vec<Artifact>, Error>;

    /// Runs of a workspace, newest first.
    fn runs_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Run>, Error>;

    /// Messages of a workspace, oldest first.
    fn messages_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Message>, Error>;

    fn insert_workspace(&mut self, new: NewWorkspace) -> Result<Workspace, Error>;

    /// Insert an artifact. A second artifact at an existing
    /// `(workspace, version_group, version_number)` is [`Error::DataIntegrity`].
    fn insert_artifact(&mut self, new: NewArtifact) -> Result<Artifact, Error>;

    /// Insert a run with no outputs and no finish time.
    fn insert_run(&mut self, new: NewRun) -> Result<Run, Error>;

    fn insert_message(&mut self, new: NewMessage) -> Result<Message, Error>;

    /// Replace the stored run carrying `run.id`.
    fn update_run(&mut self, run: &Run) -> Result<(), Error>;

    /// Stamp the publication time. Every other artifact field is immutable.
    fn set_published_at(&mut self, id: ArtifactId, at: DateTime<Utc>) -> Result<Artifact, Error>;
}

/// Durable record storage with serialized transactions.
///
/// `transaction` holds the single writer slot while `f` runs. Its writes become
/// visible only when `f` returns `Ok` and the store has committed them;
/// otherwise nothing changes.
pub trait Store: Send + Sync {
    fn read<T>(&self, f: impl FnOnce(&dyn Records) -> Result<T, Error>) -> Result<T, Error>;

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut dyn Records) -> Result<T, Error>,
    ) -> Result<T, Error>;
}

//! Shared record types for the run/artifact lifecycle.
//!
//! These are plain values retrieved from and written back to the store. Core
//! logic never holds long-lived references to them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::phase::RunPhase;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

record_id!(
    /// Identity of a [`Workspace`].
    WorkspaceId
);
record_id!(
    /// Identity of an [`Artifact`].
    ArtifactId
);
record_id!(
    /// Identity of a [`Run`].
    RunId
);
record_id!(
    /// Identity of a [`Message`].
    MessageId
);

/// Entity families held by the store, used when reporting missing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Workspace,
    Artifact,
    Run,
    Message,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Workspace => "workspace",
            EntityKind::Artifact => "artifact",
            EntityKind::Run => "run",
            EntityKind::Message => "message",
        })
    }
}

/// Isolation boundary owning artifacts, runs, and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub owner_user_id: String,
    /// Opaque to the lifecycle engine.
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// A versioned file reference within a workspace.
///
/// Within one `(workspace_id, version_group)` pair, `version_number` values are
/// unique; ordered by version number they form the artifact's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub workspace_id: WorkspaceId,
    /// Sandboxed storage path (`raw/...` or `out/...`).
    pub path: String,
    /// Content type tag (`pptx`, `pdf`, `text`, ...).
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub version_group: String,
    pub version_number: u32,
    pub source_run_id: Option<RunId>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One invocation of a cataloged skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub workspace_id: WorkspaceId,
    pub skill_name: String,
    #[serde(rename = "status")]
    pub phase: RunPhase,
    pub prompt: String,
    pub params: Map<String, Value>,
    pub input_artifact_ids: Vec<ArtifactId>,
    pub output_artifact_ids: Vec<ArtifactId>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Chat-log entry; the external trigger that creates runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub workspace_id: WorkspaceId,
    pub run_id: Option<RunId>,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Field values for a workspace not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorkspace {
    pub name: String,
    pub owner_user_id: String,
}

/// Field values for an artifact not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArtifact {
    pub workspace_id: WorkspaceId,
    pub path: String,
    pub artifact_type: String,
    pub version_group: String,
    pub version_number: u32,
    pub source_run_id: Option<RunId>,
}

/// Field values for a run not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRun {
    pub workspace_id: WorkspaceId,
    pub skill_name: String,
    pub phase: RunPhase,
    pub prompt: String,
    pub params: Map<String, Value>,
    pub input_artifact_ids: Vec<ArtifactId>,
    pub created_by: String,
}

/// Field values for a message not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub workspace_id: WorkspaceId,
    pub run_id: Option<RunId>,
    pub role: String,
    pub content: String,
}

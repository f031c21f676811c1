//! Test-only helpers for building records and coordinators.

use chrono::{DateTime, Utc};
use serde_json::Map;

use crate::core::phase::RunPhase;
use crate::core::skills::SkillCatalog;
use crate::core::types::{Artifact, ArtifactId, NewArtifact, NewRun, WorkspaceId};
use crate::io::memory_store::MemoryStore;
use crate::lifecycle::{Coordinator, DEFAULT_USER};

/// Deterministic artifact in workspace 1 at `out/<group>`.
pub fn artifact(id: u64, group: &str, version: u32) -> Artifact {
    Artifact {
        id: ArtifactId(id),
        workspace_id: WorkspaceId(1),
        path: format!("out/{group}"),
        artifact_type: "pptx".to_string(),
        version_group: group.to_string(),
        version_number: version,
        source_run_id: None,
        published_at: None,
        created_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

/// Insert payload for an artifact; the type is taken from the path extension.
pub fn new_artifact(workspace_id: WorkspaceId, path: &str, group: &str, version: u32) -> NewArtifact {
    NewArtifact {
        workspace_id,
        path: path.to_string(),
        artifact_type: path.rsplit('.').next().unwrap_or("text").to_string(),
        version_group: group.to_string(),
        version_number: version,
        source_run_id: None,
    }
}

/// Insert payload for a run with an empty prompt and no inputs.
pub fn new_run(workspace_id: WorkspaceId, skill: &str, phase: RunPhase) -> NewRun {
    NewRun {
        workspace_id,
        skill_name: skill.to_string(),
        phase,
        prompt: String::new(),
        params: Map::new(),
        input_artifact_ids: Vec::new(),
        created_by: DEFAULT_USER.to_string(),
    }
}

/// Coordinator over an empty in-memory store with the default catalog.
pub fn coordinator() -> Coordinator<MemoryStore> {
    Coordinator::new(MemoryStore::new(), SkillCatalog::default())
}

/// Create a workspace named `demo` and return its id.
pub fn seeded_workspace(coordinator: &Coordinator<MemoryStore>) -> WorkspaceId {
    match coordinator.create_workspace("demo") {
        Ok(workspace) => workspace.id,
        Err(err) => panic!("seed workspace: {err}"),
    }
}

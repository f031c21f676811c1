//! Workspace-level use cases layered on the coordinator: uploads, listings,
//! and the chat trigger that starts runs.

use serde::Serialize;
use tracing::info;

use crate::core::sandbox::Zone;
use crate::core::skills::SkillSpec;
use crate::core::types::{
    Artifact, ArtifactId, EntityKind, Message, MessageId, NewArtifact, NewMessage, NewWorkspace,
    Run, RunId, Workspace, WorkspaceId,
};
use crate::core::version_chain;
use crate::error::Error;
use crate::io::store::{Records, Store};
use crate::lifecycle::{Coordinator, DEFAULT_USER, RunRequest};

/// Ids created by one chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatReceipt {
    pub message_id: MessageId,
    pub run_id: RunId,
}

impl<S: Store> Coordinator<S> {
    pub fn create_workspace(&self, name: &str) -> Result<Workspace, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput("workspace name must not be empty".to_string()));
        }
        let workspace = self.store().transaction(|records| {
            records.insert_workspace(NewWorkspace {
                name: name.to_string(),
                owner_user_id: DEFAULT_USER.to_string(),
            })
        })?;
        info!(workspace_id = %workspace.id, name = %workspace.name, "workspace created");
        Ok(workspace)
    }

    /// Newest first.
    pub fn list_workspaces(&self) -> Result<Vec<Workspace>, Error> {
        self.store().read(|records| records.workspaces())
    }

    pub fn workspace(&self, id: WorkspaceId) -> Result<Workspace, Error> {
        self.store()
            .read(|records| records.workspace(id))?
            .ok_or_else(|| Error::not_found(EntityKind::Workspace, id))
    }

    /// Record an uploaded file as `raw/<filename>`.
    ///
    /// The normalized filename names the version group, so `./brief.pdf` and
    /// `brief.pdf` share one chain. A repeated upload of the same name becomes
    /// the next version of that group.
    pub fn register_upload(
        &self,
        workspace_id: WorkspaceId,
        filename: &str,
    ) -> Result<Artifact, Error> {
        let upload = Zone::Raw.confine(filename)?;

        let artifact = self.store().transaction(|records| {
            if records.workspace(workspace_id)?.is_none() {
                return Err(Error::not_found(EntityKind::Workspace, workspace_id));
            }
            let group = records.version_group(workspace_id, &upload.name)?;
            let version_number = version_chain::next_version_number(&group)?;
            records.insert_artifact(NewArtifact {
                workspace_id,
                path: upload.path,
                artifact_type: content_type(&upload.name).to_string(),
                version_group: upload.name,
                version_number,
                source_run_id: None,
            })
        })?;
        info!(
            workspace_id = %workspace_id,
            artifact_id = %artifact.id,
            path = %artifact.path,
            version = artifact.version_number,
            "upload registered"
        );
        Ok(artifact)
    }

    pub fn list_artifacts(&self, workspace_id: WorkspaceId) -> Result<Vec<Artifact>, Error> {
        self.store().read(|records| {
            require_workspace(records, workspace_id)?;
            records.artifacts_in(workspace_id)
        })
    }

    pub fn artifact(&self, id: ArtifactId) -> Result<Artifact, Error> {
        self.store()
            .read(|records| records.artifact(id))?
            .ok_or_else(|| Error::not_found(EntityKind::Artifact, id))
    }

    /// Newest first.
    pub fn list_runs(&self, workspace_id: WorkspaceId) -> Result<Vec<Run>, Error> {
        self.store().read(|records| {
            require_workspace(records, workspace_id)?;
            records.runs_in(workspace_id)
        })
    }

    pub fn run(&self, id: RunId) -> Result<Run, Error> {
        self.store()
            .read(|records| records.run(id))?
            .ok_or_else(|| Error::not_found(EntityKind::Run, id))
    }

    /// Append a user message and start a run for it.
    ///
    /// Both records are written in one transaction; an unknown skill leaves
    /// neither behind. `skill` falls back to the configured chat skill.
    pub fn chat(
        &self,
        workspace_id: WorkspaceId,
        prompt: &str,
        skill: Option<&str>,
    ) -> Result<ChatReceipt, Error> {
        let skill = skill.unwrap_or(&self.settings().default_chat_skill);
        let receipt = self.store().transaction(|records| {
            let run = self.stage_run(records, RunRequest::new(workspace_id, skill, prompt))?;
            let message = records.insert_message(NewMessage {
                workspace_id,
                run_id: Some(run.id),
                role: "user".to_string(),
                content: prompt.to_string(),
            })?;
            Ok(ChatReceipt {
                message_id: message.id,
                run_id: run.id,
            })
        })?;
        info!(
            workspace_id = %workspace_id,
            message_id = %receipt.message_id,
            run_id = %receipt.run_id,
            skill,
            "chat turn started run"
        );
        Ok(receipt)
    }

    /// Oldest first.
    pub fn messages(&self, workspace_id: WorkspaceId) -> Result<Vec<Message>, Error> {
        self.store().read(|records| {
            require_workspace(records, workspace_id)?;
            records.messages_in(workspace_id)
        })
    }

    pub fn skills(&self) -> Vec<SkillSpec> {
        self.catalog().iter().cloned().collect()
    }
}

fn require_workspace(records: &dyn Records, id: WorkspaceId) -> Result<Workspace, Error> {
    records
        .workspace(id)?
        .ok_or_else(|| Error::not_found(EntityKind::Workspace, id))
}

/// Text after the last `.`, or the whole name when there is none.
fn content_type(filename: &str) -> &str {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => base,
    }
}

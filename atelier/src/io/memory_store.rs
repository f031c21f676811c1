//! Volatile store for tests and ephemeral servers.
//!
//! Records live in id-keyed maps with per-workspace and per-version-group
//! indexes, so scoped listings never walk other workspaces. Transactions write
//! in place and keep an undo journal; a failed transaction replays it backwards.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::store::{Records, Store, StoreError};
use crate::core::types::{
    Artifact, ArtifactId, EntityKind, Message, MessageId, NewArtifact, NewMessage, NewRun,
    NewWorkspace, Run, RunId, Workspace, WorkspaceId,
};
use crate::error::Error;

type GroupKey = (WorkspaceId, String);

/// Every record plus the secondary indexes.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    counters: Counters,
    workspaces: BTreeMap<WorkspaceId, Workspace>,
    artifacts: BTreeMap<ArtifactId, Artifact>,
    runs: BTreeMap<RunId, Run>,
    messages: BTreeMap<MessageId, Message>,
    scopes: BTreeMap<WorkspaceId, Scope>,
    versions: BTreeMap<GroupKey, BTreeMap<u32, ArtifactId>>,
}

/// Last id handed out per entity family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counters {
    workspace: u64,
    artifact: u64,
    run: u64,
    message: u64,
}

/// Ids owned by one workspace.
#[derive(Debug, Default)]
struct Scope {
    artifacts: BTreeSet<ArtifactId>,
    runs: BTreeSet<RunId>,
    messages: BTreeSet<MessageId>,
}

impl Scope {
    fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.runs.is_empty() && self.messages.is_empty()
    }
}

impl Tables {
    fn scope(&self, workspace_id: WorkspaceId) -> Option<&Scope> {
        self.scopes.get(&workspace_id)
    }

    fn scope_mut(&mut self, workspace_id: WorkspaceId) -> &mut Scope {
        self.scopes.entry(workspace_id).or_default()
    }

    fn prune_scope(&mut self, workspace_id: WorkspaceId) {
        if self.scopes.get(&workspace_id).is_some_and(Scope::is_empty) {
            self.scopes.remove(&workspace_id);
        }
    }

    fn remove_workspace(&mut self, id: WorkspaceId) {
        self.workspaces.remove(&id);
        self.prune_scope(id);
    }

    fn remove_artifact(&mut self, id: ArtifactId) {
        let Some(artifact) = self.artifacts.remove(&id) else {
            return;
        };
        let key = (artifact.workspace_id, artifact.version_group);
        if let Some(members) = self.versions.get_mut(&key) {
            members.remove(&artifact.version_number);
            if members.is_empty() {
                self.versions.remove(&key);
            }
        }
        self.scope_mut(artifact.workspace_id).artifacts.remove(&id);
        self.prune_scope(artifact.workspace_id);
    }

    fn remove_run(&mut self, id: RunId) {
        if let Some(run) = self.runs.remove(&id) {
            self.scope_mut(run.workspace_id).runs.remove(&id);
            self.prune_scope(run.workspace_id);
        }
    }

    fn remove_message(&mut self, id: MessageId) {
        if let Some(message) = self.messages.remove(&id) {
            self.scope_mut(message.workspace_id).messages.remove(&id);
            self.prune_scope(message.workspace_id);
        }
    }
}

impl Records for Tables {
    fn workspace(&self, id: WorkspaceId) -> Result<Option<Workspace>, Error> {
        Ok(self.workspaces.get(&id).cloned())
    }

    fn artifact(&self, id: ArtifactId) -> Result<Option<Artifact>, Error> {
        Ok(self.artifacts.get(&id).cloned())
    }

    fn run(&self, id: RunId) -> Result<Option<Run>, Error> {
        Ok(self.runs.get(&id).cloned())
    }

    fn workspaces(&self) -> Result<Vec<Workspace>, Error> {
        let mut out: Vec<_> = self.workspaces.values().cloned().collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(out)
    }

    fn artifacts_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Artifact>, Error> {
        Ok(self
            .scope(workspace_id)
            .map(|scope| {
                scope
                    .artifacts
                    .iter()
                    .filter_map(|id| self.artifacts.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn version_group(
        &self,
        workspace_id: WorkspaceId,
        group: &str,
    ) -> Result<Vec<Artifact>, Error> {
        let key = (workspace_id, group.to_string());
        Ok(self
            .versions
            .get(&key)
            .map(|members| {
                members
                    .values()
                    .filter_map(|id| self.artifacts.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn runs_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Run>, Error> {
        let mut out: Vec<Run> = self
            .scope(workspace_id)
            .map(|scope| {
                scope
                    .runs
                    .iter()
                    .filter_map(|id| self.runs.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(out)
    }

    fn messages_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Message>, Error> {
        Ok(self
            .scope(workspace_id)
            .map(|scope| {
                scope
                    .messages
                    .iter()
                    .filter_map(|id| self.messages.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_workspace(&mut self, new: NewWorkspace) -> Result<Workspace, Error> {
        self.counters.workspace += 1;
        let workspace = Workspace {
            id: WorkspaceId(self.counters.workspace),
            name: new.name,
            owner_user_id: new.owner_user_id,
            status: "active".to_string(),
            created_at: Utc::now(),
        };
        self.workspaces.insert(workspace.id, workspace.clone());
        Ok(workspace)
    }

    fn insert_artifact(&mut self, new: NewArtifact) -> Result<Artifact, Error> {
        let key = (new.workspace_id, new.version_group.clone());
        if let Some(existing) = self
            .versions
            .get(&key)
            .and_then(|members| members.get(&new.version_number))
        {
            return Err(Error::DataIntegrity(format!(
                "artifact {} already holds version {} of '{}' in workspace {}",
                existing, new.version_number, new.version_group, new.workspace_id
            )));
        }

        self.counters.artifact += 1;
        let artifact = Artifact {
            id: ArtifactId(self.counters.artifact),
            workspace_id: new.workspace_id,
            path: new.path,
            artifact_type: new.artifact_type,
            version_group: new.version_group,
            version_number: new.version_number,
            source_run_id: new.source_run_id,
            published_at: None,
            created_at: Utc::now(),
        };
        self.versions
            .entry(key)
            .or_default()
            .insert(artifact.version_number, artifact.id);
        self.scope_mut(artifact.workspace_id)
            .artifacts
            .insert(artifact.id);
        self.artifacts.insert(artifact.id, artifact.clone());
        Ok(artifact)
    }

    fn insert_run(&mut self, new: NewRun) -> Result<Run, Error> {
        self.counters.run += 1;
        let run = Run {
            id: RunId(self.counters.run),
            workspace_id: new.workspace_id,
            skill_name: new.skill_name,
            phase: new.phase,
            prompt: new.prompt,
            params: new.params,
            input_artifact_ids: new.input_artifact_ids,
            output_artifact_ids: Vec::new(),
            created_by: new.created_by,
            created_at: Utc::now(),
            finished_at: None,
        };
        self.scope_mut(run.workspace_id).runs.insert(run.id);
        self.runs.insert(run.id, run.clone());
        Ok(run)
    }

    fn insert_message(&mut self, new: NewMessage) -> Result<Message, Error> {
        self.counters.message += 1;
        let message = Message {
            id: MessageId(self.counters.message),
            workspace_id: new.workspace_id,
            run_id: new.run_id,
            role: new.role,
            content: new.content,
            created_at: Utc::now(),
        };
        self.scope_mut(message.workspace_id)
            .messages
            .insert(message.id);
        self.messages.insert(message.id, message.clone());
        Ok(message)
    }

    fn update_run(&mut self, run: &Run) -> Result<(), Error> {
        match self.runs.get_mut(&run.id) {
            Some(slot) => {
                slot.clone_from(run);
                Ok(())
            }
            None => Err(Error::not_found(EntityKind::Run, run.id)),
        }
    }

    fn set_published_at(&mut self, id: ArtifactId, at: DateTime<Utc>) -> Result<Artifact, Error> {
        let artifact = self
            .artifacts
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(EntityKind::Artifact, id))?;
        artifact.published_at = Some(at);
        Ok(artifact.clone())
    }
}

/// Inverse of one applied write.
#[derive(Debug)]
enum Undo {
    Workspace(WorkspaceId),
    Artifact(ArtifactId),
    Run(RunId),
    Message(MessageId),
    RunBefore(Box<Run>),
    ArtifactBefore(Box<Artifact>),
}

/// Writes through to the tables while recording how to take them back.
struct Journal<'a> {
    tables: &'a mut Tables,
    counters: Counters,
    undo: Vec<Undo>,
}

impl<'a> Journal<'a> {
    fn new(tables: &'a mut Tables) -> Self {
        let counters = tables.counters;
        Self {
            tables,
            counters,
            undo: Vec::new(),
        }
    }

    fn rollback(self) {
        let Journal {
            tables,
            counters,
            undo,
        } = self;
        for step in undo.into_iter().rev() {
            match step {
                Undo::Workspace(id) => tables.remove_workspace(id),
                Undo::Artifact(id) => tables.remove_artifact(id),
                Undo::Run(id) => tables.remove_run(id),
                Undo::Message(id) => tables.remove_message(id),
                Undo::RunBefore(run) => {
                    tables.runs.insert(run.id, *run);
                }
                Undo::ArtifactBefore(artifact) => {
                    tables.artifacts.insert(artifact.id, *artifact);
                }
            }
        }
        tables.counters = counters;
    }
}

impl Records for Journal<'_> {
    fn workspace(&self, id: WorkspaceId) -> Result<Option<Workspace>, Error> {
        self.tables.workspace(id)
    }

    fn artifact(&self, id: ArtifactId) -> Result<Option<Artifact>, Error> {
        self.tables.artifact(id)
    }

    fn run(&self, id: RunId) -> Result<Option<Run>, Error> {
        self.tables.run(id)
    }

    fn workspaces(&self) -> Result<Vec<Workspace>, Error> {
        self.tables.workspaces()
    }

    fn artifacts_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Artifact>, Error> {
        self.tables.artifacts_in(workspace_id)
    }

    fn version_group(
        &self,
        workspace_id: WorkspaceId,
        group: &str,
    ) -> Result<Vec<Artifact>, Error> {
        self.tables.version_group(workspace_id, group)
    }

    fn runs_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Run>, Error> {
        self.tables.runs_in(workspace_id)
    }

    fn messages_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Message>, Error> {
        self.tables.messages_in(workspace_id)
    }

    fn insert_workspace(&mut self, new: NewWorkspace) -> Result<Workspace, Error> {
        let workspace = self.tables.insert_workspace(new)?;
        self.undo.push(Undo::Workspace(workspace.id));
        Ok(workspace)
    }

    fn insert_artifact(&mut self, new: NewArtifact) -> Result<Artifact, Error> {
        let artifact = self.tables.insert_artifact(new)?;
        self.undo.push(Undo::Artifact(artifact.id));
        Ok(artifact)
    }

    fn insert_run(&mut self, new: NewRun) -> Result<Run, Error> {
        let run = self.tables.insert_run(new)?;
        self.undo.push(Undo::Run(run.id));
        Ok(run)
    }

    fn insert_message(&mut self, new: NewMessage) -> Result<Message, Error> {
        let message = self.tables.insert_message(new)?;
        self.undo.push(Undo::Message(message.id));
        Ok(message)
    }

    fn update_run(&mut self, run: &Run) -> Result<(), Error> {
        let before = self
            .tables
            .runs
            .get(&run.id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Run, run.id))?;
        self.tables.update_run(run)?;
        self.undo.push(Undo::RunBefore(Box::new(before)));
        Ok(())
    }

    fn set_published_at(&mut self, id: ArtifactId, at: DateTime<Utc>) -> Result<Artifact, Error> {
        let before = self
            .tables
            .artifacts
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(EntityKind::Artifact, id))?;
        let artifact = self.tables.set_published_at(id, at)?;
        self.undo.push(Undo::ArtifactBefore(Box::new(before)));
        Ok(artifact)
    }
}

/// Keeps records in process memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn read<T>(&self, f: impl FnOnce(&dyn Records) -> Result<T, Error>) -> Result<T, Error> {
        let guard = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        f(&*guard)
    }

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut dyn Records) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut guard = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let mut journal = Journal::new(&mut guard);
        match f(&mut journal) {
            Ok(out) => Ok(out),
            Err(err) => {
                journal.rollback();
                Err(err)
            }
        }
    }
}

//! Run lifecycle coordination.
//!
//! [`Coordinator`] composes the pure core (skill catalog, path sandbox, phase
//! machine, version chains) with a [`Store`]. Every write happens inside one
//! store transaction, so callers never observe half-applied effects.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::core::phase::{RunPhase, can_transition};
use crate::core::sandbox::{self, Zone};
use crate::core::skills::SkillCatalog;
use crate::core::types::{
    Artifact, ArtifactId, EntityKind, NewArtifact, NewRun, Run, RunId, WorkspaceId,
};
use crate::core::version_chain::{self, ChainView};
use crate::error::Error;
use crate::io::config::AtelierConfig;
use crate::io::store::{Records, Store};

/// Identity recorded on runs and workspaces until authentication exists.
pub const DEFAULT_USER: &str = "demo";

/// Tunables for run creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Create runs in `running` rather than `queued` when no phase is requested.
    pub start_immediately: bool,
    /// Skill the chat trigger falls back to.
    pub default_chat_skill: String,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            start_immediately: true,
            default_chat_skill: "ppt_revise".to_string(),
        }
    }
}

/// Request to start a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub workspace_id: WorkspaceId,
    pub skill: String,
    pub prompt: String,
    pub input_artifact_ids: Vec<ArtifactId>,
    pub params: Map<String, Value>,
    /// `queued` or `running`; `None` follows [`RunSettings::start_immediately`].
    pub initial_phase: Option<RunPhase>,
}

impl RunRequest {
    pub fn new(workspace_id: WorkspaceId, skill: &str, prompt: &str) -> Self {
        Self {
            workspace_id,
            skill: skill.to_string(),
            prompt: prompt.to_string(),
            input_artifact_ids: Vec::new(),
            params: Map::new(),
            initial_phase: None,
        }
    }
}

/// Lifecycle engine over a store.
///
/// The catalog is fixed at construction; there is no global registry.
#[derive(Debug)]
pub struct Coordinator<S> {
    store: S,
    catalog: SkillCatalog,
    settings: RunSettings,
}

impl<S: Store> Coordinator<S> {
    pub fn new(store: S, catalog: SkillCatalog) -> Self {
        Self {
            store,
            catalog,
            settings: RunSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build from a validated config: configured catalog and run settings.
    pub fn from_config(store: S, cfg: &AtelierConfig) -> anyhow::Result<Self> {
        cfg.validate()?;
        let settings = RunSettings {
            start_immediately: cfg.runs.start_immediately,
            default_chat_skill: cfg.runs.default_chat_skill.clone(),
        };
        Ok(Self::new(store, cfg.catalog()?).with_settings(settings))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &SkillCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn is_supported_skill(&self, name: &str) -> bool {
        self.catalog.contains(name)
    }

    pub fn validate_output_path(&self, path: &str) -> bool {
        sandbox::validate_output_path(path)
    }

    pub fn validate_raw_read_path(&self, path: &str) -> bool {
        sandbox::validate_raw_read_path(path)
    }

    /// Create and persist a run.
    ///
    /// Fails with [`Error::SkillNotFound`] before anything is written when the
    /// skill is not cataloged.
    pub fn create_run(&self, request: RunRequest) -> Result<Run, Error> {
        let run = self
            .store
            .transaction(|records| self.stage_run(records, request))?;
        info!(run_id = %run.id, workspace_id = %run.workspace_id, skill = %run.skill_name, phase = %run.phase, "run created");
        Ok(run)
    }

    /// Finish a run with one output artifact at `out/<output_filename>`.
    ///
    /// The artifact joins the version group named by the normalized filename at
    /// the next version number. The new artifact, the `success` phase, the finish time,
    /// and the output link are committed together or not at all.
    pub fn complete_run(
        &self,
        run_id: RunId,
        output_filename: &str,
        artifact_type: &str,
    ) -> Result<(Run, Artifact), Error> {
        let (run, artifact) = self.store.transaction(|records| {
            let mut run = records
                .run(run_id)?
                .ok_or_else(|| Error::not_found(EntityKind::Run, run_id))?;

            let output = Zone::Out.confine(output_filename)?;
            let artifact_type = artifact_type.trim();
            if artifact_type.is_empty() {
                return Err(Error::InvalidInput("artifact type must not be empty".to_string()));
            }
            if !can_transition(run.phase, RunPhase::Success) {
                return Err(Error::InvalidTransition {
                    from: run.phase,
                    to: RunPhase::Success,
                });
            }

            let group = records.version_group(run.workspace_id, &output.name)?;
            let version_number = version_chain::next_version_number(&group)?;
            let artifact = records.insert_artifact(NewArtifact {
                workspace_id: run.workspace_id,
                path: output.path,
                artifact_type: artifact_type.to_string(),
                version_group: output.name,
                version_number,
                source_run_id: Some(run.id),
            })?;

            run.phase = RunPhase::Success;
            run.finished_at = Some(Utc::now());
            run.output_artifact_ids.push(artifact.id);
            records.update_run(&run)?;
            Ok((run, artifact))
        })?;
        info!(
            run_id = %run.id,
            artifact_id = %artifact.id,
            path = %artifact.path,
            version = artifact.version_number,
            "run completed"
        );
        Ok((run, artifact))
    }

    /// Move a run along the phase table.
    ///
    /// `success` is refused here: it is only reachable through
    /// [`Coordinator::complete_run`]. Entering `failed` stamps the finish time.
    pub fn advance_run(&self, run_id: RunId, next: RunPhase) -> Result<Run, Error> {
        let run = self.store.transaction(|records| {
            let mut run = records
                .run(run_id)?
                .ok_or_else(|| Error::not_found(EntityKind::Run, run_id))?;
            if !can_transition(run.phase, next) {
                return Err(Error::InvalidTransition {
                    from: run.phase,
                    to: next,
                });
            }
            if next == RunPhase::Success {
                return Err(Error::CompletionRequired(run.id));
            }
            run.phase = next;
            if next.is_terminal() {
                run.finished_at = Some(Utc::now());
            }
            records.update_run(&run)?;
            Ok(run)
        })?;
        debug!(run_id = %run.id, phase = %run.phase, "run phase advanced");
        Ok(run)
    }

    /// Stamp the publication time once. Publishing again returns the artifact
    /// unchanged.
    pub fn publish_artifact(&self, artifact_id: ArtifactId) -> Result<Artifact, Error> {
        let already = self.store.read(|records| {
            Ok(records
                .artifact(artifact_id)?
                .filter(|a| a.published_at.is_some()))
        })?;
        if let Some(artifact) = already {
            debug!(artifact_id = %artifact.id, "artifact already published");
            return Ok(artifact);
        }

        let artifact = self.store.transaction(|records| {
            let artifact = records
                .artifact(artifact_id)?
                .ok_or_else(|| Error::not_found(EntityKind::Artifact, artifact_id))?;
            if artifact.published_at.is_some() {
                return Ok(artifact);
            }
            records.set_published_at(artifact_id, Utc::now())
        })?;
        info!(artifact_id = %artifact.id, path = %artifact.path, "artifact published");
        Ok(artifact)
    }

    /// The artifact with its previous and next versions.
    pub fn get_version_chain(&self, artifact_id: ArtifactId) -> Result<ChainView, Error> {
        self.store.read(|records| {
            let (artifact, siblings) = group_of(records, artifact_id)?;
            version_chain::resolve(&artifact, &siblings)
        })
    }

    /// Every version of the artifact's group, oldest first.
    pub fn version_history(&self, artifact_id: ArtifactId) -> Result<Vec<Artifact>, Error> {
        self.store.read(|records| {
            let (artifact, siblings) = group_of(records, artifact_id)?;
            version_chain::history(&artifact, &siblings)
        })
    }

    /// Validate `request` and insert the run.
    ///
    /// Inputs must belong to the workspace and sit in `raw/` or `out/`; earlier
    /// outputs are accepted so revisions can chain.
    pub(crate) fn stage_run(
        &self,
        records: &mut dyn Records,
        request: RunRequest,
    ) -> Result<Run, Error> {
        if !self.catalog.contains(&request.skill) {
            return Err(Error::SkillNotFound(request.skill));
        }
        let phase = request.initial_phase.unwrap_or(if self.settings.start_immediately {
            RunPhase::Running
        } else {
            RunPhase::Queued
        });
        if !phase.is_initial() {
            return Err(Error::InvalidInitialPhase(phase));
        }
        if records.workspace(request.workspace_id)?.is_none() {
            return Err(Error::not_found(EntityKind::Workspace, request.workspace_id));
        }
        for id in &request.input_artifact_ids {
            let input = records
                .artifact(*id)?
                .filter(|a| a.workspace_id == request.workspace_id)
                .ok_or_else(|| Error::not_found(EntityKind::Artifact, *id))?;
            if Zone::of(&input.path).is_none() {
                return Err(Error::OutsideSandbox { path: input.path });
            }
        }

        records.insert_run(NewRun {
            workspace_id: request.workspace_id,
            skill_name: request.skill,
            phase,
            prompt: request.prompt,
            params: request.params,
            input_artifact_ids: request.input_artifact_ids,
            created_by: DEFAULT_USER.to_string(),
        })
    }
}

fn group_of(
    records: &dyn Records,
    artifact_id: ArtifactId,
) -> Result<(Artifact, Vec<Artifact>), Error> {
    let artifact = records
        .artifact(artifact_id)?
        .ok_or_else(|| Error::not_found(EntityKind::Artifact, artifact_id))?;
    let siblings = records.version_group(artifact.workspace_id, &artifact.version_group)?;
    Ok((artifact, siblings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::memory_store::MemoryStore;
    use crate::test_support::{coordinator, new_artifact, seeded_workspace};

    fn running_run(c: &Coordinator<MemoryStore>, ws: WorkspaceId) -> Run {
        c.create_run(RunRequest::new(ws, "ppt_revise", "revise the cover"))
            .expect("create run")
    }

    #[test]
    fn create_run_defaults_to_running() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let run = running_run(&c, ws);
        assert_eq!(run.phase, RunPhase::Running);
        assert_eq!(run.created_by, DEFAULT_USER);
        assert!(run.output_artifact_ids.is_empty());
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn queued_runs_follow_settings() {
        let c = coordinator().with_settings(RunSettings {
            start_immediately: false,
            ..RunSettings::default()
        });
        let ws = seeded_workspace(&c);
        assert_eq!(running_run(&c, ws).phase, RunPhase::Queued);
    }

    /// Unknown skills fail before any record is written.
    #[test]
    fn unknown_skill_persists_nothing() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let err = c
            .create_run(RunRequest::new(ws, "nonexistent", "x"))
            .expect_err("unknown skill");
        assert!(matches!(err, Error::SkillNotFound(name) if name == "nonexistent"));
        assert!(c.store().read(|t| t.runs_in(ws)).expect("read").is_empty());
    }

    #[test]
    fn create_run_rejects_non_initial_phase() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let mut request = RunRequest::new(ws, "ppt_revise", "x");
        request.initial_phase = Some(RunPhase::WaitingUser);
        assert!(matches!(
            c.create_run(request),
            Err(Error::InvalidInitialPhase(RunPhase::WaitingUser))
        ));
    }

    #[test]
    fn create_run_checks_workspace_and_inputs() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        assert!(matches!(
            c.create_run(RunRequest::new(WorkspaceId(99), "ppt_revise", "x")),
            Err(Error::NotFound { kind: EntityKind::Workspace, id: 99 })
        ));

        let mut request = RunRequest::new(ws, "ppt_revise", "x");
        request.input_artifact_ids = vec![ArtifactId(42)];
        assert!(matches!(
            c.create_run(request),
            Err(Error::NotFound { kind: EntityKind::Artifact, id: 42 })
        ));
    }

    #[test]
    fn complete_run_links_run_and_artifact() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let run = running_run(&c, ws);

        let (done, artifact) = c
            .complete_run(run.id, "proposal.pptx", "pptx")
            .expect("complete");
        assert_eq!(done.phase, RunPhase::Success);
        assert!(done.finished_at.is_some());
        assert_eq!(done.output_artifact_ids, vec![artifact.id]);
        assert_eq!(artifact.source_run_id, Some(run.id));
        assert_eq!(artifact.path, "out/proposal.pptx");
        assert_eq!(artifact.version_group, "proposal.pptx");
        assert_eq!(artifact.version_number, 1);

        let stored = c.store().read(|t| t.run(run.id)).expect("read").expect("run");
        assert_eq!(stored, done);
    }

    /// Completion appends to an existing group, including uploads of the same name.
    #[test]
    fn complete_run_takes_next_version_in_group() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let upload = c.register_upload(ws, "proposal.pptx").expect("upload");
        assert_eq!(upload.version_number, 1);

        let first = running_run(&c, ws);
        let (_, v2) = c
            .complete_run(first.id, "proposal.pptx", "pptx")
            .expect("v2");
        let second = running_run(&c, ws);
        let (_, v3) = c
            .complete_run(second.id, "proposal.pptx", "pptx")
            .expect("v3");
        assert_eq!((v2.version_number, v3.version_number), (2, 3));

        let chain = c.get_version_chain(v2.id).expect("chain");
        assert_eq!(chain.previous.map(|a| a.id), Some(upload.id));
        assert_eq!(chain.next.map(|a| a.id), Some(v3.id));
    }

    /// Terminal runs cannot complete again, and no artifact is created.
    #[test]
    fn complete_run_on_terminal_run_has_no_effect() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let run = running_run(&c, ws);
        c.complete_run(run.id, "a.pptx", "pptx").expect("first");
        let failed = running_run(&c, ws);
        c.advance_run(failed.id, RunPhase::Failed).expect("fail");

        for id in [run.id, failed.id] {
            let err = c
                .complete_run(id, "b.pptx", "pptx")
                .expect_err("terminal");
            assert!(matches!(
                err,
                Error::InvalidTransition {
                    to: RunPhase::Success,
                    ..
                }
            ));
        }
        let artifacts = c.store().read(|t| t.artifacts_in(ws)).expect("read");
        assert_eq!(artifacts.len(), 1);
        let stored = c.store().read(|t| t.run(run.id)).expect("read").expect("run");
        assert_eq!(stored.output_artifact_ids.len(), 1);
    }

    #[test]
    fn complete_run_rejects_queued_runs() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let mut request = RunRequest::new(ws, "ppt_revise", "x");
        request.initial_phase = Some(RunPhase::Queued);
        let run = c.create_run(request).expect("create");
        assert!(matches!(
            c.complete_run(run.id, "a.pptx", "pptx"),
            Err(Error::InvalidTransition {
                from: RunPhase::Queued,
                to: RunPhase::Success
            })
        ));
    }

    #[test]
    fn complete_run_rejects_escaping_filenames() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let run = running_run(&c, ws);
        for bad in ["../x.pptx", "/etc/passwd", "a/../../b"] {
            let err = c.complete_run(run.id, bad, "pptx").expect_err(bad);
            assert!(matches!(err, Error::InvalidPath { zone: Zone::Out, .. }), "{bad}");
        }
        assert!(matches!(
            c.complete_run(run.id, "  ", "pptx"),
            Err(Error::InvalidInput(_))
        ));
        let phase = c
            .store()
            .read(|t| Ok(t.run(run.id)?.map(|r| r.phase)))
            .expect("read");
        assert_eq!(phase, Some(RunPhase::Running));
    }

    /// `./a.pptx` and `a.pptx` name the same output; `.` names nothing.
    #[test]
    fn complete_run_normalizes_output_names() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let run = running_run(&c, ws);
        assert!(matches!(
            c.complete_run(run.id, ".", "pptx"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            c.complete_run(run.id, "./", "pptx"),
            Err(Error::InvalidInput(_))
        ));
        let (_, v1) = c.complete_run(run.id, "deck.pptx", "pptx").expect("v1");

        let revision = running_run(&c, ws);
        let (_, v2) = c
            .complete_run(revision.id, "./deck.pptx", "pptx")
            .expect("v2");
        assert_eq!(v2.path, "out/deck.pptx");
        assert_eq!(v2.version_group, v1.version_group);
        assert_eq!(v2.version_number, 2);
        let chain = c.get_version_chain(v2.id).expect("chain");
        assert_eq!(chain.previous.map(|a| a.id), Some(v1.id));
    }

    /// Outputs of earlier runs are valid inputs.
    #[test]
    fn create_run_accepts_output_inputs() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let run = running_run(&c, ws);
        let (_, output) = c.complete_run(run.id, "a.pptx", "pptx").expect("complete");

        let mut request = RunRequest::new(ws, "ppt_revise", "again");
        request.input_artifact_ids = vec![output.id];
        let revision = c.create_run(request).expect("revision");
        assert_eq!(revision.input_artifact_ids, vec![output.id]);
    }

    /// A stored input outside both zones is reported as such, not as a raw/ violation.
    #[test]
    fn create_run_reports_inputs_outside_the_sandbox() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let stray = c
            .store()
            .transaction(|t| t.insert_artifact(new_artifact(ws, "tmp/x.pdf", "x.pdf", 1)))
            .expect("insert");

        let mut request = RunRequest::new(ws, "doc_analyze", "read it");
        request.input_artifact_ids = vec![stray.id];
        let err = c.create_run(request).expect_err("outside");
        assert!(
            matches!(&err, Error::OutsideSandbox { path } if path == "tmp/x.pdf"),
            "{err:?}"
        );
        assert!(c.store().read(|t| t.runs_in(ws)).expect("read").is_empty());
    }

    #[test]
    fn complete_run_missing_run_is_not_found() {
        let c = coordinator();
        assert!(matches!(
            c.complete_run(RunId(5), "../bad", "pptx"),
            Err(Error::NotFound { kind: EntityKind::Run, id: 5 })
        ));
    }

    #[test]
    fn advance_run_follows_the_table() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let mut request = RunRequest::new(ws, "doc_analyze", "x");
        request.initial_phase = Some(RunPhase::Queued);
        let run = c.create_run(request).expect("create");

        let planning = c.advance_run(run.id, RunPhase::Planning).expect("plan");
        assert_eq!(planning.phase, RunPhase::Planning);
        assert!(matches!(
            c.advance_run(run.id, RunPhase::Queued),
            Err(Error::InvalidTransition { .. })
        ));
        c.advance_run(run.id, RunPhase::Running).expect("run");
        assert!(matches!(
            c.advance_run(run.id, RunPhase::Success),
            Err(Error::CompletionRequired(id)) if id == run.id
        ));
        let failed = c.advance_run(run.id, RunPhase::Failed).expect("fail");
        assert!(failed.finished_at.is_some());
    }

    #[test]
    fn publish_is_idempotent() {
        let c = coordinator();
        let ws = seeded_workspace(&c);
        let run = running_run(&c, ws);
        let (_, artifact) = c.complete_run(run.id, "a.pptx", "pptx").expect("complete");

        let first = c.publish_artifact(artifact.id).expect("publish");
        let stamp = first.published_at.expect("stamped");
        let second = c.publish_artifact(artifact.id).expect("republish");
        assert_eq!(second.published_at, Some(stamp));
        assert_eq!(second.version_number, artifact.version_number);
        assert!(matches!(
            c.publish_artifact(ArtifactId(404)),
            Err(Error::NotFound { kind: EntityKind::Artifact, .. })
        ));
    }

    #[test]
    fn version_queries_require_existing_artifact() {
        let c = coordinator();
        assert!(matches!(
            c.get_version_chain(ArtifactId(1)),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            c.version_history(ArtifactId(1)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn facade_predicates_delegate_to_core() {
        let c = coordinator();
        assert!(c.is_supported_skill("ppt_revise"));
        assert!(!c.is_supported_skill("nonexistent"));
        assert!(c.validate_output_path("out/a/b.pptx"));
        assert!(!c.validate_output_path("raw/a.pptx"));
        assert!(c.validate_raw_read_path("raw/in.pdf"));
        assert!(!c.validate_raw_read_path("out/in.pdf"));
    }
}

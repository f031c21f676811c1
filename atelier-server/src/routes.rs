//! HTTP route handlers for the lifecycle API.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use atelier::Error;
use atelier::core::phase::RunPhase;
use atelier::core::skills::SkillSpec;
use atelier::core::types::{Artifact, ArtifactId, Message, Run, RunId, Workspace, WorkspaceId};
use atelier::core::version_chain::ChainView;
use atelier::lifecycle::RunRequest;
use atelier::workspace::ChatReceipt;

use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/skills", get(list_skills))
        .route("/workspaces", post(create_workspace).get(list_workspaces))
        .route("/workspaces/{id}", get(get_workspace))
        .route("/workspaces/{id}/upload", post(upload))
        .route("/workspaces/{id}/artifacts", get(list_artifacts))
        .route("/workspaces/{id}/runs", post(create_run).get(list_runs))
        .route("/workspaces/{id}/chat", post(chat))
        .route("/workspaces/{id}/messages", get(list_messages))
        .route("/runs/{id}", get(get_run))
        .route("/runs/{id}/transition", post(transition_run))
        .route("/runs/{id}/complete", post(complete_run))
        .route("/artifacts/{id}", get(get_artifact))
        .route("/artifacts/{id}/publish", post(publish_artifact))
        .route("/artifacts/{id}/chain", get(version_chain))
        .route("/artifacts/{id}/versions", get(version_history))
}

async fn health() -> &'static str {
    "ok"
}

async fn list_skills(State(state): State<AppState>) -> Json<Vec<SkillSpec>> {
    Json(state.coordinator.skills())
}

#[derive(Debug, Deserialize)]
struct CreateWorkspace {
    name: String,
}

async fn create_workspace(
    State(state): State<AppState>,
    Json(body): Json<CreateWorkspace>,
) -> ApiResult<Workspace> {
    let workspace = state
        .coordinator
        .create_workspace(&body.name)
        .map_err(map_api_error)?;
    Ok(Json(workspace))
}

async fn list_workspaces(State(state): State<AppState>) -> ApiResult<Vec<Workspace>> {
    Ok(Json(state.coordinator.list_workspaces().map_err(map_api_error)?))
}

async fn get_workspace(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Workspace> {
    let workspace = state
        .coordinator
        .workspace(WorkspaceId(id))
        .map_err(map_api_error)?;
    Ok(Json(workspace))
}

#[derive(Debug, Deserialize)]
struct Upload {
    filename: String,
}

/// POST /api/workspaces/{id}/upload - records the artifact; bytes are stored elsewhere.
async fn upload(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<Upload>,
) -> ApiResult<Artifact> {
    let artifact = state
        .coordinator
        .register_upload(WorkspaceId(id), &body.filename)
        .map_err(map_api_error)?;
    Ok(Json(artifact))
}

async fn list_artifacts(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Vec<Artifact>> {
    let artifacts = state
        .coordinator
        .list_artifacts(WorkspaceId(id))
        .map_err(map_api_error)?;
    Ok(Json(artifacts))
}

#[derive(Debug, Deserialize)]
struct CreateRun {
    skill: String,
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    input_artifact_ids: Vec<ArtifactId>,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    initial_phase: Option<RunPhase>,
}

async fn create_run(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<CreateRun>,
) -> ApiResult<Run> {
    let request = RunRequest {
        workspace_id: WorkspaceId(id),
        skill: body.skill,
        prompt: body.prompt,
        input_artifact_ids: body.input_artifact_ids,
        params: body.params,
        initial_phase: body.initial_phase,
    };
    Ok(Json(
        state.coordinator.create_run(request).map_err(map_api_error)?,
    ))
}

async fn list_runs(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Vec<Run>> {
    let runs = state
        .coordinator
        .list_runs(WorkspaceId(id))
        .map_err(map_api_error)?;
    Ok(Json(runs))
}

#[derive(Debug, Deserialize)]
struct Chat {
    prompt: String,
    skill: Option<String>,
}

async fn chat(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<Chat>,
) -> ApiResult<ChatReceipt> {
    let receipt = state
        .coordinator
        .chat(WorkspaceId(id), &body.prompt, body.skill.as_deref())
        .map_err(map_api_error)?;
    Ok(Json(receipt))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Vec<Message>> {
    let messages = state
        .coordinator
        .messages(WorkspaceId(id))
        .map_err(map_api_error)?;
    Ok(Json(messages))
}

async fn get_run(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Run> {
    Ok(Json(state.coordinator.run(RunId(id)).map_err(map_api_error)?))
}

#[derive(Debug, Deserialize)]
struct Transition {
    phase: RunPhase,
}

async fn transition_run(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<Transition>,
) -> ApiResult<Run> {
    let run = state
        .coordinator
        .advance_run(RunId(id), body.phase)
        .map_err(map_api_error)?;
    Ok(Json(run))
}

#[derive(Debug, Deserialize)]
struct Complete {
    output_filename: String,
    artifact_type: String,
}

#[derive(Debug, Serialize)]
struct Completed {
    run: Run,
    artifact: Artifact,
}

async fn complete_run(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<Complete>,
) -> ApiResult<Completed> {
    let (run, artifact) = state
        .coordinator
        .complete_run(RunId(id), &body.output_filename, &body.artifact_type)
        .map_err(map_api_error)?;
    Ok(Json(Completed { run, artifact }))
}

async fn get_artifact(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Artifact> {
    let artifact = state
        .coordinator
        .artifact(ArtifactId(id))
        .map_err(map_api_error)?;
    Ok(Json(artifact))
}

async fn publish_artifact(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Artifact> {
    let artifact = state
        .coordinator
        .publish_artifact(ArtifactId(id))
        .map_err(map_api_error)?;
    Ok(Json(artifact))
}

async fn version_chain(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<ChainView> {
    let chain = state
        .coordinator
        .get_version_chain(ArtifactId(id))
        .map_err(map_api_error)?;
    Ok(Json(chain))
}

async fn version_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Vec<Artifact>> {
    let history = state
        .coordinator
        .version_history(ArtifactId(id))
        .map_err(map_api_error)?;
    Ok(Json(history))
}

fn map_api_error(err: Error) -> (StatusCode, Json<ErrorBody>) {
    let (status, code) = match &err {
        Error::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        Error::SkillNotFound(_) => (StatusCode::NOT_FOUND, "skill_not_found"),
        Error::InvalidPath { .. }
        | Error::OutsideSandbox { .. }
        | Error::InvalidInput(_)
        | Error::InvalidInitialPhase(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
        Error::InvalidTransition { .. } | Error::CompletionRequired(_) => {
            (StatusCode::CONFLICT, "conflict")
        }
        Error::DataIntegrity(_) | Error::Store(_) => {
            tracing::error!(error = %err, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}

use crate::handlers::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use krakenhashes_db::{JobRepository, PresetJobRepository, WorkflowRepository};
use krakenhashes_models::{JobExecution, PresetJob, Workflow};
use serde::Deserialize;

/// POST /api/v1/jobs/presets
pub async fn create_preset_job(
    State(state): State<AppState>,
    Json(preset): Json<PresetJob>,
) -> Result<(StatusCode, Json<i64>), ApiError> {
    let connection = state.database.get_connection()?;
    let id = PresetJobRepository::new(connection).create(&preset).await?;
    Ok((StatusCode::CREATED, Json(id)))
}

/// GET /api/v1/jobs/presets/:id
pub async fn get_preset_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<PresetJob>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(PresetJobRepository::new(connection).get(id).await?))
}

/// GET /api/v1/jobs/presets
pub async fn list_preset_jobs(State(state): State<AppState>) -> Result<Json<Vec<PresetJob>>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(PresetJobRepository::new(connection).list().await?))
}

/// POST /api/v1/jobs/workflows
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(workflow): Json<Workflow>,
) -> Result<(StatusCode, Json<i64>), ApiError> {
    let connection = state.database.get_connection()?;
    let id = WorkflowRepository::new(connection).create(&workflow).await?;
    Ok((StatusCode::CREATED, Json(id)))
}

/// GET /api/v1/jobs/workflows/:id
pub async fn get_workflow(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Workflow>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(WorkflowRepository::new(connection).get(id).await?))
}

#[derive(Deserialize)]
pub struct SubmitExecutionRequest {
    pub preset_job_id: i64,
    pub hashlist_id: i64,
    pub priority: i32,
    /// Precomputed total keyspace for this (preset, hashlist) pairing.
    /// Sizing the keyspace from wordlist lengths and mask charsets is the
    /// submitting client's responsibility; the coordinator only schedules
    /// chunks within whatever total it is given.
    pub keyspace_total: i64,
}

/// POST /api/v1/jobs/executions
pub async fn submit_execution(
    State(state): State<AppState>,
    Json(request): Json<SubmitExecutionRequest>,
) -> Result<(StatusCode, Json<i64>), ApiError> {
    let connection = state.database.get_connection()?;
    let id = JobRepository::new(connection)
        .create_execution(request.preset_job_id, request.hashlist_id, request.priority, request.keyspace_total)
        .await?;
    Ok((StatusCode::CREATED, Json(id)))
}

/// GET /api/v1/jobs/executions/:id
pub async fn get_execution(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<JobExecution>, ApiError> {
    let connection = state.database.get_connection()?;
    Ok(Json(JobRepository::new(connection).get_execution(id).await?))
}

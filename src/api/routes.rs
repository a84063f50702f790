//! API route definitions.

use super::state::AppState;
use super::ApiError;
use crate::config::SweepConfig;
use crate::error::Error;
use crate::storage::ExecutionStatus;
use crate::sweep::Batch;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/configs", get(list_configs).post(create_config))
        .route("/configs/{name}", get(get_config).delete(delete_config))
        .route("/executions", post(start_execution).get(list_executions))
        .route("/executions/{id}", get(execution_status).delete(delete_execution))
        .route("/executions/{id}/stop", post(stop_execution))
        .route("/executions/{id}/results", get(execution_results))
        .route("/executions/{id}/analysis", get(execution_analysis))
        .route("/worker/prepare", post(worker_prepare))
        .route("/worker/execute-batch", post(worker_execute_batch))
        .route("/worker/aggregate", post(worker_aggregate))
        .route("/worker/finalize", post(worker_finalize))
        .route("/worker/run", post(worker_run))
        .route("/maintenance/cleanup", delete(cleanup))
}

fn envelope(data: Value) -> Json<Value> {
    Json(json!({
        "data": data,
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

async fn health() -> Json<Value> {
    envelope(json!({ "status": "ok" }))
}

async fn list_configs(State(state): State<AppState>) -> Json<Value> {
    let summaries = state.configs.list();
    envelope(json!({ "configs": summaries, "total": summaries.len() }))
}

async fn get_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let config = state
        .configs
        .load(&name)
        .map_err(|e| Error::InvalidConfiguration(format!("{:#}", e)))?;
    Ok(envelope(json!(config)))
}

async fn create_config(
    State(state): State<AppState>,
    Json(config): Json<SweepConfig>,
) -> Result<Json<Value>, ApiError> {
    config.validate()?;
    let filename = state
        .configs
        .save(&config)
        .map_err(Error::persistence)?;
    Ok(envelope(json!({ "filename": filename })))
}

async fn delete_config(State(state): State<AppState>, Path(name): Path<String>) -> Json<Value> {
    let deleted = state.configs.delete(&name);
    envelope(json!({ "deleted": deleted }))
}

/// Start either a saved config (by name) or an inline one.
#[derive(Deserialize)]
#[serde(untagged)]
enum StartRequest {
    Named { config_name: String },
    Inline(SweepConfig),
}

async fn start_execution(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<Value>, ApiError> {
    let config = match request {
        StartRequest::Named { config_name } => state
            .configs
            .load(&config_name)
            .map_err(|e| Error::InvalidConfiguration(format!("{:#}", e)))?,
        StartRequest::Inline(config) => config,
    };

    let receipt = state.orchestrator.start(config).await?;
    Ok(envelope(json!(receipt)))
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

async fn list_executions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>, ApiError> {
    let executions = state.orchestrator.list(params.limit).await?;
    Ok(envelope(json!({
        "executions": executions,
        "total": executions.len()
    })))
}

async fn execution_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let execution = state.orchestrator.status(id).await?;
    Ok(envelope(json!(execution)))
}

async fn stop_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let stopped = state.orchestrator.stop(id).await?;
    Ok(envelope(json!({ "stopped": stopped })))
}

async fn delete_execution(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.orchestrator.delete(id).await?;
    Ok(envelope(json!({ "deleted": deleted })))
}

async fn execution_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let results = state.orchestrator.results(id).await?;
    Ok(envelope(json!({
        "results": results,
        "total": results.len()
    })))
}

async fn execution_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let analysis = state.orchestrator.analyze(id).await?;
    Ok(envelope(json!(analysis)))
}

/// Worker endpoints, called by the dispatch backend. They carry the full
/// config so a worker invocation needs nothing beyond its request body.
#[derive(Deserialize)]
struct PrepareRequest {
    execution_id: Uuid,
    config: SweepConfig,
    worker_count: u32,
}

async fn worker_prepare(
    State(state): State<AppState>,
    Json(request): Json<PrepareRequest>,
) -> Result<Json<Value>, ApiError> {
    let batches = state
        .orchestrator
        .prepare_batches(request.execution_id, &request.config, request.worker_count)
        .await?;
    Ok(envelope(json!({ "batches": batches })))
}

#[derive(Deserialize)]
struct ExecuteBatchRequest {
    execution_id: Uuid,
    batch: Batch,
    #[serde(default)]
    delay_secs: f64,
    #[serde(default = "default_batch_timeout")]
    timeout_secs: u64,
}

fn default_batch_timeout() -> u64 {
    60
}

async fn worker_execute_batch(
    State(state): State<AppState>,
    Json(request): Json<ExecuteBatchRequest>,
) -> Result<Json<Value>, ApiError> {
    let summary = state
        .orchestrator
        .execute_batch(
            request.execution_id,
            request.batch,
            request.delay_secs,
            request.timeout_secs,
        )
        .await?;
    Ok(envelope(json!(summary)))
}

#[derive(Deserialize)]
struct AggregateRequest {
    execution_id: Uuid,
    summaries: Vec<crate::engine::BatchSummary>,
}

async fn worker_aggregate(
    State(state): State<AppState>,
    Json(request): Json<AggregateRequest>,
) -> Result<Json<Value>, ApiError> {
    let (completed, failed) = state
        .orchestrator
        .aggregate_batches(request.execution_id, &request.summaries)
        .await?;
    Ok(envelope(json!({ "completed": completed, "failed": failed })))
}

#[derive(Deserialize)]
struct FinalizeRequest {
    execution_id: Uuid,
    #[serde(default = "default_final_status")]
    status: ExecutionStatus,
    #[serde(default)]
    error: Option<String>,
}

fn default_final_status() -> ExecutionStatus {
    ExecutionStatus::Completed
}

async fn worker_finalize(
    State(state): State<AppState>,
    Json(request): Json<FinalizeRequest>,
) -> Result<Json<Value>, ApiError> {
    let execution = state
        .orchestrator
        .finalize(
            request.execution_id,
            request.status,
            request.error.as_deref(),
        )
        .await?;
    Ok(envelope(json!(execution)))
}

async fn worker_run(
    State(state): State<AppState>,
    Json(request): Json<PrepareRequest>,
) -> Result<Json<Value>, ApiError> {
    let execution = state
        .orchestrator
        .run_dispatched(request.execution_id, &request.config, request.worker_count)
        .await?;
    Ok(envelope(json!(execution)))
}

#[derive(Deserialize)]
struct CleanupParams {
    #[serde(default = "default_retention_days")]
    days: i64,
}

fn default_retention_days() -> i64 {
    30
}

async fn cleanup(
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.orchestrator.cleanup_older_than(params.days).await?;
    Ok(envelope(json!({ "removed": removed })))
}

use crate::api::{ApiJson, ApiResponse, AppError, AppState};
use crate::persistence::model::QueryResult;
use crate::run::dispatch::{start_run as dispatch_run, StartRunCommand};
use crate::run::model::{Run, StatusReport};
use axum::extract::{Path, Query, State};
use serde::Deserialize;

pub const DEFAULT_RUN_LIST_LIMIT: i32 = 10;

pub async fn start_run(
    Path(project_id): Path<String>,
    params: Query<StartRunParams>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<Run>, AppError> {
    let result = dispatch_run(
        app_state.repository,
        app_state.runner,
        StartRunCommand {
            project_id,
            duration_seconds: params.duration,
        },
    )
    .await;
    ApiResponse::from(result)
}

pub async fn get_run(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<Run>, AppError> {
    let result = app_state.repository.runs().get(&id).await;
    ApiResponse::from_option(result)
}

pub async fn list_runs(
    Path(project_id): Path<String>,
    params: Query<RunListParams>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<QueryResult<Run>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_RUN_LIST_LIMIT).clamp(1, 100);
    let result = app_state
        .repository
        .runs()
        .list_for_project(&project_id, limit, params.next_page_key.clone())
        .await;
    ApiResponse::from(result)
}

/// Asynchronous report channel: the runner pushes status updates and
/// mid-run progress heartbeats here. The ledger enforces the state machine;
/// the dispatch path is not involved.
pub async fn report_status(
    Path(id): Path<String>,
    State(app_state): State<AppState>,
    ApiJson(report): ApiJson<StatusReport>,
) -> Result<ApiResponse<Run>, AppError> {
    let result = app_state
        .repository
        .runs()
        .record_report(&id, report.status, report.metrics())
        .await;
    ApiResponse::from(result)
}

#[derive(Deserialize)]
pub struct StartRunParams {
    pub duration: Option<u64>,
}

#[derive(Deserialize, Clone)]
pub struct RunListParams {
    pub limit: Option<i32>,
    pub next_page_key: Option<String>,
}

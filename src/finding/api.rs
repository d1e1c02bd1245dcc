use crate::api::{ApiJson, ApiResponse, AppError, AppState};
use crate::finding::model::{Finding, FindingReport};
use crate::persistence::model::{epoch_millis, QueryResult};
use axum::extract::{Path, Query, State};
use serde::Deserialize;

/// Ingests a finding report from the runner. Reports racing the final
/// status transition are accepted within the configured grace window after
/// the run finished; later ones are stale.
pub async fn record_finding(
    Path(run_id): Path<String>,
    State(app_state): State<AppState>,
    ApiJson(report): ApiJson<FindingReport>,
) -> Result<ApiResponse<Finding>, AppError> {
    report.validate()?;
    let run = app_state
        .repository
        .runs()
        .get(&run_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("run {} not found", run_id)))?;
    if !run.accepts_reports_at(epoch_millis(), app_state.config.finding_grace) {
        return Err(AppError::StaleReport(format!(
            "run {} finished outside the report grace window",
            run_id
        )));
    }
    let finding = Finding::builder()
        .run_id(run.id)
        .kind(report.kind)
        .input_data(report.input_data)
        .maybe_output_log(report.output_log)
        .build();
    let result = app_state.repository.findings().create(finding).await;
    ApiResponse::from(result)
}

pub async fn list_findings(
    Path(run_id): Path<String>,
    params: Query<FindingListParams>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<QueryResult<Finding>>, AppError> {
    let result = app_state
        .repository
        .findings()
        .list_for_run(&run_id, params.next_page_key.clone())
        .await;
    ApiResponse::from(result)
}

#[derive(Deserialize, Clone)]
pub struct FindingListParams {
    pub next_page_key: Option<String>,
}

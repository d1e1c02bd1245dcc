use crate::api::{ApiJson, ApiResponse, AppError, AppState};
use crate::persistence::repo::Repository;
use crate::project::model::{CreateProjectRequest, Project, ProjectDetail};
use crate::run::api::DEFAULT_RUN_LIST_LIMIT;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

pub async fn create_project(
    State(repository): State<Repository>,
    ApiJson(request): ApiJson<CreateProjectRequest>,
) -> Result<ApiResponse<Project>, AppError> {
    request.validate()?;
    let project = Project::builder()
        .name(request.name)
        .language(request.language)
        .code(request.code)
        .build();
    let result = repository.projects().create(project).await;
    ApiResponse::from(result)
}

pub async fn list_projects(
    State(repository): State<Repository>,
) -> Result<ApiResponse<Vec<Project>>, AppError> {
    let result = repository.projects().list().await;
    ApiResponse::from(result)
}

/// Project detail projection: the project plus its N most recent runs.
pub async fn get_project(
    Path(id): Path<String>,
    params: Query<ProjectDetailParams>,
    State(app_state): State<AppState>,
) -> Result<ApiResponse<ProjectDetail>, AppError> {
    let project = app_state
        .repository
        .projects()
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("project {} not found", id)))?;
    let limit = params.limit.unwrap_or(DEFAULT_RUN_LIST_LIMIT).clamp(1, 100);
    let runs = app_state
        .repository
        .runs()
        .list_for_project(&project.id, limit, None)
        .await?;
    Ok(ApiResponse(ProjectDetail {
        project,
        runs: runs.items,
    }))
}

#[derive(Deserialize, Clone)]
pub struct ProjectDetailParams {
    pub limit: Option<i32>,
}

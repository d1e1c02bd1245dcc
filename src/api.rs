use crate::config::Config;
use crate::finding::api::{list_findings, record_finding};
use crate::persistence::repo::Repository;
use crate::project::api::{create_project, get_project, list_projects};
use crate::run::api::{get_run, list_runs, report_status, start_run};
use crate::run::reconcile;
use crate::runner::RunnerClient;
use axum::body::Body;
use axum::extract::{FromRef, FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub runner: Arc<RunnerClient>,
    pub config: Config,
}

// support extracting a bare `Repository` from handlers that only read/write
impl FromRef<AppState> for Repository {
    fn from_ref(app_state: &AppState) -> Repository {
        app_state.repository.deref().clone()
    }
}

pub async fn build_api(config: Config) -> Router {
    tracing_subscriber::fmt::init();
    let repository = Arc::new(Repository::new().await);
    let runner = Arc::new(RunnerClient::new(
        config.runner_url.clone(),
        config.submit_timeout,
    ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app_state = AppState {
        repository: Arc::clone(&repository),
        runner,
        config: config.clone(),
    };

    tokio::spawn(reconcile::sweep_loop(repository, config));

    Router::new()
        .route("/health", get(health))
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/:id", get(get_project))
        .route("/projects/:id/runs", get(list_runs).post(start_run))
        .route("/runs/:id", get(get_run))
        .route("/runs/:id/status", post(report_status))
        .route("/runs/:id/findings", get(list_findings).post(record_finding))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(LatencyUnit::Micros),
                ),
        )
        .with_state(app_state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "fuzzdeck is active")
}

/// JSON body extractor that reports malformed payloads (bad syntax,
/// unknown enum variants) through the crate's own error taxonomy instead
/// of axum's default 422 rejection.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::Validation(rejection.body_text())),
        }
    }
}

pub struct ApiResponse<T>(pub T);

impl<T> ApiResponse<T> {
    pub fn from(result: Result<T, AppError>) -> Result<ApiResponse<T>, AppError> {
        result.map(ApiResponse)
    }

    pub fn from_option(result: Result<Option<T>, AppError>) -> Result<ApiResponse<T>, AppError> {
        match result {
            Ok(Some(value)) => Ok(ApiResponse(value)),
            Ok(None) => Err(AppError::NotFound("Not found".to_string())),
            Err(e) => Err(e),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        match serde_json::to_string(&self.0) {
            Ok(json) => Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(json.into())
                .unwrap(),
            Err(_) => Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body("Failed to serialize response".into())
                .unwrap(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("invalid metric: {0}")]
    InvalidMetric(String),
    #[error("stale report: {0}")]
    StaleReport(String),
    #[error("job submission failed: {0}")]
    Submission(String),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidMetric(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::StaleReport(_) => StatusCode::GONE,
            AppError::Submission(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Deserialize, Serialize, Clone)]
pub struct ErrorBody {
    pub message: String,
}

impl From<ErrorBody> for Body {
    fn from(body: ErrorBody) -> Body {
        Body::from(serde_json::to_string(&body).unwrap_or_default())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Internal(message) => {
                tracing::error!("{}", message);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        Response::builder()
            .status(status)
            .header("Content-Type", "application/json")
            .body(ErrorBody { message }.into())
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::InvalidMetric("x".into()), StatusCode::BAD_REQUEST),
            (AppError::InvalidTransition("x".into()), StatusCode::CONFLICT),
            (AppError::StaleReport("x".into()), StatusCode::GONE),
            (AppError::Submission("x".into()), StatusCode::BAD_GATEWAY),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected);
        }
    }

    #[test]
    fn internal_error_message_is_redacted() {
        let response = AppError::Internal("aws credentials missing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unknown_enum_variant_maps_to_validation() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"status":"paused"}"#))
            .unwrap();
        let result =
            ApiJson::<crate::run::model::StatusReport>::from_request(request, &()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn malformed_body_maps_to_validation() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from("not json"))
            .unwrap();
        let result =
            ApiJson::<crate::finding::model::FindingReport>::from_request(request, &()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn well_formed_body_is_accepted() {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"type":"crash","inputData":"AAAA"}"#))
            .unwrap();
        let result =
            ApiJson::<crate::finding::model::FindingReport>::from_request(request, &()).await;
        assert!(result.is_ok());
    }
}

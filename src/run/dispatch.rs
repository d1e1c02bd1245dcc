use crate::api::AppError;
use crate::persistence::repo::Repository;
use crate::run::model::{Run, RunMetrics, RunStatus};
use crate::runner::{JobRequest, RunnerClient, DEFAULT_DURATION_SECONDS};
use std::sync::Arc;
use tracing::{error, info};

pub struct StartRunCommand {
    pub project_id: String,
    pub duration_seconds: Option<u64>,
}

/// Starts a fuzzing run: resolves the project, records the run as `queued`,
/// then submits the job to the runner exactly once. The run row is written
/// before the network call so a crash in between leaves a discoverable
/// `queued` run for the reconciliation sweep. Submission is not retried
/// inline; the user-facing path stays bounded in latency.
pub async fn start_run(
    repository: Arc<Repository>,
    runner: Arc<RunnerClient>,
    command: StartRunCommand,
) -> Result<Run, AppError> {
    let project = repository
        .projects()
        .get(&command.project_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("project {} not found", command.project_id))
        })?;

    info!("starting run for project {}", project.id);
    let run = repository
        .runs()
        .create(Run::builder().project_id(project.id.clone()).build())
        .await?;

    let job = JobRequest {
        language: project.language,
        code: project.code,
        duration: command.duration_seconds.unwrap_or(DEFAULT_DURATION_SECONDS),
    };
    match runner.submit_job(&job).await {
        Ok(()) => Ok(run),
        Err(submit_error) => {
            // A definitively failed submission must not leave the run
            // queued. If even the failure transition cannot commit, the
            // run needs reconciliation; log it, never swallow it.
            if let Err(transition_error) = repository
                .runs()
                .transition(&run.id, RunStatus::Failed, RunMetrics::default())
                .await
            {
                error!(
                    "run {} stuck in queued after failed submission, reconciliation required: {}",
                    run.id, transition_error
                );
            }
            Err(AppError::Submission(submit_error.to_string()))
        }
    }
}

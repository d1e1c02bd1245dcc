use crate::project::model::Language;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const DEFAULT_DURATION_SECONDS: u64 = 60;

/// Job description POSTed to the runner. The runner owns everything past
/// acceptance: compilation, execution, sanitizers.
#[derive(Serialize, Clone, Debug)]
pub struct JobRequest {
    pub language: Language,
    pub code: String,
    pub duration: u64,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("runner unreachable: {0}")]
    Unreachable(String),
    #[error("runner rejected job with status {0}")]
    Rejected(u16),
}

/// Thin client for the runner's job-acceptance endpoint. The per-request
/// timeout bounds acceptance latency, not the fuzzing duration.
#[derive(Clone)]
pub struct RunnerClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl RunnerClient {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url,
            timeout,
        }
    }

    pub async fn submit_job(&self, job: &JobRequest) -> Result<(), SubmissionError> {
        let url = format!("{}/job", self.base_url.trim_end_matches('/'));
        info!("submitting fuzz job to {}", url);
        let result = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(job)
            .send()
            .await;
        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    info!("runner accepted job, status: {}", status);
                    Ok(())
                } else {
                    info!("runner rejected job, status: {}", status);
                    Err(SubmissionError::Rejected(status.as_u16()))
                }
            }
            Err(error) => Err(SubmissionError::Unreachable(error.to_string())),
        }
    }
}

use crate::api::AppError;
use crate::config::Config;
use crate::persistence::model::epoch_millis;
use crate::persistence::repo::Repository;
use crate::run::model::{RunMetrics, RunStatus};
use std::sync::Arc;
use tracing::{error, info};

/// Periodic sweep that force-fails runs the runner silently abandoned:
/// still `queued` or `running`, no report within the staleness threshold.
pub async fn sweep_loop(repository: Arc<Repository>, config: Config) {
    let mut ticker = tokio::time::interval(config.sweep_interval);
    loop {
        ticker.tick().await;
        if let Err(err) = sweep_once(&repository, &config).await {
            error!("reconciliation sweep failed: {}", err);
        }
    }
}

async fn sweep_once(repository: &Repository, config: &Config) -> Result<(), AppError> {
    let cutoff = epoch_millis().saturating_sub(config.stale_after.as_millis() as u64);
    let stale = repository.runs().list_stale(cutoff).await?;
    for run in stale {
        info!(
            "run {} has had no report since {}, forcing to failed",
            run.id, run.updated_at
        );
        match repository
            .runs()
            .transition(&run.id, RunStatus::Failed, RunMetrics::default())
            .await
        {
            Ok(_) => {}
            // A real report won the race; nothing to reconcile anymore.
            Err(AppError::InvalidTransition(_)) => {}
            Err(err) => error!("failed to reconcile run {}: {}", run.id, err),
        }
    }
    Ok(())
}

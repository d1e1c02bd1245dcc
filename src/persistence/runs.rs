use crate::api::AppError;
use crate::persistence::model::{epoch_millis, PageKey, QueryResult};
use crate::persistence::repo::Table;
use crate::run::model::{Run, RunMetrics, RunStatus};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use std::sync::Arc;

/// GSI keyed by project_id; run ids are UUIDv7, so descending sort-key
/// order is newest-first.
const PROJECT_INDEX: &str = "project_id-index";

pub struct RunOperations {
    pub(crate) client: Arc<Client>,
}

struct RunTable();

impl Table<Run> for RunTable {
    fn table_name() -> String {
        "runs".to_string()
    }

    fn partition_key_name() -> String {
        "id".to_string()
    }

    fn key_from_entity(entity: &Run) -> HashMap<String, AttributeValue> {
        HashMap::from([(
            Self::partition_key_name(),
            AttributeValue::S(entity.id.clone()),
        )])
    }
}

impl RunOperations {
    pub async fn create(&self, run: Run) -> Result<Run, AppError> {
        RunTable::put_item(self.client.clone(), run).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Run>, AppError> {
        RunTable::get_item(self.client.clone(), id.to_string(), None).await
    }

    pub async fn list_for_project(
        &self,
        project_id: &str,
        limit: i32,
        next_page_key: Option<String>,
    ) -> Result<QueryResult<Run>, AppError> {
        let exclusive_start = match next_page_key {
            Some(key) => Some(PageKey::from_next_page_key(&key)?.to_attribute_values()),
            None => None,
        };
        let result = RunTable::query_builder(self.client.clone())
            .index_name(PROJECT_INDEX)
            .scan_index_forward(false)
            .limit(limit)
            .expression_attribute_names("#pk", "project_id")
            .expression_attribute_values(":pk", AttributeValue::S(project_id.to_string()))
            .key_condition_expression("#pk = :pk")
            .set_exclusive_start_key(exclusive_start)
            .send()
            .await;
        RunTable::from_query_result(result)
    }

    /// Applies a status transition with optimistic concurrency: the update
    /// is guarded on the status observed by the consistent read, so racing
    /// transitions on the same run cannot both commit. A failed condition
    /// means another transition won the race.
    pub async fn transition(
        &self,
        id: &str,
        next: RunStatus,
        metrics: RunMetrics,
    ) -> Result<Run, AppError> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", id)))?;
        let updated = current.apply_transition(next, metrics, epoch_millis())?;
        self.commit(&current, updated).await
    }

    /// Handles an inbound runner report. Unlike `transition`, a repeated
    /// `running` status is accepted as a liveness heartbeat that merges
    /// counters and bumps `updated_at`; the commit is guarded the same way,
    /// so a heartbeat racing a terminal transition still loses.
    pub async fn record_report(
        &self,
        id: &str,
        status: RunStatus,
        metrics: RunMetrics,
    ) -> Result<Run, AppError> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("run {} not found", id)))?;
        let updated = current.apply_report(status, metrics, epoch_millis())?;
        self.commit(&current, updated).await
    }

    async fn commit(&self, current: &Run, updated: Run) -> Result<Run, AppError> {
        let id = updated.id.clone();
        let mut update_expression =
            String::from("SET #s = :s, #ec = :ec, #cov = :cov, #ua = :ua");
        let mut builder = RunTable::update_builder(self.client.clone())
            .set_key(Some(RunTable::unique_key(id.to_string(), None)))
            .condition_expression("#s = :expected")
            .expression_attribute_names("#s", "status")
            .expression_attribute_names("#ec", "execution_count")
            .expression_attribute_names("#cov", "coverage")
            .expression_attribute_names("#ua", "updated_at")
            .expression_attribute_values(
                ":expected",
                AttributeValue::S(current.status.as_str().to_string()),
            )
            .expression_attribute_values(
                ":s",
                AttributeValue::S(updated.status.as_str().to_string()),
            )
            .expression_attribute_values(
                ":ec",
                AttributeValue::N(updated.execution_count.to_string()),
            )
            .expression_attribute_values(":cov", AttributeValue::N(updated.coverage.to_string()))
            .expression_attribute_values(":ua", AttributeValue::N(updated.updated_at.to_string()));
        if let Some(finished_at) = updated.finished_at {
            update_expression.push_str(", finished_at = :fa");
            builder = builder
                .expression_attribute_values(":fa", AttributeValue::N(finished_at.to_string()));
        }
        let result = builder.update_expression(update_expression).send().await;
        match result {
            Ok(_) => Ok(updated),
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception())
                {
                    Err(AppError::InvalidTransition(format!(
                        "run {} was transitioned concurrently",
                        id
                    )))
                } else {
                    Err(AppError::Internal(err.to_string()))
                }
            }
        }
    }

    /// All non-terminal runs whose last report predates the cutoff. Walks
    /// every scan page; the result feeds the reconciliation sweep.
    pub async fn list_stale(&self, cutoff_millis: u64) -> Result<Vec<Run>, AppError> {
        let mut stale: Vec<Run> = vec![];
        let mut exclusive_start: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let result = RunTable::scan_builder(self.client.clone())
                .filter_expression("#s IN (:queued, :running) AND #ua < :cutoff")
                .expression_attribute_names("#s", "status")
                .expression_attribute_names("#ua", "updated_at")
                .expression_attribute_values(
                    ":queued",
                    AttributeValue::S(RunStatus::Queued.as_str().to_string()),
                )
                .expression_attribute_values(
                    ":running",
                    AttributeValue::S(RunStatus::Running.as_str().to_string()),
                )
                .expression_attribute_values(
                    ":cutoff",
                    AttributeValue::N(cutoff_millis.to_string()),
                )
                .set_exclusive_start_key(exclusive_start.take())
                .send()
                .await;
            match result {
                Ok(output) => {
                    stale.extend(RunTable::parse_items(output.items.unwrap_or_default())?);
                    match output.last_evaluated_key {
                        Some(last_key) => exclusive_start = Some(last_key),
                        None => break,
                    }
                }
                Err(err) => return Err(AppError::Internal(err.to_string())),
            }
        }
        Ok(stale)
    }
}

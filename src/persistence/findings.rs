use crate::api::AppError;
use crate::finding::model::Finding;
use crate::persistence::model::{PageKey, QueryResult};
use crate::persistence::repo::Table;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use std::sync::Arc;

pub struct FindingOperations {
    pub(crate) client: Arc<Client>,
}

struct FindingTable();

impl Table<Finding> for FindingTable {
    fn table_name() -> String {
        "findings".to_string()
    }

    fn partition_key_name() -> String {
        "run_id".to_string()
    }

    fn sort_key_name() -> Option<String> {
        Some("id".to_string())
    }

    fn key_from_entity(entity: &Finding) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (
                Self::partition_key_name(),
                AttributeValue::S(entity.run_id.clone()),
            ),
            ("id".to_string(), AttributeValue::S(entity.id.clone())),
        ])
    }
}

impl FindingOperations {
    pub async fn create(&self, finding: Finding) -> Result<Finding, AppError> {
        FindingTable::put_item(self.client.clone(), finding).await
    }

    /// Findings for one run, newest first (ids are UUIDv7).
    pub async fn list_for_run(
        &self,
        run_id: &str,
        next_page_key: Option<String>,
    ) -> Result<QueryResult<Finding>, AppError> {
        let exclusive_start = match next_page_key {
            Some(key) => Some(PageKey::from_next_page_key(&key)?.to_attribute_values()),
            None => None,
        };
        let result = FindingTable::query_builder(self.client.clone())
            .scan_index_forward(false)
            .expression_attribute_names("#pk", "run_id")
            .expression_attribute_values(":pk", AttributeValue::S(run_id.to_string()))
            .key_condition_expression("#pk = :pk")
            .set_exclusive_start_key(exclusive_start)
            .send()
            .await;
        FindingTable::from_query_result(result)
    }
}

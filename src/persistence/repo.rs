use crate::api::AppError;
use crate::persistence::findings::FindingOperations;
use crate::persistence::model::{PageKey, QueryResult};
use crate::persistence::projects::ProjectOperations;
use crate::persistence::runs::RunOperations;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::operation::query::{QueryError, QueryOutput};
use aws_sdk_dynamodb::operation::scan::builders::ScanFluentBuilder;
use aws_sdk_dynamodb::operation::update_item::builders::UpdateItemFluentBuilder;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_dynamo::aws_sdk_dynamodb_1::to_item;
use serde_dynamo::{from_attribute_value, from_item};
use std::collections::HashMap;
use std::sync::Arc;

/// Generic access to one DynamoDB table. Tables with a simple primary key
/// leave `sort_key_name` at its default.
pub(crate) trait Table<T>
where
    T: DeserializeOwned + Serialize + Clone,
{
    fn table_name() -> String;
    fn partition_key_name() -> String;
    fn sort_key_name() -> Option<String> {
        None
    }

    fn key_from_entity(entity: &T) -> HashMap<String, AttributeValue>;

    fn unique_key(
        partition_key: String,
        sort_key: Option<String>,
    ) -> HashMap<String, AttributeValue> {
        let mut key = HashMap::from([(
            Self::partition_key_name(),
            AttributeValue::S(partition_key),
        )]);
        if let (Some(name), Some(value)) = (Self::sort_key_name(), sort_key) {
            key.insert(name, AttributeValue::S(value));
        }
        key
    }

    async fn get_item(
        client: Arc<Client>,
        partition_key: String,
        sort_key: Option<String>,
    ) -> Result<Option<T>, AppError> {
        let result = client
            .get_item()
            .table_name(Self::table_name())
            .set_key(Some(Self::unique_key(partition_key, sort_key)))
            .consistent_read(true)
            .send()
            .await;
        match result {
            Ok(output) => match output.item {
                Some(item_map) => from_item(item_map)
                    .map(Some)
                    .map_err(|e| AppError::Internal(e.to_string())),
                None => Ok(None),
            },
            Err(e) => Err(AppError::Internal(e.to_string())),
        }
    }

    async fn put_item(client: Arc<Client>, entity: T) -> Result<T, AppError> {
        let mut item: HashMap<String, AttributeValue> =
            to_item(entity.clone()).map_err(|e| AppError::Internal(e.to_string()))?;
        item.extend(Self::key_from_entity(&entity));
        let result = client
            .put_item()
            .table_name(Self::table_name())
            .set_item(Some(item))
            .send()
            .await;
        match result {
            Ok(_) => Ok(entity),
            Err(err) => Err(AppError::Internal(err.to_string())),
        }
    }

    fn query_builder(client: Arc<Client>) -> QueryFluentBuilder {
        client.query().table_name(Self::table_name())
    }

    fn update_builder(client: Arc<Client>) -> UpdateItemFluentBuilder {
        client.update_item().table_name(Self::table_name())
    }

    fn scan_builder(client: Arc<Client>) -> ScanFluentBuilder {
        client.scan().table_name(Self::table_name())
    }

    fn parse_items(items: Vec<HashMap<String, AttributeValue>>) -> Result<Vec<T>, AppError> {
        let mut parsed = Vec::with_capacity(items.len());
        for item in items {
            let entity = from_attribute_value(AttributeValue::M(item))
                .map_err(|e| AppError::Internal(e.to_string()))?;
            parsed.push(entity);
        }
        Ok(parsed)
    }

    fn from_query_result(
        result: Result<QueryOutput, SdkError<QueryError, HttpResponse>>,
    ) -> Result<QueryResult<T>, AppError> {
        match result {
            Ok(output) => Ok(QueryResult {
                items: Self::parse_items(output.items.unwrap_or_default())?,
                next_page_key: output.last_evaluated_key.map(|last_key| {
                    PageKey::from_attribute_values(last_key).to_next_page_key()
                }),
            }),
            Err(err) => Err(AppError::Internal(err.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct Repository {
    client: Arc<Client>,
}

impl Repository {
    pub async fn new() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = Client::new(&config);
        Repository {
            client: Arc::new(client),
        }
    }

    pub fn projects(&self) -> ProjectOperations {
        ProjectOperations {
            client: Arc::clone(&self.client),
        }
    }

    pub fn runs(&self) -> RunOperations {
        RunOperations {
            client: Arc::clone(&self.client),
        }
    }

    pub fn findings(&self) -> FindingOperations {
        FindingOperations {
            client: Arc::clone(&self.client),
        }
    }
}

use crate::api::AppError;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Opaque pagination token: the last evaluated key of a query, serialized
/// as JSON so clients can pass it back verbatim.
pub struct PageKey {
    keys: HashMap<String, String>,
}

impl PageKey {
    pub fn from_attribute_values(values: HashMap<String, AttributeValue>) -> Self {
        let mut keys: HashMap<String, String> = HashMap::new();
        values.iter().for_each(|(k, v)| {
            keys.insert(
                k.to_string(),
                v.as_s().map_or(String::new(), |v| v.to_string()),
            );
        });
        Self { keys }
    }

    pub fn to_attribute_values(&self) -> HashMap<String, AttributeValue> {
        let mut keys: HashMap<String, AttributeValue> = HashMap::new();
        self.keys.iter().for_each(|(k, v)| {
            keys.insert(k.to_string(), AttributeValue::S(v.to_string()));
        });
        keys
    }

    pub fn to_next_page_key(&self) -> String {
        serde_json::to_string(&self.keys).unwrap_or_default()
    }

    pub fn from_next_page_key(keys: &str) -> Result<Self, AppError> {
        serde_json::from_str(keys)
            .map(|keys| Self { keys })
            .map_err(|_| AppError::Validation("invalid page key".to_string()))
    }
}

#[derive(Clone, Serialize, Debug)]
pub struct QueryResult<T>
where
    T: DeserializeOwned + Serialize + Clone,
{
    pub items: Vec<T>,
    pub next_page_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_key_round_trips_through_token() {
        let values = HashMap::from([
            ("id".to_string(), AttributeValue::S("run-1".to_string())),
            (
                "project_id".to_string(),
                AttributeValue::S("project-1".to_string()),
            ),
        ]);
        let token = PageKey::from_attribute_values(values.clone()).to_next_page_key();
        let restored = PageKey::from_next_page_key(&token).unwrap();
        assert_eq!(restored.to_attribute_values(), values);
    }

    #[test]
    fn malformed_page_key_is_a_validation_error() {
        let result = PageKey::from_next_page_key("not-json");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

use crate::api::AppError;
use crate::persistence::model::epoch_millis;
use crate::run::model::Run;
use bon::Builder;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, Builder)]
pub struct Project {
    #[builder(default = uuid::Uuid::new_v4().to_string())]
    pub id: String,
    pub name: String,
    pub language: Language,
    pub code: String,
    #[builder(default = epoch_millis())]
    pub created_at: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    Java,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CreateProjectRequest {
    pub name: String,
    pub language: Language,
    pub code: String,
}

impl CreateProjectRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name must not be empty".to_string()));
        }
        if self.code.trim().is_empty() {
            return Err(AppError::Validation("code must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Project detail projection: the project plus its most recent runs,
/// newest first.
#[derive(Serialize, Clone, Debug)]
pub struct ProjectDetail {
    pub project: Project,
    pub runs: Vec<Run>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_uses_lowercase_wire_names() {
        assert_eq!(serde_json::to_string(&Language::Cpp).unwrap(), r#""cpp""#);
        assert_eq!(serde_json::to_string(&Language::Java).unwrap(), r#""java""#);
        let parsed: Language = serde_json::from_str(r#""cpp""#).unwrap();
        assert_eq!(parsed, Language::Cpp);
    }

    #[test]
    fn unknown_language_is_rejected() {
        let result: Result<Language, _> = serde_json::from_str(r#""rust""#);
        assert!(result.is_err());
    }

    #[test]
    fn create_request_requires_name_and_code() {
        let request = CreateProjectRequest {
            name: "  ".to_string(),
            language: Language::Cpp,
            code: "int main() {}".to_string(),
        };
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));

        let request = CreateProjectRequest {
            name: "demo".to_string(),
            language: Language::Cpp,
            code: "".to_string(),
        };
        assert!(matches!(request.validate(), Err(AppError::Validation(_))));

        let request = CreateProjectRequest {
            name: "demo".to_string(),
            language: Language::Cpp,
            code: "int main() {}".to_string(),
        };
        assert!(request.validate().is_ok());
    }
}

use crate::api::AppError;
use crate::persistence::repo::Table;
use crate::project::model::Project;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ProjectOperations {
    pub(crate) client: Arc<Client>,
}

struct ProjectTable();

impl Table<Project> for ProjectTable {
    fn table_name() -> String {
        "projects".to_string()
    }

    fn partition_key_name() -> String {
        "id".to_string()
    }

    fn key_from_entity(entity: &Project) -> HashMap<String, AttributeValue> {
        HashMap::from([(
            Self::partition_key_name(),
            AttributeValue::S(entity.id.clone()),
        )])
    }
}

impl ProjectOperations {
    pub async fn create(&self, project: Project) -> Result<Project, AppError> {
        ProjectTable::put_item(self.client.clone(), project).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Project>, AppError> {
        ProjectTable::get_item(self.client.clone(), id.to_string(), None).await
    }

    /// All projects, newest first. Project ids are v4, so ordering comes
    /// from `created_at` after walking every scan page.
    pub async fn list(&self) -> Result<Vec<Project>, AppError> {
        let mut projects: Vec<Project> = vec![];
        let mut exclusive_start: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let result = ProjectTable::scan_builder(self.client.clone())
                .set_exclusive_start_key(exclusive_start.take())
                .send()
                .await;
            match result {
                Ok(output) => {
                    projects.extend(ProjectTable::parse_items(output.items.unwrap_or_default())?);
                    match output.last_evaluated_key {
                        Some(last_key) => exclusive_start = Some(last_key),
                        None => break,
                    }
                }
                Err(err) => return Err(AppError::Internal(err.to_string())),
            }
        }
        Ok(order_newest_first(projects))
    }
}

pub(crate) fn order_newest_first(mut projects: Vec<Project>) -> Vec<Project> {
    projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    projects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::Language;

    fn project_created_at(created_at: u64) -> Project {
        Project {
            id: format!("project-{}", created_at),
            name: "demo".to_string(),
            language: Language::Cpp,
            code: "int main() {}".to_string(),
            created_at,
        }
    }

    #[test]
    fn listing_orders_newest_first() {
        let ordered = order_newest_first(vec![
            project_created_at(1_000),
            project_created_at(3_000),
            project_created_at(2_000),
        ]);
        let created: Vec<u64> = ordered.iter().map(|p| p.created_at).collect();
        assert_eq!(created, vec![3_000, 2_000, 1_000]);
    }
}

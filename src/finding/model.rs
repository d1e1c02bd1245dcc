use crate::api::AppError;
use crate::persistence::model::epoch_millis;
use bon::Builder;
use serde::{Deserialize, Serialize};

/// A single anomaly reported during a run. Append-only: findings are never
/// mutated or deleted, and repeated reports create distinct rows (the store
/// is a multiset, no content dedup).
#[derive(Serialize, Deserialize, Clone, Debug, Builder)]
pub struct Finding {
    #[builder(default = uuid::Uuid::now_v7().to_string())]
    pub id: String,
    pub run_id: String,
    #[serde(rename = "type")]
    pub kind: FindingType,
    pub input_data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_log: Option<String>,
    #[builder(default = epoch_millis())]
    pub created_at: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum FindingType {
    Crash,
    Slow,
    Timeout,
}

/// Inbound finding report from the runner.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FindingReport {
    #[serde(rename = "type")]
    pub kind: FindingType,
    pub input_data: String,
    pub output_log: Option<String>,
}

impl FindingReport {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.input_data.is_empty() {
            return Err(AppError::Validation(
                "inputData must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_wire_shape() {
        let report: FindingReport = serde_json::from_str(
            r#"{"type":"crash","inputData":"AAAA","outputLog":"ASAN: heap-buffer-overflow"}"#,
        )
        .unwrap();
        assert_eq!(report.kind, FindingType::Crash);
        assert_eq!(report.input_data, "AAAA");
        assert_eq!(
            report.output_log.as_deref(),
            Some("ASAN: heap-buffer-overflow")
        );

        let minimal: FindingReport =
            serde_json::from_str(r#"{"type":"timeout","inputData":"BBBB"}"#).unwrap();
        assert_eq!(minimal.kind, FindingType::Timeout);
        assert_eq!(minimal.output_log, None);
    }

    #[test]
    fn unknown_type_is_rejected_at_the_boundary() {
        let result: Result<FindingReport, _> =
            serde_json::from_str(r#"{"type":"hang","inputData":"AAAA"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn empty_input_is_rejected() {
        let report = FindingReport {
            kind: FindingType::Crash,
            input_data: String::new(),
            output_log: None,
        };
        assert!(matches!(report.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn repeated_reports_produce_distinct_findings() {
        let report = FindingReport {
            kind: FindingType::Crash,
            input_data: "AAAA".to_string(),
            output_log: None,
        };
        let first = Finding::builder()
            .run_id("run-1".to_string())
            .kind(report.kind)
            .input_data(report.input_data.clone())
            .build();
        let second = Finding::builder()
            .run_id("run-1".to_string())
            .kind(report.kind)
            .input_data(report.input_data.clone())
            .build();
        assert_ne!(first.id, second.id);
    }
}

use crate::api::AppError;
use crate::persistence::model::epoch_millis;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One execution attempt of a project's fuzz target. Never deleted;
/// superseded by newer runs on the same project.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
pub struct Run {
    #[builder(default = uuid::Uuid::now_v7().to_string())]
    pub id: String,
    pub project_id: String,
    #[builder(default = RunStatus::Queued)]
    pub status: RunStatus,
    #[builder(default = epoch_millis())]
    pub started_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
    #[builder(default)]
    pub execution_count: u64,
    #[builder(default)]
    pub coverage: u64,
    /// Bumped on every committed transition; the reconciliation sweep uses
    /// this to detect runs the runner silently abandoned.
    #[builder(default = epoch_millis())]
    pub updated_at: u64,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Failed)
    }

    /// The full transition table. Terminal states are absorbing and a run
    /// can never re-enter `Queued`.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (*self, next),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Queued, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Stopped)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Stopped => "stopped",
            RunStatus::Failed => "failed",
        }
    }
}

/// Progress counters carried on a runner status report. Both are optional;
/// an absent counter leaves the stored value untouched.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub execution_count: Option<u64>,
    pub coverage: Option<u64>,
}

/// Inbound status update from the runner, handled as a command against the
/// run ledger independently of the dispatch path.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: RunStatus,
    pub execution_count: Option<u64>,
    pub coverage: Option<u64>,
}

impl StatusReport {
    pub fn metrics(&self) -> RunMetrics {
        RunMetrics {
            execution_count: self.execution_count,
            coverage: self.coverage,
        }
    }
}

impl Run {
    /// Validates and applies a status transition, returning the updated run.
    /// Counters must be non-decreasing; `finished_at` is set exactly when
    /// the new status is terminal.
    pub fn apply_transition(
        &self,
        next: RunStatus,
        metrics: RunMetrics,
        now: u64,
    ) -> Result<Run, AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "run {} cannot move from {} to {}",
                self.id,
                self.status.as_str(),
                next.as_str()
            )));
        }
        let mut updated = self.merge_metrics(metrics, now)?;
        updated.status = next;
        if next.is_terminal() {
            updated.finished_at = Some(now);
        }
        Ok(updated)
    }

    /// Validates and applies an inbound runner report. A report repeating
    /// the current `running` status is a progress heartbeat: counters merge
    /// and `updated_at` moves, but no state-machine edge is taken. Any
    /// other repeated status, including re-entering `queued`, stays an
    /// `InvalidTransition`.
    pub fn apply_report(
        &self,
        status: RunStatus,
        metrics: RunMetrics,
        now: u64,
    ) -> Result<Run, AppError> {
        if self.status == RunStatus::Running && status == RunStatus::Running {
            return self.merge_metrics(metrics, now);
        }
        self.apply_transition(status, metrics, now)
    }

    fn merge_metrics(&self, metrics: RunMetrics, now: u64) -> Result<Run, AppError> {
        let mut updated = self.clone();
        if let Some(execution_count) = metrics.execution_count {
            if execution_count < self.execution_count {
                return Err(AppError::InvalidMetric(format!(
                    "execution count would decrease from {} to {}",
                    self.execution_count, execution_count
                )));
            }
            updated.execution_count = execution_count;
        }
        if let Some(coverage) = metrics.coverage {
            if coverage < self.coverage {
                return Err(AppError::InvalidMetric(format!(
                    "coverage would decrease from {} to {}",
                    self.coverage, coverage
                )));
            }
            updated.coverage = coverage;
        }
        updated.updated_at = now;
        Ok(updated)
    }

    /// Whether a finding report arriving at `now` is still acceptable.
    /// Reports racing the final status transition are tolerated within the
    /// grace window after `finished_at`.
    pub fn accepts_reports_at(&self, now: u64, grace: Duration) -> bool {
        match self.finished_at {
            None => true,
            Some(finished_at) => now.saturating_sub(finished_at) <= grace.as_millis() as u64,
        }
    }

    /// Whether the run has gone without any report for longer than the
    /// staleness threshold. Only non-terminal runs can be stale.
    pub fn is_stale_at(&self, now: u64, threshold: Duration) -> bool {
        !self.status.is_terminal()
            && now.saturating_sub(self.updated_at) > threshold.as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with_status(status: RunStatus) -> Run {
        Run {
            id: "run-1".to_string(),
            project_id: "project-1".to_string(),
            status,
            started_at: 1_000,
            finished_at: status.is_terminal().then_some(5_000),
            execution_count: 100,
            coverage: 40,
            updated_at: 1_000,
        }
    }

    #[test]
    fn legal_transitions_succeed() {
        let cases = [
            (RunStatus::Queued, RunStatus::Running),
            (RunStatus::Queued, RunStatus::Failed),
            (RunStatus::Running, RunStatus::Stopped),
            (RunStatus::Running, RunStatus::Failed),
        ];
        for (from, to) in cases {
            let run = run_with_status(from);
            let updated = run
                .apply_transition(to, RunMetrics::default(), 2_000)
                .unwrap();
            assert_eq!(updated.status, to);
            assert_eq!(updated.updated_at, 2_000);
        }
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let cases = [
            (RunStatus::Queued, RunStatus::Stopped),
            (RunStatus::Queued, RunStatus::Queued),
            (RunStatus::Running, RunStatus::Queued),
            (RunStatus::Running, RunStatus::Running),
        ];
        for (from, to) in cases {
            let run = run_with_status(from);
            let result = run.apply_transition(to, RunMetrics::default(), 2_000);
            assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        }
    }

    #[test]
    fn terminal_states_are_absorbing() {
        for terminal in [RunStatus::Stopped, RunStatus::Failed] {
            let run = run_with_status(terminal);
            for next in [
                RunStatus::Queued,
                RunStatus::Running,
                RunStatus::Stopped,
                RunStatus::Failed,
            ] {
                let result = run.apply_transition(next, RunMetrics::default(), 9_000);
                assert!(matches!(result, Err(AppError::InvalidTransition(_))));
            }
        }
    }

    #[test]
    fn finished_at_is_set_exactly_on_terminal_transitions() {
        let queued = run_with_status(RunStatus::Queued);
        let running = queued
            .apply_transition(RunStatus::Running, RunMetrics::default(), 2_000)
            .unwrap();
        assert_eq!(running.finished_at, None);

        let stopped = running
            .apply_transition(RunStatus::Stopped, RunMetrics::default(), 3_000)
            .unwrap();
        assert_eq!(stopped.finished_at, Some(3_000));
    }

    #[test]
    fn metrics_merge_is_monotonic() {
        let run = run_with_status(RunStatus::Running);

        let metrics = RunMetrics {
            execution_count: Some(500),
            coverage: Some(80),
        };
        let updated = run
            .apply_transition(RunStatus::Stopped, metrics, 3_000)
            .unwrap();
        assert_eq!(updated.execution_count, 500);
        assert_eq!(updated.coverage, 80);

        // equal counters are fine
        let same = RunMetrics {
            execution_count: Some(100),
            coverage: Some(40),
        };
        assert!(run.apply_transition(RunStatus::Stopped, same, 3_000).is_ok());

        let lower_count = RunMetrics {
            execution_count: Some(99),
            coverage: None,
        };
        assert!(matches!(
            run.apply_transition(RunStatus::Stopped, lower_count, 3_000),
            Err(AppError::InvalidMetric(_))
        ));

        let lower_coverage = RunMetrics {
            execution_count: None,
            coverage: Some(39),
        };
        assert!(matches!(
            run.apply_transition(RunStatus::Stopped, lower_coverage, 3_000),
            Err(AppError::InvalidMetric(_))
        ));
    }

    #[test]
    fn absent_metrics_leave_counters_untouched() {
        let run = run_with_status(RunStatus::Running);
        let updated = run
            .apply_transition(RunStatus::Stopped, RunMetrics::default(), 3_000)
            .unwrap();
        assert_eq!(updated.execution_count, 100);
        assert_eq!(updated.coverage, 40);
    }

    #[test]
    fn running_heartbeat_merges_metrics_without_taking_an_edge() {
        let run = run_with_status(RunStatus::Running);
        let heartbeat = RunMetrics {
            execution_count: Some(900),
            coverage: Some(55),
        };
        let updated = run
            .apply_report(RunStatus::Running, heartbeat, 700_000)
            .unwrap();
        assert_eq!(updated.status, RunStatus::Running);
        assert_eq!(updated.finished_at, None);
        assert_eq!(updated.execution_count, 900);
        assert_eq!(updated.coverage, 55);
        assert_eq!(updated.updated_at, 700_000);
    }

    #[test]
    fn heartbeat_keeps_a_long_run_from_going_stale() {
        let threshold = Duration::from_secs(600);
        let run = run_with_status(RunStatus::Running);
        // updated_at = 1_000: without a report the run would be swept
        assert!(run.is_stale_at(700_000, threshold));

        let heartbeat = RunMetrics {
            execution_count: Some(500),
            coverage: None,
        };
        let updated = run
            .apply_report(RunStatus::Running, heartbeat, 650_000)
            .unwrap();
        assert!(!updated.is_stale_at(700_000, threshold));
    }

    #[test]
    fn heartbeat_counters_remain_monotonic() {
        let run = run_with_status(RunStatus::Running);
        let lower = RunMetrics {
            execution_count: Some(99),
            coverage: None,
        };
        assert!(matches!(
            run.apply_report(RunStatus::Running, lower, 700_000),
            Err(AppError::InvalidMetric(_))
        ));
    }

    #[test]
    fn heartbeat_only_applies_to_running_runs() {
        for status in [RunStatus::Queued, RunStatus::Stopped, RunStatus::Failed] {
            let run = run_with_status(status);
            let result = run.apply_report(status, RunMetrics::default(), 700_000);
            assert!(matches!(result, Err(AppError::InvalidTransition(_))));
        }
    }

    #[test]
    fn reports_still_follow_the_transition_table() {
        let run = run_with_status(RunStatus::Running);
        let stopped = run
            .apply_report(RunStatus::Stopped, RunMetrics::default(), 700_000)
            .unwrap();
        assert_eq!(stopped.status, RunStatus::Stopped);
        assert_eq!(stopped.finished_at, Some(700_000));

        let back = run.apply_report(RunStatus::Queued, RunMetrics::default(), 700_000);
        assert!(matches!(back, Err(AppError::InvalidTransition(_))));
    }

    #[test]
    fn report_grace_window_boundary() {
        let grace = Duration::from_secs(120);
        let run = run_with_status(RunStatus::Stopped);
        // finished_at = 5_000
        assert!(run.accepts_reports_at(5_000 + 120_000, grace));
        assert!(!run.accepts_reports_at(5_000 + 120_001, grace));

        let live = run_with_status(RunStatus::Running);
        assert!(live.accepts_reports_at(u64::MAX, grace));
    }

    #[test]
    fn staleness_predicate() {
        let threshold = Duration::from_secs(600);
        let run = run_with_status(RunStatus::Running);
        // updated_at = 1_000
        assert!(!run.is_stale_at(1_000 + 600_000, threshold));
        assert!(run.is_stale_at(1_000 + 600_001, threshold));

        let done = run_with_status(RunStatus::Stopped);
        assert!(!done.is_stale_at(u64::MAX, threshold));
    }

    #[test]
    fn status_report_wire_shape() {
        let report: StatusReport = serde_json::from_str(
            r#"{"status":"running","executionCount":42,"coverage":7}"#,
        )
        .unwrap();
        assert_eq!(report.status, RunStatus::Running);
        assert_eq!(report.metrics().execution_count, Some(42));
        assert_eq!(report.metrics().coverage, Some(7));

        let bare: StatusReport = serde_json::from_str(r#"{"status":"stopped"}"#).unwrap();
        assert_eq!(bare.status, RunStatus::Stopped);
        assert_eq!(bare.metrics().execution_count, None);
    }

    #[test]
    fn unknown_status_is_rejected_at_the_boundary() {
        let result: Result<StatusReport, _> =
            serde_json::from_str(r#"{"status":"paused"}"#);
        assert!(result.is_err());
    }
}

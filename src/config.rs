use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, resolved once at startup and injected into the
/// app state. The runner URL is deliberately not a global: the dispatcher
/// receives it through its constructor.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub runner_url: String,
    /// Bound on the outbound job submission, not on the fuzzing duration.
    pub submit_timeout: Duration,
    /// How long after a run reaches a terminal state in-flight finding
    /// reports are still accepted.
    pub finding_grace: Duration,
    /// A non-terminal run with no report for this long is considered
    /// abandoned by the runner.
    pub stale_after: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: read_or("PORT", 3000),
            runner_url: env::var("RUNNER_API_URL")
                .unwrap_or_else(|_| "http://runner:8080".to_string()),
            submit_timeout: Duration::from_secs(read_or("RUNNER_SUBMIT_TIMEOUT_SECONDS", 10)),
            finding_grace: Duration::from_secs(read_or("FINDING_GRACE_SECONDS", 120)),
            stale_after: Duration::from_secs(read_or("RUN_STALE_SECONDS", 600)),
            sweep_interval: Duration::from_secs(read_or("SWEEP_INTERVAL_SECONDS", 60)),
        }
    }
}

fn read_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

use crate::Stage;
use metrics::{register_counter, register_histogram, Counter, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Counters for one pipeline run
///
/// Handles are registered against whichever recorder is installed when the
/// struct is built; without one they are no-ops.
pub struct PipelineMetrics {
    pub attempts: Counter,
    pub retries: Counter,
    pub successes: Counter,
    pub acquire_failures: Counter,
    pub crop_failures: Counter,
    pub distribute_failures: Counter,
    pub setup_failures: Counter,
    pub attempt_duration: Histogram,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            attempts: register_counter!("shotbot_attempts_total"),
            retries: register_counter!("shotbot_retries_total"),
            successes: register_counter!("shotbot_successes_total"),
            acquire_failures: register_counter!("shotbot_failures_total", "stage" => "acquire-shot"),
            crop_failures: register_counter!("shotbot_failures_total", "stage" => "crop"),
            distribute_failures: register_counter!("shotbot_failures_total", "stage" => "distribute"),
            setup_failures: register_counter!("shotbot_failures_total", "stage" => "setup"),
            attempt_duration: register_histogram!("shotbot_attempt_duration_seconds"),
        }
    }

    pub fn record_attempt(&self, duration: Duration, success: bool) {
        self.attempts.increment(1);
        if success {
            self.successes.increment(1);
        }
        self.attempt_duration.record(duration.as_secs_f64());
    }

    pub fn record_failure(&self, stage: Stage) {
        match stage {
            Stage::AcquireShot => self.acquire_failures.increment(1),
            Stage::Crop => self.crop_failures.increment(1),
            Stage::Distribute => self.distribute_failures.increment(1),
            Stage::Setup => self.setup_failures.increment(1),
        }
    }

    pub fn record_retry(&self) {
        self.retries.increment(1);
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a Prometheus recorder and return the handle used to render it.
pub fn install_prometheus_recorder(
) -> Result<PrometheusHandle, Box<dyn std::error::Error + Send + Sync>> {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    metrics::set_boxed_recorder(Box::new(recorder))?;
    Ok(handle)
}

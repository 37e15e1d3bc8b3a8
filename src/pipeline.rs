//! Pipeline orchestrator: runs acquire-shot → crop → distribute and restarts the
//! whole sequence when any stage fails
//!
//! Every attempt runs as its own spawned task and is awaited to completion before
//! the next one starts, so attempts never overlap. The retry budget is an explicit
//! [`RetryState`] value owned by [`Orchestrator::run`], not shared state.
//!
//! # Examples
//!
//! ```rust,no_run
//! use shotbot::{load_bot, build_http_client, Orchestrator, Pipeline, RunConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (config, behavior) = load_bot(Path::new("."), "demo").await?;
//!     let client = build_http_client(config.request_timeout())?;
//!     let request = config.job_request();
//!
//!     let pipeline = Pipeline::with_defaults(config, behavior, RunConfig::default(), client);
//!     Orchestrator::new(pipeline).run(request).await?;
//!     Ok(())
//! }
//! ```

use crate::{
    acquire_shot, format_duration, image_source_from_config, Behavior, BotConfig, Cropper,
    Distribution, Distributor, HttpSnapshotter, ImageSource, JobRequest, PipelineMetrics,
    RetryConfig, RunConfig, ShotbotError, Snapshotter, TargetPoster,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// How a successful run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Posted,
    DryRun,
}

/// Retry budget carried from one attempt to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempts_so_far: usize,
    limit: usize,
}

impl RetryState {
    pub fn new(limit: usize) -> Self {
        Self {
            attempts_so_far: 0,
            limit,
        }
    }

    pub fn attempts_so_far(&self) -> usize {
        self.attempts_so_far
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// State for the next retry, or `None` once the budget is spent.
    pub fn advance(self) -> Option<Self> {
        (self.attempts_so_far < self.limit).then(|| Self {
            attempts_so_far: self.attempts_so_far + 1,
            ..self
        })
    }
}

/// The three stages and the collaborators they call
pub struct Pipeline {
    source: Arc<dyn ImageSource>,
    snapshotter: Arc<dyn Snapshotter>,
    options_template: Map<String, Value>,
    cropper: Cropper,
    distribution: Distribution,
    distributor: Arc<dyn Distributor>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ImageSource>,
        snapshotter: Arc<dyn Snapshotter>,
        distributor: Arc<dyn Distributor>,
        config: BotConfig,
        behavior: Behavior,
        run: RunConfig,
    ) -> Self {
        Self {
            source,
            snapshotter,
            options_template: behavior.webimage_opts.clone(),
            cropper: Cropper::new(behavior.should_auto_crop)
                .with_options(behavior.auto_crop_options.clone()),
            distribution: Distribution::new(run, config, behavior),
            distributor,
        }
    }

    /// Wire the HTTP snapshotter, the configured image source and [`TargetPoster`].
    pub fn with_defaults(
        config: BotConfig,
        behavior: Behavior,
        run: RunConfig,
        client: reqwest::Client,
    ) -> Self {
        let source = image_source_from_config(&behavior.image_source, client.clone());
        let snapshotter = Arc::new(HttpSnapshotter::new(client.clone()));
        let distributor = Arc::new(TargetPoster::new(client));
        Self::new(source, snapshotter, distributor, config, behavior, run)
    }

    pub fn is_dry_run(&self) -> bool {
        self.distribution.is_dry_run()
    }

    /// One pass through all three stages.
    pub async fn run_attempt(&self, request: &JobRequest) -> Result<(), ShotbotError> {
        let artifact = acquire_shot(
            self.source.as_ref(),
            self.snapshotter.as_ref(),
            &self.options_template,
            request,
        )
        .await?;

        let artifact = self.cropper.crop(artifact).await?;
        debug!("Artifact ready for distribution: {:?}", artifact);

        self.distribution
            .distribute(artifact, self.distributor.as_ref())
            .await
    }
}

pub struct Orchestrator {
    pipeline: Arc<Pipeline>,
    retry: RetryConfig,
    metrics: PipelineMetrics,
}

impl Orchestrator {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            retry: RetryConfig::default(),
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run the pipeline until it succeeds or the retry budget is exhausted.
    ///
    /// `request` is reused unchanged for every attempt. There is no delay
    /// between attempts.
    pub async fn run(&self, request: JobRequest) -> Result<RunOutcome, ShotbotError> {
        let mut state = RetryState::new(self.retry.max_retries);

        loop {
            match self.spawn_attempt(&request).await {
                Ok(()) if self.pipeline.is_dry_run() => return Ok(RunOutcome::DryRun),
                Ok(()) => {
                    info!("Posted to targets!");
                    return Ok(RunOutcome::Posted);
                }
                Err(e) => {
                    self.metrics.record_failure(e.stage());
                    match state.advance() {
                        Some(next) => {
                            state = next;
                            self.metrics.record_retry();
                            warn!(
                                "Retrying. Number of retries so far: {}",
                                state.attempts_so_far()
                            );
                        }
                        None => {
                            error!("Reached retry limit. Giving up.");
                            return Err(ShotbotError::RetriesExhausted {
                                attempts: state.attempts_so_far() + 1,
                            });
                        }
                    }
                }
            }
        }
    }

    async fn spawn_attempt(&self, request: &JobRequest) -> Result<(), ShotbotError> {
        let pipeline = Arc::clone(&self.pipeline);
        let request = request.clone();
        let started = Instant::now();

        let result = match tokio::spawn(async move { pipeline.run_attempt(&request).await }).await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(stage = %e.stage(), "Error while trying to get shot: {}", e);
                Err(e)
            }
            Err(join_error) => {
                let e = ShotbotError::from(join_error);
                error!("Error while trying to get shot: {}", e);
                Err(e)
            }
        };

        let elapsed = started.elapsed();
        debug!("Attempt finished in {}", format_duration(elapsed));
        self.metrics.record_attempt(elapsed, result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_state_counts_up_to_limit() {
        let mut state = RetryState::new(5);
        let mut retries = 0;
        while let Some(next) = state.advance() {
            assert_eq!(next.attempts_so_far(), state.attempts_so_far() + 1);
            state = next;
            retries += 1;
        }
        assert_eq!(retries, 5);
        assert_eq!(state.attempts_so_far(), state.limit());
    }

    #[test]
    fn test_retry_state_zero_limit_never_retries() {
        assert_eq!(RetryState::new(0).advance(), None);
    }
}

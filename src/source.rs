//! Image sources: where the URL to shoot and its posting metadata come from

use crate::{ImageSourceConfig, ShotbotError};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A page to capture and the text to publish alongside it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImageJob {
    pub url: String,
    pub alt_text: String,
    pub caption: String,
    /// Per-target replacements for `caption`, keyed by target name
    #[serde(default)]
    pub target_texts: HashMap<String, String>,
}

/// Produces a fresh [`ImageJob`] for every pipeline attempt.
///
/// Implementations need not be deterministic: a retried attempt may shoot a
/// different page than the one that failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn generate_image_job(&self) -> Result<ImageJob, ShotbotError>;
}

/// Picks one job at random from a fixed list.
pub struct JobListSource {
    jobs: Vec<ImageJob>,
}

impl JobListSource {
    pub fn new(jobs: Vec<ImageJob>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl ImageSource for JobListSource {
    async fn generate_image_job(&self) -> Result<ImageJob, ShotbotError> {
        let job = self
            .jobs
            .choose(&mut rand::rng())
            .cloned()
            .ok_or_else(|| ShotbotError::ImageSourceFailed("job list is empty".to_string()))?;
        debug!("Picked job for {}", job.url);
        Ok(job)
    }
}

/// Fetches a job description as JSON from an HTTP endpoint.
pub struct EndpointSource {
    client: reqwest::Client,
    url: String,
}

impl EndpointSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ImageSource for EndpointSource {
    async fn generate_image_job(&self) -> Result<ImageJob, ShotbotError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ShotbotError::ImageSourceFailed(e.to_string()))?;

        let job: ImageJob = response
            .json()
            .await
            .map_err(|e| ShotbotError::ImageSourceFailed(e.to_string()))?;
        debug!("Endpoint {} returned job for {}", self.url, job.url);
        Ok(job)
    }
}

pub fn image_source_from_config(
    config: &ImageSourceConfig,
    client: reqwest::Client,
) -> Arc<dyn ImageSource> {
    match config {
        ImageSourceConfig::Jobs { jobs } => Arc::new(JobListSource::new(jobs.clone())),
        ImageSourceConfig::Endpoint { url } => Arc::new(EndpointSource::new(client, url.clone())),
    }
}

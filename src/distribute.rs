//! Distribute stage: publish the capture, or write it to scratch in dry-run mode

use crate::{
    filesystem_timestamp, format_bytes, random_id, sanitize_filename, Behavior, BotConfig,
    ImageArtifact, RunConfig, ShotbotError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Target whose configuration comes from the behavior instead of the bot config.
pub const ARCHIVE_TARGET: &str = "archive";

/// Length of the random part of a post id.
pub const POST_ID_RANDOM_LEN: usize = 8;

/// Static configuration for one posting target, plus an optional caption override
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetConfig {
    #[serde(rename = "type")]
    pub target_type: String,
    pub config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl TargetConfig {
    /// Text to publish on this target: the override if present, else `fallback`.
    pub fn text_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.text.as_deref().unwrap_or(fallback)
    }
}

/// Everything a [`Distributor`] needs to publish one capture
#[derive(Clone)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub alt_text: String,
    pub media_filename: String,
    pub buffer: Vec<u8>,
    pub targets: Vec<TargetConfig>,
}

impl fmt::Debug for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Post")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("alt_text", &self.alt_text)
            .field("media_filename", &self.media_filename)
            .field("buffer", &format_bytes(self.buffer.len()))
            .field("targets", &self.targets)
            .finish()
    }
}

/// Publishes a [`Post`] to all of its targets as one batch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Distributor: Send + Sync {
    async fn post(&self, post: Post) -> Result<(), ShotbotError>;
}

/// Merge a target's static configuration with the job's text override.
pub fn target_config(
    target: &str,
    target_texts: &HashMap<String, String>,
    config: &BotConfig,
    behavior: &Behavior,
) -> TargetConfig {
    let static_config = if target == ARCHIVE_TARGET {
        behavior.archive.to_value()
    } else {
        config.targets.get(target).cloned().unwrap_or(Value::Null)
    };

    TargetConfig {
        target_type: target.to_string(),
        config: static_config,
        text: target_texts.get(target).cloned(),
    }
}

pub fn build_targets(
    target_texts: &HashMap<String, String>,
    config: &BotConfig,
    behavior: &Behavior,
) -> Vec<TargetConfig> {
    behavior
        .posting_targets
        .iter()
        .map(|target| target_config(target, target_texts, config, behavior))
        .collect()
}

pub fn post_id(prefix: &str) -> String {
    format!("{}-{}", prefix, random_id(POST_ID_RANDOM_LEN))
}

/// `<scratch_dir>/<alt text>-<timestamp>.png`
pub fn dry_run_path(scratch_dir: &Path, alt_text: &str, at: DateTime<Utc>) -> PathBuf {
    scratch_dir.join(format!(
        "{}-{}.png",
        sanitize_filename(alt_text),
        filesystem_timestamp(at)
    ))
}

/// Stage 3 of the pipeline.
#[derive(Clone)]
pub struct Distribution {
    run: RunConfig,
    config: BotConfig,
    behavior: Behavior,
}

impl Distribution {
    pub fn new(run: RunConfig, config: BotConfig, behavior: Behavior) -> Self {
        Self {
            run,
            config,
            behavior,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.run.dry_run
    }

    pub async fn distribute(
        &self,
        artifact: ImageArtifact,
        distributor: &dyn Distributor,
    ) -> Result<(), ShotbotError> {
        if self.run.dry_run {
            self.write_scratch(&artifact).await?;
            return Ok(());
        }

        let id = post_id(&self.behavior.archive.id_prefix);
        let targets = build_targets(&artifact.target_texts, &self.config, &self.behavior);
        info!(
            "Posting {} to {} target(s): {:?}",
            id,
            targets.len(),
            self.behavior.posting_targets
        );

        distributor
            .post(Post {
                media_filename: format!("{id}.png"),
                id,
                text: artifact.caption,
                alt_text: artifact.alt_text,
                buffer: artifact.buffer,
                targets,
            })
            .await
    }

    async fn write_scratch(&self, artifact: &ImageArtifact) -> Result<PathBuf, ShotbotError> {
        let path = dry_run_path(&self.run.scratch_dir, &artifact.alt_text, Utc::now());
        info!("Writing out {}", path.display());

        tokio::fs::create_dir_all(&self.run.scratch_dir).await?;
        tokio::fs::write(&path, &artifact.buffer).await?;
        Ok(path)
    }
}

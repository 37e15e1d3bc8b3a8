//! Configuration management with serde serialization/deserialization
//!
//! A bot is described by two JSON files that live side by side under a base
//! directory:
//!
//! - `configs/<bot>-config.json`: credentials and static per-target settings
//!   ([`BotConfig`])
//! - `behaviors/<bot>-behavior.json`: what to shoot and how to publish it
//!   ([`Behavior`])
//!
//! The run-time choices made on the command line end up in [`RunConfig`], which is
//! built once at startup and handed to every stage that needs it.

use crate::{validate_url, AutoCropOptions, ImageJob, ShotbotError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Number of times a failed pipeline is restarted before giving up.
pub const RETRY_LIMIT: usize = 5;

/// Static configuration for one bot
///
/// # Examples
///
/// ```rust
/// use shotbot::BotConfig;
///
/// let config: BotConfig = serde_json::from_str(r#"{
///     "snapshot_service": { "url": "https://snap.example/shot", "key": "k1" },
///     "targets": { "mastodon": { "endpoint": "https://social.example/api/post" } }
/// }"#).unwrap();
/// assert_eq!(config.snapshot_service.key, "k1");
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    /// Remote screenshot service the bot authenticates against
    pub snapshot_service: SnapshotServiceConfig,

    /// Static configuration for each posting target, keyed by target name
    ///
    /// The `archive` target is configured in the behavior file instead.
    #[serde(default)]
    pub targets: Map<String, Value>,

    /// Timeout applied by the HTTP client to every outbound request (default: none)
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl BotConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn job_request(&self) -> JobRequest {
        JobRequest {
            snapshot_service_url: self.snapshot_service.url.clone(),
            snapshot_service_key: self.snapshot_service.key.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotServiceConfig {
    pub url: String,
    pub key: String,
}

/// Per-bot behavior: snapshot options, cropping policy and posting targets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Behavior {
    /// Request body template sent to the snapshot service
    ///
    /// The `url` field is filled in per attempt; the template itself is never
    /// modified.
    #[serde(default)]
    pub webimage_opts: Map<String, Value>,

    /// Whether to strip uniform borders from the captured image (default: false)
    #[serde(default)]
    pub should_auto_crop: bool,

    /// Border detection tuning, used only when `should_auto_crop` is set
    #[serde(default)]
    pub auto_crop_options: AutoCropOptions,

    /// Settings for the `archive` posting target
    pub archive: ArchiveConfig,

    /// Targets to publish to, in order
    #[serde(default)]
    pub posting_targets: Vec<String>,

    /// Where image jobs come from
    pub image_source: ImageSourceConfig,
}

/// Archive target settings
///
/// `id_prefix` names every post; any other keys are passed through to the
/// archive target untouched.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    pub id_prefix: String,

    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ArchiveConfig {
    pub fn to_value(&self) -> Value {
        let mut object = self.settings.clone();
        object.insert("id_prefix".to_string(), Value::String(self.id_prefix.clone()));
        Value::Object(object)
    }
}

/// Supported image sources
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSourceConfig {
    /// Pick one of a fixed list of jobs at random
    Jobs { jobs: Vec<ImageJob> },
    /// Fetch a job description from an HTTP endpoint
    Endpoint { url: String },
}

/// Parameters of a pipeline run, fixed for every attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub snapshot_service_url: String,
    pub snapshot_service_key: String,
}

/// Choices made once at process start
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub dry_run: bool,
    pub scratch_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            scratch_dir: PathBuf::from("scratch"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: RETRY_LIMIT,
        }
    }
}

pub fn config_path(base_dir: &Path, bot: &str) -> PathBuf {
    base_dir.join("configs").join(format!("{bot}-config.json"))
}

pub fn behavior_path(base_dir: &Path, bot: &str) -> PathBuf {
    base_dir.join("behaviors").join(format!("{bot}-behavior.json"))
}

/// Load and validate the config/behavior pair for `bot`.
pub async fn load_bot(base_dir: &Path, bot: &str) -> Result<(BotConfig, Behavior), ShotbotError> {
    let config: BotConfig = read_json(&config_path(base_dir, bot)).await?;
    let behavior: Behavior = read_json(&behavior_path(base_dir, bot)).await?;

    validate_config(&config, &behavior)?;

    info!("Configuration loaded for bot '{}'", bot);
    debug!("Posting targets: {:?}", behavior.posting_targets);
    debug!("Auto-crop: {}", behavior.should_auto_crop);

    Ok((config, behavior))
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ShotbotError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        ShotbotError::ConfigurationError(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ShotbotError::ConfigurationError(format!("cannot parse {}: {}", path.display(), e))
    })
}

pub fn validate_config(config: &BotConfig, behavior: &Behavior) -> Result<(), ShotbotError> {
    validate_url(&config.snapshot_service.url).map_err(|e| {
        ShotbotError::ConfigurationError(format!(
            "invalid snapshot service url '{}': {}",
            config.snapshot_service.url, e
        ))
    })?;

    if config.snapshot_service.key.is_empty() {
        return Err(ShotbotError::ConfigurationError(
            "snapshot service key must not be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == Some(0) {
        return Err(ShotbotError::ConfigurationError(
            "request timeout must be greater than 0".to_string(),
        ));
    }

    if behavior.archive.id_prefix.is_empty() {
        return Err(ShotbotError::ConfigurationError(
            "archive id_prefix must not be empty".to_string(),
        ));
    }

    match &behavior.image_source {
        ImageSourceConfig::Jobs { jobs } if jobs.is_empty() => Err(
            ShotbotError::ConfigurationError("image source has no jobs".to_string()),
        ),
        ImageSourceConfig::Endpoint { url } => validate_url(url).map(|_| ()).map_err(|e| {
            ShotbotError::ConfigurationError(format!("invalid image source url '{url}': {e}"))
        }),
        _ => Ok(()),
    }
}

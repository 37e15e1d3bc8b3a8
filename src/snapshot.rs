//! Snapshot service client and the acquire-shot stage
//!
//! The snapshot service is a remote HTTP endpoint that renders a page and answers
//! with raw image bytes. Each attempt builds its own request body from the
//! behavior's options template, so nothing leaks from one attempt into the next.

use crate::{format_bytes, ImageJob, ImageSource, JobRequest, ShotbotError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Captured image plus the text that travels with it
///
/// Only `buffer` may change between stages; the metadata is carried through
/// as produced by the image source.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub buffer: Vec<u8>,
    pub alt_text: String,
    pub caption: String,
    pub target_texts: HashMap<String, String>,
}

impl ImageArtifact {
    pub fn from_job(job: ImageJob, buffer: Vec<u8>) -> Self {
        Self {
            buffer,
            alt_text: job.alt_text,
            caption: job.caption,
            target_texts: job.target_texts,
        }
    }
}

impl fmt::Debug for ImageArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageArtifact")
            .field("buffer", &format_bytes(self.buffer.len()))
            .field("alt_text", &self.alt_text)
            .field("caption", &self.caption)
            .field("target_texts", &self.target_texts)
            .finish()
    }
}

/// Request body for one snapshot call
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotOptions(Map<String, Value>);

impl SnapshotOptions {
    /// Copy `template` and point it at `url`.
    pub fn for_url(template: &Map<String, Value>, url: &str) -> Self {
        let mut body = template.clone();
        body.insert("url".to_string(), Value::String(url.to_string()));
        Self(body)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Snapshotter: Send + Sync {
    async fn capture(
        &self,
        request: &JobRequest,
        options: &SnapshotOptions,
    ) -> Result<Vec<u8>, ShotbotError>;
}

/// `reqwest`-backed snapshot client
#[derive(Clone)]
pub struct HttpSnapshotter {
    client: reqwest::Client,
}

impl HttpSnapshotter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Snapshotter for HttpSnapshotter {
    async fn capture(
        &self,
        request: &JobRequest,
        options: &SnapshotOptions,
    ) -> Result<Vec<u8>, ShotbotError> {
        debug!("Requesting snapshot from {}", request.snapshot_service_url);

        let response = self
            .client
            .post(&request.snapshot_service_url)
            .bearer_auth(&request.snapshot_service_key)
            .json(options.as_map())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShotbotError::SnapshotStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Build the HTTP client shared by the snapshotter and the posting targets.
pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, ShotbotError> {
    let mut builder =
        reqwest::Client::builder().user_agent(concat!("shotbot/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| ShotbotError::ConfigurationError(e.to_string()))
}

/// Stage 1: ask the image source for a job, then shoot it.
pub async fn acquire_shot(
    source: &dyn ImageSource,
    snapshotter: &dyn Snapshotter,
    options_template: &Map<String, Value>,
    request: &JobRequest,
) -> Result<ImageArtifact, ShotbotError> {
    let job = source.generate_image_job().await?;
    let options = SnapshotOptions::for_url(options_template, &job.url);

    let buffer = snapshotter.capture(request, &options).await?;
    info!("Captured {} ({})", job.url, format_bytes(buffer.len()));

    Ok(ImageArtifact::from_job(job, buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockImageSource;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn template() -> Map<String, Value> {
        match json!({ "url": "https://stale", "width": 800, "full_page": false }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_options_override_url_without_touching_template() {
        let template = template();
        let options = SnapshotOptions::for_url(&template, "https://site");

        assert_eq!(options.as_map()["url"], "https://site");
        assert_eq!(options.as_map()["width"], 800);
        assert_eq!(template["url"], "https://stale");
    }

    #[tokio::test]
    async fn test_http_snapshotter_posts_options_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/shot"))
            .and(header("authorization", "Bearer k1"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "url": "https://site", "width": 800, "full_page": false })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 50]))
            .expect(1)
            .mount(&server)
            .await;

        let request = JobRequest {
            snapshot_service_url: format!("{}/shot", server.uri()),
            snapshot_service_key: "k1".to_string(),
        };
        let options = SnapshotOptions::for_url(&template(), "https://site");
        let bytes = HttpSnapshotter::new(reqwest::Client::new())
            .capture(&request, &options)
            .await
            .unwrap();

        assert_eq!(bytes, vec![7u8; 50]);
    }

    #[tokio::test]
    async fn test_http_snapshotter_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let request = JobRequest {
            snapshot_service_url: server.uri(),
            snapshot_service_key: "wrong".to_string(),
        };
        let err = HttpSnapshotter::new(reqwest::Client::new())
            .capture(&request, &SnapshotOptions::for_url(&Map::new(), "https://site"))
            .await
            .unwrap_err();

        match err {
            ShotbotError::SnapshotStatus { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad key");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_acquire_shot_source_failure_skips_snapshot() {
        let mut source = MockImageSource::new();
        source
            .expect_generate_image_job()
            .times(1)
            .returning(|| Err(ShotbotError::ImageSourceFailed("no ideas".to_string())));
        let mut snapshotter = MockSnapshotter::new();
        snapshotter.expect_capture().times(0);

        let request = JobRequest {
            snapshot_service_url: "https://snap.example/shot".to_string(),
            snapshot_service_key: "k1".to_string(),
        };
        let result = acquire_shot(&source, &snapshotter, &template(), &request).await;
        assert!(matches!(result, Err(ShotbotError::ImageSourceFailed(_))));
    }

    #[tokio::test]
    async fn test_acquire_shot_carries_job_metadata() {
        let mut source = MockImageSource::new();
        source.expect_generate_image_job().returning(|| {
            Ok(ImageJob {
                url: "https://site".to_string(),
                alt_text: "cat".to_string(),
                caption: "hi".to_string(),
                target_texts: HashMap::from([("mastodon".to_string(), "toot".to_string())]),
            })
        });
        let mut snapshotter = MockSnapshotter::new();
        snapshotter
            .expect_capture()
            .withf(|_, options| options.as_map()["url"] == "https://site")
            .returning(|_, _| Ok(vec![1, 2, 3]));

        let request = JobRequest {
            snapshot_service_url: "https://snap.example/shot".to_string(),
            snapshot_service_key: "k1".to_string(),
        };
        let artifact = acquire_shot(&source, &snapshotter, &template(), &request)
            .await
            .unwrap();

        assert_eq!(artifact.buffer, vec![1, 2, 3]);
        assert_eq!(artifact.alt_text, "cat");
        assert_eq!(artifact.target_texts["mastodon"], "toot");
    }
}

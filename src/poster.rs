//! Default [`Distributor`]: posts to each target in order, stopping at the first failure
//!
//! Two kinds of target are understood:
//!
//! - `archive` writes the image and a JSON record into `root_path`
//! - anything else is treated as an HTTP endpoint accepting a multipart upload
//!   (`endpoint`, optional `access_token`)

use crate::{Distributor, Post, ShotbotError, TargetConfig, ARCHIVE_TARGET};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ArchiveEntry<'a> {
    id: &'a str,
    caption: &'a str,
    alt_text: &'a str,
    media_filename: &'a str,
    date: String,
}

pub struct TargetPoster {
    client: reqwest::Client,
}

impl TargetPoster {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post_to_target(&self, post: &Post, target: &TargetConfig) -> Result<(), ShotbotError> {
        if target.target_type == ARCHIVE_TARGET {
            self.archive(post, target).await
        } else {
            self.upload(post, target).await
        }
    }

    async fn archive(&self, post: &Post, target: &TargetConfig) -> Result<(), ShotbotError> {
        let root = target
            .config
            .get("root_path")
            .and_then(|v| v.as_str())
            .map(PathBuf::from)
            .ok_or_else(|| ShotbotError::distribution(ARCHIVE_TARGET, "missing root_path"))?;

        let entry = ArchiveEntry {
            id: &post.id,
            caption: target.text_or(&post.text),
            alt_text: &post.alt_text,
            media_filename: &post.media_filename,
            date: Utc::now().to_rfc3339(),
        };
        let record = serde_json::to_vec_pretty(&entry)
            .map_err(|e| ShotbotError::distribution(ARCHIVE_TARGET, e))?;

        let write = async {
            tokio::fs::create_dir_all(&root).await?;
            tokio::fs::write(root.join(&post.media_filename), &post.buffer).await?;
            tokio::fs::write(root.join(format!("{}.json", post.id)), record).await
        };
        write
            .await
            .map_err(|e| ShotbotError::distribution(ARCHIVE_TARGET, e))?;

        debug!("Archived {} under {}", post.id, root.display());
        Ok(())
    }

    async fn upload(&self, post: &Post, target: &TargetConfig) -> Result<(), ShotbotError> {
        let name = target.target_type.as_str();
        let endpoint = target
            .config
            .get("endpoint")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ShotbotError::distribution(name, "missing endpoint"))?;

        let media = Part::bytes(post.buffer.clone())
            .file_name(post.media_filename.clone())
            .mime_str("image/png")
            .map_err(|e| ShotbotError::distribution(name, e))?;
        let form = Form::new()
            .text("id", post.id.clone())
            .text("text", target.text_or(&post.text).to_string())
            .text("alt_text", post.alt_text.clone())
            .part("media", media);

        let mut request = self.client.post(endpoint).multipart(form);
        if let Some(token) = target.config.get("access_token").and_then(|v| v.as_str()) {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ShotbotError::distribution(name, e))?;

        debug!("Uploaded {} to {}", post.id, name);
        Ok(())
    }
}

#[async_trait]
impl Distributor for TargetPoster {
    async fn post(&self, post: Post) -> Result<(), ShotbotError> {
        for target in &post.targets {
            self.post_to_target(&post, target).await?;
            info!("Posted {} to {}", post.id, target.target_type);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post(targets: Vec<TargetConfig>) -> Post {
        Post {
            id: "shot-abcd1234".to_string(),
            text: "hi".to_string(),
            alt_text: "cat".to_string(),
            media_filename: "shot-abcd1234.png".to_string(),
            buffer: vec![1u8; 50],
            targets,
        }
    }

    fn target(name: &str, config: Value, text: Option<&str>) -> TargetConfig {
        TargetConfig {
            target_type: name.to_string(),
            config,
            text: text.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_archive_writes_image_and_record() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("archive");
        let poster = TargetPoster::new(reqwest::Client::new());

        poster
            .post(post(vec![target(
                "archive",
                json!({ "id_prefix": "shot", "root_path": root }),
                Some("archived caption"),
            )]))
            .await
            .unwrap();

        assert_eq!(std::fs::read(root.join("shot-abcd1234.png")).unwrap(), vec![1u8; 50]);
        let record: Value =
            serde_json::from_slice(&std::fs::read(root.join("shot-abcd1234.json")).unwrap())
                .unwrap();
        assert_eq!(record["caption"], "archived caption");
        assert_eq!(record["alt_text"], "cat");
    }

    #[tokio::test]
    async fn test_archive_failure_is_reported_against_distribute_stage() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();
        let poster = TargetPoster::new(reqwest::Client::new());

        let err = poster
            .post(post(vec![target(
                "archive",
                json!({ "id_prefix": "shot", "root_path": blocker }),
                None,
            )]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShotbotError::DistributionFailed { ref target, .. } if target == "archive"
        ));
        assert_eq!(err.stage(), crate::Stage::Distribute);
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/post"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let poster = TargetPoster::new(reqwest::Client::new());
        poster
            .post(post(vec![target(
                "mastodon",
                json!({ "endpoint": format!("{}/post", server.uri()), "access_token": "t0ken" }),
                None,
            )]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stops_at_first_failing_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let poster = TargetPoster::new(reqwest::Client::new());
        let err = poster
            .post(post(vec![
                target("bluesky", Value::Null, None),
                target("mastodon", json!({ "endpoint": server.uri() }), None),
            ]))
            .await
            .unwrap_err();

        match err {
            ShotbotError::DistributionFailed { target, reason } => {
                assert_eq!(target, "bluesky");
                assert_eq!(reason, "missing endpoint");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}

//! YouTube Data API uploader.

use crate::http::{classify_transport, decode_json, ensure_success};
use async_trait::async_trait;
use reelwright_core::{IdempotencyToken, UploadId, UploadMetadata, VideoHandle};
use reelwright_error::StageError;
use reelwright_stages::Uploader;
use reqwest::Client;
use reqwest::header::LOCATION;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
const YOUTUBE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos";

/// Supplies OAuth access tokens for the platform.
///
/// Obtaining and refreshing credentials happens outside the pipeline; a
/// provider that cannot produce a token reports a terminal error.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync + Debug {
    /// A currently valid bearer token.
    async fn access_token(&self) -> Result<String, StageError>;
}

/// Fixed token.
#[derive(Clone)]
pub struct StaticTokenProvider(String);

impl StaticTokenProvider {
    /// Wrap a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticTokenProvider(..)")
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, StageError> {
        Ok(self.0.clone())
    }
}

/// Token read from an environment variable at call time, so an external
/// refresher can rotate it.
#[derive(Debug, Clone)]
pub struct EnvTokenProvider {
    var: String,
}

impl EnvTokenProvider {
    /// Read the token from `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl AccessTokenProvider for EnvTokenProvider {
    async fn access_token(&self) -> Result<String, StageError> {
        std::env::var(&self.var)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| StageError::terminal(format!("{} is not set", self.var)))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: Vec<&'a str>,
    category_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status<'a> {
    privacy_status: &'a str,
    made_for_kids: bool,
    self_declared_made_for_kids: bool,
}

#[derive(Debug, Serialize)]
struct InsertBody<'a> {
    snippet: Snippet<'a>,
    status: Status<'a>,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Option<VideoSnippet>,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

/// Tags sent with an upload: the metadata tags plus the idempotency token.
///
/// # Examples
///
/// ```
/// use reelwright_core::{IdempotencyToken, RecordId, UploadMetadataBuilder};
/// use reelwright_providers::upload_tags;
///
/// let token = IdempotencyToken::for_record(&RecordId::new());
/// let metadata = UploadMetadataBuilder::default()
///     .title("t")
///     .description("d")
///     .tags(vec!["islam".to_string()])
///     .build()
///     .unwrap();
/// let tags = upload_tags(&metadata, &token);
/// assert_eq!(tags.last().copied(), Some(token.as_str()));
/// ```
pub fn upload_tags<'a>(metadata: &'a UploadMetadata, token: &'a IdempotencyToken) -> Vec<&'a str> {
    let mut tags: Vec<&str> = metadata
        .tags()
        .iter()
        .map(String::as_str)
        .filter(|t| *t != token.as_str())
        .collect();
    tags.push(token.as_str());
    tags
}

/// Resumable uploads to the authorized channel.
#[derive(Debug, Clone)]
pub struct YouTubeUploader {
    client: Client,
    name: String,
    tokens: Arc<dyn AccessTokenProvider>,
    api_url: String,
    upload_url: String,
    lookback: u32,
}

impl YouTubeUploader {
    /// Creates a new uploader.
    pub fn new(name: impl Into<String>, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            tokens,
            api_url: YOUTUBE_API_URL.to_string(),
            upload_url: YOUTUBE_UPLOAD_URL.to_string(),
            lookback: 50,
        }
    }

    /// Point at compatible endpoints.
    pub fn with_base_urls(mut self, api_url: impl Into<String>, upload_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self.upload_url = upload_url.into();
        self
    }

    async fn recent_video_ids(&self, token: &str) -> Result<Vec<String>, StageError> {
        let max_results = self.lookback.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.api_url))
            .bearer_auth(token)
            .query(&[
                ("part", "id"),
                ("forMine", "true"),
                ("type", "video"),
                ("order", "date"),
                ("maxResults", max_results.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let body: SearchResponse = decode_json(&self.name, response).await?;
        Ok(body.items.into_iter().filter_map(|i| i.id.video_id).collect())
    }
}

#[async_trait]
impl Uploader for YouTubeUploader {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, video, metadata), fields(provider = %self.name, token = %token))]
    async fn upload(
        &self,
        video: &VideoHandle,
        metadata: &UploadMetadata,
        token: &IdempotencyToken,
    ) -> Result<UploadId, StageError> {
        let access = self.tokens.access_token().await?;
        let bytes = tokio::fs::read(video.path())
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", video.path().display(), e)))?;

        let body = InsertBody {
            snippet: Snippet {
                title: metadata.title(),
                description: metadata.description(),
                tags: upload_tags(metadata, token),
                category_id: metadata.category_id(),
            },
            status: Status {
                privacy_status: metadata.privacy_status(),
                made_for_kids: *metadata.made_for_kids(),
                self_declared_made_for_kids: *metadata.made_for_kids(),
            },
        };

        // Open the resumable session.
        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(&access)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", bytes.len().to_string())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let response = ensure_success(&self.name, response).await?;
        let session = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| StageError::transient(format!("{} did not return an upload session", self.name)))?;
        debug!(bytes = bytes.len(), "Upload session opened");

        let response = self
            .client
            .put(&session)
            .bearer_auth(&access)
            .header("Content-Type", "video/mp4")
            .body(bytes)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let inserted: InsertResponse = decode_json(&self.name, response).await?;

        info!(video_id = %inserted.id, "Upload complete");
        Ok(UploadId::new(inserted.id))
    }

    #[instrument(skip(self), fields(provider = %self.name))]
    async fn find_by_token(&self, token: &IdempotencyToken) -> Result<Option<UploadId>, StageError> {
        let access = self.tokens.access_token().await?;
        let ids = self.recent_video_ids(&access).await?;
        if ids.is_empty() {
            return Ok(None);
        }

        let joined = ids.join(",");
        let response = self
            .client
            .get(format!("{}/videos", self.api_url))
            .bearer_auth(&access)
            .query(&[("part", "snippet"), ("id", joined.as_str())])
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let body: VideosResponse = decode_json(&self.name, response).await?;

        let found = body.items.into_iter().find(|item| {
            item.snippet
                .as_ref()
                .is_some_and(|s| s.tags.iter().any(|t| t == token.as_str()))
        });
        debug!(found = found.is_some(), scanned = ids.len(), "Token lookup finished");
        Ok(found.map(|item| UploadId::new(item.id)))
    }
}

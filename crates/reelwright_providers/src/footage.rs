//! Stock footage sources.

use crate::http::{classify_transport, decode_json, ensure_success};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use reelwright_core::MediaHandle;
use reelwright_error::StageError;
use reelwright_stages::{FootageSource, SafetyMode};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

const PEXELS_API_URL: &str = "https://api.pexels.com/videos";

/// Hosts Pexels serves video files from.
pub const ALLOWED_DOWNLOAD_HOSTS: &[&str] = &[
    "player.vimeo.com",
    "vod-progressive.akamaized.net",
    "videos.pexels.com",
];

/// Whether a download link points at a trusted video host.
///
/// # Examples
///
/// ```
/// use reelwright_providers::is_allowed_download;
///
/// assert!(is_allowed_download("https://videos.pexels.com/video-files/1/a.mp4"));
/// assert!(!is_allowed_download("https://example.com/a.mp4"));
/// assert!(!is_allowed_download("not a url"));
/// ```
pub fn is_allowed_download(link: &str) -> bool {
    Url::parse(link)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .is_some_and(|host| {
            ALLOWED_DOWNLOAD_HOSTS
                .iter()
                .any(|allowed| host == *allowed || host.ends_with(&format!(".{}", allowed)))
        })
}

#[derive(Debug, Clone, Deserialize)]
struct PexelsVideoFile {
    #[serde(default)]
    link: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct PexelsVideo {
    id: u64,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    video_files: Vec<PexelsVideoFile>,
}

#[derive(Debug, Deserialize)]
struct PexelsSearchResponse {
    #[serde(default)]
    videos: Vec<PexelsVideo>,
}

/// Tallest portrait file, or the tallest file of any shape when none is portrait.
fn best_file(video: &PexelsVideo) -> Option<&PexelsVideoFile> {
    let portrait = |f: &&PexelsVideoFile| f.width.unwrap_or(0) < f.height.unwrap_or(0);
    let by_height = |f: &&PexelsVideoFile| f.height.unwrap_or(0);
    video
        .video_files
        .iter()
        .filter(portrait)
        .max_by_key(by_height)
        .or_else(|| video.video_files.iter().max_by_key(by_height))
}

/// Pexels video search with local download.
#[derive(Debug, Clone)]
pub struct PexelsFootageSource {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    download_dir: PathBuf,
    per_page: u32,
}

impl PexelsFootageSource {
    /// Creates a new source downloading into `download_dir`.
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            api_key: api_key.into(),
            base_url: PEXELS_API_URL.to_string(),
            download_dir: download_dir.into(),
            per_page: 15,
        }
    }

    /// Point at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, query: &str) -> Result<Vec<PexelsVideo>, StageError> {
        let per_page = self.per_page.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .header("Authorization", &self.api_key)
            .query(&[
                ("query", query),
                ("orientation", "portrait"),
                ("size", "medium"),
                ("per_page", per_page.as_str()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let body: PexelsSearchResponse = decode_json(&self.name, response).await?;
        Ok(body.videos)
    }

    async fn download(&self, video: &PexelsVideo) -> Result<Option<MediaHandle>, StageError> {
        let Some(file) = best_file(video) else {
            return Ok(None);
        };
        if !is_allowed_download(&file.link) {
            warn!(link = %file.link, "Blocked download from untrusted host");
            return Ok(None);
        }

        let path = self.download_dir.join(format!("pexels_{}.mp4", video.id));
        let handle = MediaHandle::new(
            &path,
            video.id.to_string(),
            video.duration,
            file.width.unwrap_or(0),
            file.height.unwrap_or(0),
        );
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "Clip already downloaded");
            return Ok(Some(handle));
        }

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", self.download_dir.display(), e)))?;
        let response = self
            .client
            .get(&file.link)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let bytes = ensure_success(&self.name, response)
            .await?
            .bytes()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("part");
        tokio::fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", temp_path.display(), e)))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", path.display(), e)))?;
        info!(id = video.id, bytes = bytes.len(), "Downloaded clip");
        Ok(Some(handle))
    }
}

#[async_trait]
impl FootageSource for PexelsFootageSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, queries), fields(provider = %self.name, queries = queries.len()))]
    async fn find_footage(
        &self,
        queries: &[String],
        _mode: SafetyMode,
        min_duration: f64,
    ) -> Result<Vec<MediaHandle>, StageError> {
        let mut clips = Vec::new();
        for query in queries {
            let videos = self.search(query).await?;
            if videos.is_empty() {
                debug!(query = %query, "No results");
                continue;
            }

            let long_enough: Vec<&PexelsVideo> =
                videos.iter().filter(|v| v.duration >= min_duration).collect();
            let candidates: Vec<&PexelsVideo> = if long_enough.is_empty() {
                videos.iter().collect()
            } else {
                long_enough
            };

            let top = &candidates[..candidates.len().min(10)];
            let Some(video) = top.choose(&mut rand::thread_rng()).copied() else {
                continue;
            };
            if let Some(handle) = self.download(video).await? {
                clips.push(handle);
            }
        }
        Ok(clips)
    }
}

/// Clips drawn from a local directory of `.mp4` files.
#[derive(Debug, Clone)]
pub struct LocalFootageSource {
    name: String,
    dir: PathBuf,
    clip_secs: f64,
}

impl LocalFootageSource {
    /// Source reading `dir`; clips are assumed to last `clip_secs`.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, clip_secs: f64) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            clip_secs,
        }
    }

    async fn list(dir: &Path) -> Result<Vec<PathBuf>, StageError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", dir.display(), e)))?;
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", dir.display(), e)))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("mp4")) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl FootageSource for LocalFootageSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find_footage(
        &self,
        queries: &[String],
        _mode: SafetyMode,
        _min_duration: f64,
    ) -> Result<Vec<MediaHandle>, StageError> {
        let files = Self::list(&self.dir).await?;
        let wanted = queries.len().max(1);

        // Prefer files whose name mentions a query term.
        let mut matching: Vec<&PathBuf> = files
            .iter()
            .filter(|path| {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                queries.iter().any(|q| {
                    q.split(|c: char| c == ',' || c.is_whitespace())
                        .next()
                        .is_some_and(|term| !term.is_empty() && stem.contains(term))
                })
            })
            .collect();
        if matching.is_empty() {
            matching = files.iter().collect();
        }
        matching.shuffle(&mut rand::thread_rng());

        Ok(matching
            .into_iter()
            .take(wanted)
            .map(|path| {
                let id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                MediaHandle::new(path, id, self.clip_secs, 0, 0)
            })
            .collect())
    }
}

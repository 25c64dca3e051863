//! Checkpoints for in-progress productions.

use derive_getters::Getters;
use reelwright_core::{
    AudioHandle, MediaHandle, ProductionRecord, RecordId, Script, VideoHandle,
};
use reelwright_error::{ReelwrightResult, StorageError, StorageErrorKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Artifacts produced so far by one production.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSet {
    /// Generated script.
    #[serde(default)]
    pub script: Option<Script>,
    /// Synthesized narration.
    #[serde(default)]
    pub audio: Option<AudioHandle>,
    /// Downloaded clips.
    #[serde(default)]
    pub footage: Vec<MediaHandle>,
    /// Rendered video.
    #[serde(default)]
    pub video: Option<VideoHandle>,
}

/// Snapshot of an open record and its artifacts.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct Checkpoint {
    /// The open record.
    record: ProductionRecord,
    /// Artifacts produced so far.
    #[serde(default)]
    artifacts: ArtifactSet,
    /// Whether the production publishes once composed.
    #[serde(default = "default_upload_enabled")]
    upload_enabled: bool,
}

fn default_upload_enabled() -> bool {
    true
}

impl Checkpoint {
    /// Pair a record with its artifacts.
    pub fn new(record: ProductionRecord, artifacts: ArtifactSet) -> Self {
        Self {
            record,
            artifacts,
            upload_enabled: true,
        }
    }

    /// Remember whether the upload stage runs.
    pub fn with_upload_enabled(mut self, upload_enabled: bool) -> Self {
        self.upload_enabled = upload_enabled;
        self
    }

    /// Split into record and artifacts.
    pub fn into_parts(self) -> (ProductionRecord, ArtifactSet) {
        (self.record, self.artifacts)
    }
}

/// One JSON file per in-progress production, replaced atomically.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Store checkpoints under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Checkpoint directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &RecordId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Write or replace the checkpoint for the record.
    #[instrument(skip(self, checkpoint), fields(record_id = %checkpoint.record.id(), state = %checkpoint.record.state()))]
    pub async fn save(&self, checkpoint: &Checkpoint) -> ReelwrightResult<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                self.dir.display(),
                e
            )))
        })?;

        let path = self.path_for(checkpoint.record.id());
        let data = serde_json::to_vec_pretty(checkpoint)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        debug!(path = %path.display(), "Saved checkpoint");
        Ok(())
    }

    /// Load the checkpoint for a record, if one exists.
    #[instrument(skip(self))]
    pub async fn load(&self, id: &RecordId) -> ReelwrightResult<Option<Checkpoint>> {
        let path = self.path_for(id);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
                .into());
            }
        };
        let checkpoint = serde_json::from_slice(&data).map_err(|e| {
            StorageError::new(StorageErrorKind::Serialization(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(Some(checkpoint))
    }

    /// Delete the checkpoint for a record. Missing checkpoints are fine.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &RecordId) -> ReelwrightResult<()> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "remove {}: {}",
                path.display(),
                e
            )))
            .into()),
        }
    }

    /// Every readable checkpoint in the directory.
    pub async fn list(&self) -> ReelwrightResult<Vec<Checkpoint>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    self.dir.display(),
                    e
                )))
                .into());
            }
        };

        let mut checkpoints = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                self.dir.display(),
                e
            )))
        })? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(data) => match serde_json::from_slice::<Checkpoint>(&data) {
                    Ok(checkpoint) => checkpoints.push(checkpoint),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable checkpoint"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable checkpoint"),
            }
        }
        checkpoints.sort_by(|a, b| a.record.id().cmp(b.record.id()));
        Ok(checkpoints)
    }
}

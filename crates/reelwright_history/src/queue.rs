//! Persisted queue of content ideas.

use reelwright_core::ContentIdea;
use reelwright_error::{ReelwrightResult, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// Ideas waiting to be produced, oldest first, kept in one JSON array file.
///
/// Every change rewrites the file through a temporary file and a rename. A
/// file that does not parse is read as an empty queue and replaced on the
/// next write.
#[derive(Debug)]
pub struct ContentQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ContentQueue {
    /// Queue stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Queue file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> ReelwrightResult<Vec<ContentIdea>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
                .into());
            }
        };
        match serde_json::from_slice(&data) {
            Ok(ideas) => Ok(ideas),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Content queue unreadable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn write(&self, ideas: &[ContentIdea]) -> ReelwrightResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let data = serde_json::to_vec_pretty(ideas)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;
        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )))
        })?;
        Ok(())
    }

    /// Every queued idea, oldest first.
    pub async fn ideas(&self) -> ReelwrightResult<Vec<ContentIdea>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    /// Append ideas not already queued for the same subject.
    ///
    /// Returns how many were added.
    #[instrument(skip(self, ideas), fields(path = %self.path.display(), offered = ideas.len()))]
    pub async fn extend(&self, ideas: Vec<ContentIdea>) -> ReelwrightResult<usize> {
        let _guard = self.lock.lock().await;
        let mut queue = self.read().await?;
        let before = queue.len();
        for idea in ideas {
            if queue.iter().any(|queued| queued.same_subject(&idea)) {
                debug!(topic = %idea.topic(), theme = %idea.theme(), "Idea already queued");
                continue;
            }
            queue.push(idea);
        }
        let added = queue.len() - before;
        if added > 0 {
            self.write(&queue).await?;
        }
        Ok(added)
    }

    /// Remove and return the oldest idea.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn pop_front(&self) -> ReelwrightResult<Option<ContentIdea>> {
        let _guard = self.lock.lock().await;
        let mut queue = self.read().await?;
        if queue.is_empty() {
            return Ok(None);
        }
        let idea = queue.remove(0);
        self.write(&queue).await?;
        Ok(Some(idea))
    }
}

//! JSON-lines history file.

use crate::HistoryStore;
use async_trait::async_trait;
use reelwright_core::{ProductionRecord, RecordId};
use reelwright_error::{InputError, ReelwrightResult, StorageError, StorageErrorKind};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// History backed by an append-only JSONL file.
///
/// - **Durability**: each append is flushed and `fsync`ed before returning
/// - **Single writer**: appends are serialized by an internal mutex
/// - **Torn writes**: undecodable lines are skipped with a warning, and an
///   append after a torn final line starts on a fresh line
#[derive(Debug)]
pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlHistoryStore {
    /// Open (without creating) a history file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// History file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ends_without_newline(file: &mut tokio::fs::File) -> std::io::Result<bool> {
        let len = file.metadata().await?.len();
        if len == 0 {
            return Ok(false);
        }
        file.seek(SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        file.seek(SeekFrom::End(0)).await?;
        Ok(last[0] != b'\n')
    }

    async fn read_all(&self) -> ReelwrightResult<Vec<ProductionRecord>> {
        // Raw bytes: a torn write can cut a multibyte character.
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
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

        let mut records = Vec::new();
        for (index, line) in contents.split(|b| *b == b'\n').enumerate() {
            if line.trim_ascii().is_empty() {
                continue;
            }
            match serde_json::from_slice::<ProductionRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping undecodable history line"
                ),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    #[instrument(skip(self, record), fields(record_id = %record.id(), status = %record.status()))]
    async fn append(&self, record: &ProductionRecord) -> ReelwrightResult<RecordId> {
        if !record.is_final() {
            return Err(InputError::new(format!(
                "record {} is still in progress and cannot enter history",
                record.id()
            ))
            .into());
        }

        let mut line = serde_json::to_string(record)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let write_err = |e: std::io::Error| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_err)?;

        if Self::ends_without_newline(&mut file).await.map_err(write_err)? {
            debug!("History ends with a torn line, starting a fresh one");
            line.insert(0, '\n');
        }

        file.write_all(line.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;

        info!("Appended production record to history");
        Ok(*record.id())
    }

    #[instrument(skip(self))]
    async fn recent_records(&self, limit: usize) -> ReelwrightResult<Vec<ProductionRecord>> {
        let mut records = self.read_all().await?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }
}

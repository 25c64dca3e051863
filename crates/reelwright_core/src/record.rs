//! Production records and their per-stage bookkeeping.

use crate::{Fingerprint, IdempotencyToken, TopicCategory, UploadId};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use reelwright_error::{InputError, StageError, StageErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use strum::IntoEnumIterator;
use uuid::Uuid;

/// Unique, time-ordered record identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Fresh UUIDv7 id; later ids sort after earlier ones.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RecordId {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| InputError::new(format!("invalid record id '{}': {}", s, e)))
    }
}

/// Pipeline stages in execution order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StageKind {
    /// Script generation
    Script,
    /// Narration synthesis
    Audio,
    /// Stock footage search and download
    Footage,
    /// Video composition
    Compose,
    /// Publication
    Upload,
}

impl StageKind {
    /// State the pipeline enters when this stage succeeds.
    ///
    /// Upload maps to `Uploaded`; the dry-run `SkippedUpload` transition is
    /// made explicitly by the orchestrator.
    pub fn produces(&self) -> PipelineState {
        match self {
            StageKind::Script => PipelineState::ScriptReady,
            StageKind::Audio => PipelineState::AudioReady,
            StageKind::Footage => PipelineState::FootageReady,
            StageKind::Compose => PipelineState::Composed,
            StageKind::Upload => PipelineState::Uploaded,
        }
    }
}

/// Status of a single stage inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StageStatus {
    /// Not yet attempted
    Pending,
    /// Completed
    Success,
    /// Failed and ended the production
    Failed,
    /// Not run, either after a failure or by dry run
    Skipped,
}

/// Pipeline states, one per completed stage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineState {
    /// Nothing produced yet
    Created,
    /// Script generated
    ScriptReady,
    /// Narration synthesized
    AudioReady,
    /// Footage downloaded
    FootageReady,
    /// Video rendered
    Composed,
    /// Video published
    Uploaded,
    /// Upload short-circuited by dry run
    SkippedUpload,
}

impl PipelineState {
    /// Stage that consumes this state, if any remains.
    pub fn next_stage(&self) -> Option<StageKind> {
        match self {
            PipelineState::Created => Some(StageKind::Script),
            PipelineState::ScriptReady => Some(StageKind::Audio),
            PipelineState::AudioReady => Some(StageKind::Footage),
            PipelineState::FootageReady => Some(StageKind::Compose),
            PipelineState::Composed => Some(StageKind::Upload),
            PipelineState::Uploaded | PipelineState::SkippedUpload => None,
        }
    }
}

/// Overall record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordStatus {
    /// Still being produced; only ever seen in checkpoints
    InProgress,
    /// Finalized after every stage succeeded (or upload was skipped)
    Success,
    /// Finalized after an unrecoverable failure
    Failed,
}

/// Why a production failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Retryable error that exhausted its attempts
    Transient,
    /// Non-retryable provider or input error
    Terminal,
    /// Budget policy refused the stage
    QuotaExceeded,
    /// Duplicate topic or script
    Conflict,
    /// History, ledger or checkpoint I/O failed
    StorageFailure,
    /// Cancelled at a stage boundary
    Cancelled,
}

impl From<&StageErrorKind> for FailureKind {
    fn from(kind: &StageErrorKind) -> Self {
        match kind {
            StageErrorKind::Transient(_) => FailureKind::Transient,
            StageErrorKind::Terminal(_) => FailureKind::Terminal,
            StageErrorKind::QuotaExceeded(_) => FailureKind::QuotaExceeded,
        }
    }
}

impl From<&StageError> for FailureKind {
    fn from(err: &StageError) -> Self {
        FailureKind::from(&err.kind)
    }
}

/// Last error recorded against a stage.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct StageErrorDetail {
    /// Taxonomy kind.
    kind: FailureKind,
    /// Human-readable message.
    message: String,
}

impl StageErrorDetail {
    /// Create a detail entry.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&StageError> for StageErrorDetail {
    fn from(err: &StageError) -> Self {
        Self::new(FailureKind::from(err), err.message())
    }
}

/// Snapshot of one stage's execution inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage status.
    status: StageStatus,
    /// Attempts made across all providers.
    #[serde(default)]
    attempts: u32,
    /// Provider that produced the output or the last error.
    #[serde(default)]
    provider: Option<String>,
    /// Last error, if any attempt failed.
    #[serde(default)]
    error: Option<StageErrorDetail>,
}

impl StageReport {
    /// A stage that has not run.
    pub fn pending() -> Self {
        Self {
            status: StageStatus::Pending,
            attempts: 0,
            provider: None,
            error: None,
        }
    }

    /// A completed stage.
    pub fn success(attempts: u32, provider: Option<String>) -> Self {
        Self {
            status: StageStatus::Success,
            attempts,
            provider,
            error: None,
        }
    }

    /// A stage that ended the production.
    pub fn failed(attempts: u32, provider: Option<String>, error: StageErrorDetail) -> Self {
        Self {
            status: StageStatus::Failed,
            attempts,
            provider,
            error: Some(error),
        }
    }

    /// A stage that was not run.
    pub fn skipped() -> Self {
        Self {
            status: StageStatus::Skipped,
            attempts: 0,
            provider: None,
            error: None,
        }
    }

    /// Keep the last error seen even though a later attempt or fallback succeeded.
    pub fn with_error(mut self, error: Option<StageErrorDetail>) -> Self {
        self.error = error;
        self
    }
}

/// Failure summary on a finalized record.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct FailureSummary {
    /// Stage that failed; `None` for failures outside any stage (e.g. conflicts before scripting).
    #[serde(default)]
    stage: Option<StageKind>,
    /// Taxonomy kind.
    kind: FailureKind,
    /// Human-readable message.
    message: String,
    /// Attempts made by the failing stage.
    #[serde(default)]
    attempts: u32,
}

/// Durable history entry for one production.
///
/// A record is open while the orchestrator drives it and becomes immutable
/// once finalized; every mutator refuses to touch a finalized record.
/// Optional fields default on read so older entries stay readable.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct ProductionRecord {
    /// Record id.
    id: RecordId,
    /// Earlier record this one retries.
    #[serde(default)]
    retry_of: Option<RecordId>,
    /// Topic category.
    category: TopicCategory,
    /// Theme.
    theme: String,
    /// Script title once generated.
    #[serde(default)]
    title: Option<String>,
    /// Fingerprint of the generated script.
    #[serde(default)]
    script_fingerprint: Option<Fingerprint>,
    /// Per-stage reports.
    #[serde(default)]
    stages: BTreeMap<StageKind, StageReport>,
    /// Last state reached.
    state: PipelineState,
    /// Overall status.
    status: RecordStatus,
    /// Failure summary for failed records.
    #[serde(default)]
    failure: Option<FailureSummary>,
    /// Rendered video.
    #[serde(default)]
    artifact_path: Option<PathBuf>,
    /// Platform id of the published video.
    #[serde(default)]
    upload_id: Option<UploadId>,
    /// Token sent with the upload request.
    #[serde(default)]
    idempotency_token: Option<IdempotencyToken>,
    /// Creation time.
    created_at: DateTime<Utc>,
    /// Finalization time.
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl ProductionRecord {
    /// Open a record with every stage pending.
    pub fn new(
        id: RecordId,
        retry_of: Option<RecordId>,
        category: TopicCategory,
        theme: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let stages = StageKind::iter()
            .map(|kind| (kind, StageReport::pending()))
            .collect();
        Self {
            id,
            retry_of,
            category,
            theme: theme.into(),
            title: None,
            script_fingerprint: None,
            stages,
            state: PipelineState::Created,
            status: RecordStatus::InProgress,
            failure: None,
            artifact_path: None,
            upload_id: None,
            idempotency_token: None,
            created_at,
            completed_at: None,
        }
    }

    /// True once the record is finalized as success or failure.
    pub fn is_final(&self) -> bool {
        self.status != RecordStatus::InProgress
    }

    /// True for finalized successes.
    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }

    /// Report for one stage.
    pub fn stage(&self, kind: StageKind) -> Option<&StageReport> {
        self.stages.get(&kind)
    }

    /// Failure kind of a failed record.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure.as_ref().map(|f| f.kind)
    }

    fn ensure_open(&self) -> Result<(), InputError> {
        if self.is_final() {
            Err(InputError::new(format!(
                "record {} is finalized as {}",
                self.id, self.status
            )))
        } else {
            Ok(())
        }
    }

    /// Replace the theme (duplicate reselection happens before scripting).
    pub fn set_theme(&mut self, theme: impl Into<String>) -> Result<(), InputError> {
        self.ensure_open()?;
        self.theme = theme.into();
        Ok(())
    }

    /// Store title and fingerprint of the generated script.
    pub fn set_script(
        &mut self,
        title: impl Into<String>,
        fingerprint: Fingerprint,
    ) -> Result<(), InputError> {
        self.ensure_open()?;
        self.title = Some(title.into());
        self.script_fingerprint = Some(fingerprint);
        Ok(())
    }

    /// Store a title without a fingerprint, for records that republish an
    /// earlier script.
    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), InputError> {
        self.ensure_open()?;
        self.title = Some(title.into());
        Ok(())
    }

    /// Store the rendered video path.
    pub fn set_artifact_path(&mut self, path: impl Into<PathBuf>) -> Result<(), InputError> {
        self.ensure_open()?;
        self.artifact_path = Some(path.into());
        Ok(())
    }

    /// Store the upload idempotency token before the upload call is issued.
    pub fn set_idempotency_token(&mut self, token: IdempotencyToken) -> Result<(), InputError> {
        self.ensure_open()?;
        self.idempotency_token = Some(token);
        Ok(())
    }

    /// Store the platform id of the published video.
    pub fn set_upload_id(&mut self, id: UploadId) -> Result<(), InputError> {
        self.ensure_open()?;
        self.upload_id = Some(id);
        Ok(())
    }

    /// Record a stage success and advance the state machine.
    pub fn complete_stage(
        &mut self,
        kind: StageKind,
        report: StageReport,
    ) -> Result<(), InputError> {
        self.ensure_open()?;
        self.stages.insert(kind, report);
        self.state = kind.produces();
        Ok(())
    }

    /// Dry run: mark upload skipped and enter `SkippedUpload`.
    pub fn skip_upload(&mut self) -> Result<(), InputError> {
        self.ensure_open()?;
        self.stages.insert(StageKind::Upload, StageReport::skipped());
        self.state = PipelineState::SkippedUpload;
        Ok(())
    }

    /// Finalize as success.
    pub fn finalize_success(&mut self, now: DateTime<Utc>) -> Result<(), InputError> {
        self.ensure_open()?;
        self.status = RecordStatus::Success;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Finalize as failed.
    ///
    /// The failing stage (when there is one) is marked `failed` with its
    /// report, and every stage after it that has not run is marked `skipped`.
    /// When the failure happens outside a stage, every pending stage is skipped.
    pub fn finalize_failure(
        &mut self,
        failed: Option<(StageKind, StageReport)>,
        kind: FailureKind,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), InputError> {
        self.ensure_open()?;
        let (stage, attempts) = match failed {
            Some((stage, report)) => {
                let attempts = report.attempts;
                self.stages.insert(stage, report);
                (Some(stage), attempts)
            }
            None => (None, 0),
        };
        for (kind, report) in self.stages.iter_mut() {
            let after_failure = stage.is_none_or(|failed| *kind > failed);
            if after_failure && report.status == StageStatus::Pending {
                *report = StageReport::skipped();
            }
        }
        self.failure = Some(FailureSummary {
            stage,
            kind,
            message: message.into(),
            attempts,
        });
        self.status = RecordStatus::Failed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Open a fresh record that retries this one.
    pub fn retry(&self, now: DateTime<Utc>) -> Self {
        Self::new(
            RecordId::new(),
            Some(self.id),
            self.category.clone(),
            self.theme.clone(),
            now,
        )
    }
}

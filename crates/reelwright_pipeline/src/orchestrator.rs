//! The production state machine.

use crate::{ContentConfig, PipelineConfig};
use rand::seq::SliceRandom;
use reelwright_core::{
    Clock, FailureKind, Fingerprint, IdempotencyToken, PipelineState, ProductionRecord,
    ProductionRequest, RecordId, ScriptBuilder, StageErrorDetail, StageKind, StageOutcome,
    StageReport, SystemClock, UploadId, VideoHandle,
};
use reelwright_error::{InputError, ReelwrightResult};
use reelwright_history::{ArtifactSet, Checkpoint, CheckpointStore, DuplicatePolicy, HistoryStore};
use reelwright_stages::{
    AudioInput, AudioStage, ComposeInput, ComposeStage, FootageInput, FootageStage, ScriptInput,
    ScriptStage, Stage, StageExecutor, UploadInput, UploadStage,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// The five stages, each with its providers in fallback order.
#[derive(Debug, Clone)]
pub struct StageSet {
    /// Script generation.
    pub script: ScriptStage,
    /// Narration synthesis.
    pub audio: AudioStage,
    /// Footage search.
    pub footage: FootageStage,
    /// Video composition.
    pub compose: ComposeStage,
    /// Publication.
    pub upload: UploadStage,
}

/// Why a production is being finalized as failed.
#[derive(Debug)]
struct Failure {
    stage: Option<(StageKind, StageReport)>,
    kind: FailureKind,
    message: String,
}

impl Failure {
    /// A failure outside any stage.
    fn outside(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage: None,
            kind,
            message: message.into(),
        }
    }

    /// A failure charged to `stage` without a provider outcome.
    fn at(stage: StageKind, kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let report = StageReport::failed(0, None, StageErrorDetail::new(kind, message.clone()));
        Self {
            stage: Some((stage, report)),
            kind,
            message,
        }
    }

    /// A stage input missing from restored artifacts.
    fn missing(stage: StageKind, artifact: &str) -> Self {
        Self::at(
            stage,
            FailureKind::Terminal,
            format!("no {} available for the {} stage", artifact, stage),
        )
    }
}

/// Result of one stage transition.
#[derive(Debug)]
enum Step {
    Advanced,
    Failed(Failure),
}

/// Split an outcome into output and report, or a failure.
///
/// A ledger write failure is parked in `ledger_failure` so the output is
/// still applied to the record before the production stops.
fn settle<T>(
    stage: StageKind,
    outcome: StageOutcome<T>,
    ledger_failure: &mut Option<String>,
) -> Result<(T, StageReport), Failure> {
    let report = outcome.report();
    if let Some(message) = outcome.ledger_failure {
        *ledger_failure = Some(message);
    }
    match outcome.result {
        Ok(value) => Ok((value, report)),
        Err(e) => Err(Failure {
            stage: Some((stage, report)),
            kind: FailureKind::from(&e),
            message: e.message().to_string(),
        }),
    }
}

/// An open record with its artifacts.
#[derive(Debug)]
struct Production {
    record: ProductionRecord,
    artifacts: ArtifactSet,
    upload_enabled: bool,
    ledger_failure: Option<String>,
}

impl Production {
    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.record.clone(), self.artifacts.clone())
            .with_upload_enabled(self.upload_enabled)
    }
}

/// Drives productions through script, audio, footage, compose and upload.
///
/// Every production ends in exactly one finalized record appended to the
/// history. A checkpoint is written after each successful stage and removed
/// once the record is durable, so an interrupted production can be resumed
/// with [`Orchestrator::resume`].
///
/// # Example
///
/// ```rust,ignore
/// let orchestrator = OrchestratorBuilder::default()
///     .content(config.content().clone())
///     .executor(executor)
///     .stages(stages)
///     .history(history)
///     .checkpoints(CheckpointStore::new("checkpoints"))
///     .duplicates(Arc::new(ThemeSimilarityPolicy::new(0.6)))
///     .build()?;
///
/// let record = orchestrator
///     .produce(&ProductionRequest::random(), &CancellationToken::new())
///     .await?;
/// ```
#[derive(Clone, derive_builder::Builder)]
#[builder(pattern = "owned")]
pub struct Orchestrator {
    /// Topics and themes.
    content: ContentConfig,
    /// Lookback, directories and stage settings.
    #[builder(default)]
    pipeline: PipelineConfig,
    /// Quota-aware retrying executor.
    executor: StageExecutor,
    /// Stages and their providers.
    stages: StageSet,
    /// Finalized records.
    history: Arc<dyn HistoryStore>,
    /// In-progress records.
    checkpoints: CheckpointStore,
    /// Duplicate topic policy.
    duplicates: Arc<dyn DuplicatePolicy>,
    /// Time source for record timestamps.
    #[builder(default = "Arc::new(SystemClock) as Arc<dyn Clock>")]
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    /// Content settings.
    pub fn content(&self) -> &ContentConfig {
        &self.content
    }

    /// Pipeline settings.
    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// History the orchestrator appends to.
    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Stages and their providers.
    pub fn stages(&self) -> &StageSet {
        &self.stages
    }

    /// Executor shared by every stage.
    pub fn executor(&self) -> &StageExecutor {
        &self.executor
    }

    /// Checkpoints of productions that have not finalized.
    pub async fn pending(&self) -> ReelwrightResult<Vec<Checkpoint>> {
        self.checkpoints.list().await
    }

    /// Run one production to a finalized record.
    ///
    /// Stage failures, quota refusals, duplicates and cancellation all
    /// come back as `Ok` with a failed record.
    ///
    /// # Errors
    ///
    /// Returns an input error for unknown categories or an empty theme
    /// list, and a storage error when the finalized record cannot be
    /// appended to the history.
    #[instrument(skip(self, request, cancel), fields(topic = ?request.topic(), upload = *request.upload_enabled()))]
    pub async fn produce(
        &self,
        request: &ProductionRequest,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<ProductionRecord> {
        let category = {
            let mut rng = rand::thread_rng();
            request.topic().resolve(&self.content.categories(), &mut rng)?
        };
        let theme = match request.theme().as_deref().map(str::trim) {
            Some(theme) if !theme.is_empty() => theme.to_string(),
            _ => self
                .pick_theme(&[])
                .ok_or_else(|| InputError::new("no themes configured and none requested"))?,
        };

        let record = ProductionRecord::new(
            RecordId::new(),
            *request.retry_of(),
            category,
            theme,
            self.clock.now(),
        );
        info!(
            record_id = %record.id(),
            category = %record.category(),
            theme = %record.theme(),
            "Production started"
        );
        let mut production = Production {
            record,
            artifacts: ArtifactSet::default(),
            upload_enabled: *request.upload_enabled(),
            ledger_failure: None,
        };

        if let Some(failure) = self.check_topic(&mut production.record).await? {
            return self.finalize(production, Some(failure)).await;
        }
        self.drive(production, cancel).await
    }

    /// Continue a checkpointed production from its last completed stage.
    ///
    /// # Errors
    ///
    /// Returns an input error when the id is already finalized or has no
    /// checkpoint.
    #[instrument(skip(self, cancel))]
    pub async fn resume(
        &self,
        id: &RecordId,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<ProductionRecord> {
        if let Some(record) = self.history.get(id).await? {
            return Err(InputError::new(format!(
                "record {} is already finalized as {}",
                id,
                record.status()
            ))
            .into());
        }
        let Some(checkpoint) = self.checkpoints.load(id).await? else {
            return Err(InputError::new(format!("no checkpoint for record {}", id)).into());
        };

        let upload_enabled = *checkpoint.upload_enabled();
        let (record, artifacts) = checkpoint.into_parts();
        if record.is_final() {
            return Err(InputError::new(format!(
                "checkpoint for {} holds a finalized record",
                id
            ))
            .into());
        }
        info!(state = %record.state(), "Resuming production");
        self.drive(
            Production {
                record,
                artifacts,
                upload_enabled,
                ledger_failure: None,
            },
            cancel,
        )
        .await
    }

    /// Publish a dry-run production.
    ///
    /// The upload runs in a new record whose `retry_of` is `id`. Calling
    /// this again after a successful publish returns the record that holds
    /// the upload id and uploads nothing.
    ///
    /// # Errors
    ///
    /// Returns an input error when the id is unknown or the record was not
    /// a successful dry run.
    #[instrument(skip(self, cancel))]
    pub async fn publish(
        &self,
        id: &RecordId,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<ProductionRecord> {
        let Some(source) = self.history.get(id).await? else {
            return Err(InputError::new(format!("no finalized record {}", id)).into());
        };
        if let Some(upload_id) = source.upload_id() {
            info!(upload_id = %upload_id, "Record is already published");
            return Ok(source);
        }
        let republished = self
            .history
            .recent_records(usize::MAX)
            .await?
            .into_iter()
            .find(|r| r.retry_of().as_ref() == Some(id) && r.upload_id().is_some());
        if let Some(existing) = republished {
            info!(record_id = %existing.id(), "Record was published by an earlier call");
            return Ok(existing);
        }
        if !source.is_success() || *source.state() != PipelineState::SkippedUpload {
            return Err(InputError::new(format!(
                "record {} is {} at {}, only successful dry runs can be published",
                id,
                source.status(),
                source.state()
            ))
            .into());
        }
        let Some(video_path) = source.artifact_path().clone() else {
            return Err(InputError::new(format!("record {} has no rendered video", id)).into());
        };

        let artifacts = self.load_kept_artifacts(&source, &video_path).await?;
        let mut record = source.retry(self.clock.now());
        if let Some(title) = source.title() {
            record.set_title(title.clone())?;
        }
        record.set_artifact_path(video_path)?;
        for kind in [
            StageKind::Script,
            StageKind::Audio,
            StageKind::Footage,
            StageKind::Compose,
        ] {
            record.complete_stage(kind, StageReport::skipped())?;
        }
        // Every publish attempt for the same source shares one token.
        record.set_idempotency_token(IdempotencyToken::for_record(source.id()))?;
        info!(record_id = %record.id(), "Publishing dry run");

        let production = Production {
            record,
            artifacts,
            upload_enabled: true,
            ledger_failure: None,
        };
        self.checkpoints.save(&production.checkpoint()).await?;
        self.drive(production, cancel).await
    }

    fn pick_theme(&self, excluded: &[String]) -> Option<String> {
        let excluded: Vec<String> = excluded.iter().map(|t| t.trim().to_lowercase()).collect();
        let candidates: Vec<&String> = self
            .content
            .themes()
            .iter()
            .filter(|t| !excluded.contains(&t.trim().to_lowercase()))
            .collect();
        let mut rng = rand::thread_rng();
        candidates.choose(&mut rng).map(|t| t.to_string())
    }

    /// Reselect the theme once when the topic repeats a recent success.
    async fn check_topic(&self, record: &mut ProductionRecord) -> ReelwrightResult<Option<Failure>> {
        let lookback = *self.pipeline.duplicate_lookback();
        let Some(existing) = self
            .history
            .find_duplicate_topic(record.category(), record.theme(), lookback, self.duplicates.as_ref())
            .await?
        else {
            return Ok(None);
        };

        let rejected = [record.theme().clone(), existing.theme().clone()];
        let Some(alternative) = self.pick_theme(&rejected) else {
            warn!(duplicate_of = %existing.id(), "Duplicate topic and no alternative theme");
            return Ok(Some(Failure::outside(
                FailureKind::Conflict,
                format!(
                    "{}/{} repeats record {} and no other theme is configured",
                    record.category(),
                    record.theme(),
                    existing.id()
                ),
            )));
        };
        info!(
            from = %record.theme(),
            to = %alternative,
            duplicate_of = %existing.id(),
            "Duplicate topic, reselecting theme"
        );
        record.set_theme(alternative)?;

        if let Some(again) = self
            .history
            .find_duplicate_topic(record.category(), record.theme(), lookback, self.duplicates.as_ref())
            .await?
        {
            warn!(duplicate_of = %again.id(), "Reselected theme is also a duplicate");
            return Ok(Some(Failure::outside(
                FailureKind::Conflict,
                format!(
                    "{}/{} repeats record {}",
                    record.category(),
                    record.theme(),
                    again.id()
                ),
            )));
        }
        Ok(None)
    }

    /// Run stages from the record's current state to finalization.
    async fn drive(
        &self,
        mut production: Production,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<ProductionRecord> {
        while let Some(kind) = production.record.state().next_stage() {
            if cancel.is_cancelled() {
                info!(stage = %kind, "Production cancelled");
                let failure = Failure::outside(
                    FailureKind::Cancelled,
                    format!("cancelled before the {} stage", kind),
                );
                return self.finalize(production, Some(failure)).await;
            }

            let step = match self.run_step(kind, &mut production).await {
                Ok(step) => step,
                Err(e) => {
                    error!(stage = %kind, error = %e, "Storage failed during stage");
                    Step::Failed(Failure::at(kind, FailureKind::StorageFailure, e.to_string()))
                }
            };

            match step {
                Step::Advanced => {
                    if let Some(message) = production.ledger_failure.take() {
                        let failure = Failure::outside(
                            FailureKind::StorageFailure,
                            format!("quota ledger write failed after the {} stage: {}", kind, message),
                        );
                        return self.finalize(production, Some(failure)).await;
                    }
                    if let Err(e) = self.checkpoints.save(&production.checkpoint()).await {
                        error!(stage = %kind, error = %e, "Could not write checkpoint");
                        let failure = Failure::outside(FailureKind::StorageFailure, e.to_string());
                        return self.finalize(production, Some(failure)).await;
                    }
                    debug!(stage = %kind, state = %production.record.state(), "Stage complete");
                }
                Step::Failed(failure) => return self.finalize(production, Some(failure)).await,
            }
        }
        self.finalize(production, None).await
    }

    async fn run_step(&self, kind: StageKind, production: &mut Production) -> ReelwrightResult<Step> {
        match kind {
            StageKind::Script => self.script_step(production).await,
            StageKind::Audio => self.audio_step(production).await,
            StageKind::Footage => self.footage_step(production).await,
            StageKind::Compose => self.compose_step(production).await,
            StageKind::Upload => self.upload_step(production).await,
        }
    }

    /// Primary provider, then at most one fallback after a non-quota failure.
    async fn run_stage<S>(&self, stage: &S, input: &S::Input) -> ReelwrightResult<StageOutcome<S::Output>>
    where
        S: Stage,
    {
        let mut outcome = self.executor.execute(stage, 0, input).await?;
        let primary_error = match &outcome.result {
            Err(e) if !e.is_quota() && stage.providers().len() > 1 => Some(e.clone()),
            _ => None,
        };

        if let Some(primary_error) = primary_error {
            info!(
                stage = %stage.kind(),
                failed = ?outcome.provider,
                error = %primary_error.kind,
                "Trying fallback provider"
            );
            let mut fallback = self.executor.execute(stage, 1, input).await?;
            fallback.attempts += outcome.attempts;
            if fallback.last_error.is_none() {
                fallback.last_error = Some(primary_error);
            }
            outcome = fallback;
        }
        Ok(outcome)
    }

    async fn script_step(&self, production: &mut Production) -> ReelwrightResult<Step> {
        let input = ScriptInput {
            category: production.record.category().clone(),
            theme: production.record.theme().clone(),
        };
        let outcome = self.run_stage(&self.stages.script, &input).await?;
        let (script, report) = match settle(StageKind::Script, outcome, &mut production.ledger_failure) {
            Ok(settled) => settled,
            Err(failure) => return Ok(Step::Failed(failure)),
        };

        let fingerprint = Fingerprint::of(script.text());
        if let Some(existing) = self
            .history
            .find_by_fingerprint(&fingerprint, *self.pipeline.duplicate_lookback())
            .await?
        {
            warn!(duplicate_of = %existing.id(), "Generated script repeats an earlier production");
            let message = format!("script repeats record {}", existing.id());
            let report = StageReport::failed(
                *report.attempts(),
                report.provider().clone(),
                StageErrorDetail::new(FailureKind::Conflict, message.clone()),
            );
            return Ok(Step::Failed(Failure {
                stage: Some((StageKind::Script, report)),
                kind: FailureKind::Conflict,
                message,
            }));
        }

        info!(title = %script.title(), words = script.word_count(), "Script ready");
        production.record.set_script(script.title(), fingerprint)?;
        production.record.complete_stage(StageKind::Script, report)?;
        production.artifacts.script = Some(script);
        Ok(Step::Advanced)
    }

    async fn audio_step(&self, production: &mut Production) -> ReelwrightResult<Step> {
        let Some(script) = production.artifacts.script.as_ref() else {
            return Ok(Step::Failed(Failure::missing(StageKind::Audio, "script")));
        };
        let input = AudioInput {
            record_id: *production.record.id(),
            text: script.text().clone(),
        };
        let outcome = self.run_stage(&self.stages.audio, &input).await?;
        let (audio, report) = match settle(StageKind::Audio, outcome, &mut production.ledger_failure) {
            Ok(settled) => settled,
            Err(failure) => return Ok(Step::Failed(failure)),
        };

        info!(duration = *audio.duration_secs(), "Narration ready");
        production.record.complete_stage(StageKind::Audio, report)?;
        production.artifacts.audio = Some(audio);
        Ok(Step::Advanced)
    }

    async fn footage_step(&self, production: &mut Production) -> ReelwrightResult<Step> {
        let Some(script) = production.artifacts.script.as_ref() else {
            return Ok(Step::Failed(Failure::missing(StageKind::Footage, "script")));
        };
        let input = FootageInput {
            category: script.category().clone(),
            keywords: script.visual_keywords().clone(),
        };
        let outcome = self.run_stage(&self.stages.footage, &input).await?;
        let (media, report) = match settle(StageKind::Footage, outcome, &mut production.ledger_failure) {
            Ok(settled) => settled,
            Err(failure) => return Ok(Step::Failed(failure)),
        };

        info!(clips = media.len(), "Footage ready");
        production.record.complete_stage(StageKind::Footage, report)?;
        production.artifacts.footage = media;
        Ok(Step::Advanced)
    }

    async fn compose_step(&self, production: &mut Production) -> ReelwrightResult<Step> {
        let artifacts = &production.artifacts;
        let (Some(script), Some(audio)) = (artifacts.script.clone(), artifacts.audio.clone()) else {
            return Ok(Step::Failed(Failure::missing(StageKind::Compose, "script or narration")));
        };
        if artifacts.footage.is_empty() {
            return Ok(Step::Failed(Failure::missing(StageKind::Compose, "footage")));
        }
        let input = ComposeInput {
            record_id: *production.record.id(),
            script,
            audio,
            media: artifacts.footage.clone(),
        };
        let outcome = self.run_stage(&self.stages.compose, &input).await?;
        let (video, report) = match settle(StageKind::Compose, outcome, &mut production.ledger_failure) {
            Ok(settled) => settled,
            Err(failure) => return Ok(Step::Failed(failure)),
        };

        info!(path = %video.path().display(), "Video composed");
        production.record.set_artifact_path(video.path().clone())?;
        production.record.complete_stage(StageKind::Compose, report)?;
        production.artifacts.video = Some(video);
        Ok(Step::Advanced)
    }

    async fn upload_step(&self, production: &mut Production) -> ReelwrightResult<Step> {
        if !production.upload_enabled {
            info!("Upload disabled, finishing as dry run");
            production.record.skip_upload()?;
            return Ok(Step::Advanced);
        }
        if let Some(upload_id) = production.record.upload_id().clone() {
            info!(upload_id = %upload_id, "Already uploaded, not uploading again");
            production
                .record
                .complete_stage(StageKind::Upload, StageReport::success(0, None))?;
            return Ok(Step::Advanced);
        }
        let (Some(script), Some(video)) = (
            production.artifacts.script.clone(),
            production.artifacts.video.clone(),
        ) else {
            return Ok(Step::Failed(Failure::missing(StageKind::Upload, "script or video")));
        };

        let token = match production.record.idempotency_token().clone() {
            Some(token) => match self.find_uploaded(&token).await {
                Ok(Some((upload_id, provider))) => {
                    info!(upload_id = %upload_id, token = %token, "Found earlier upload by token");
                    production.record.set_upload_id(upload_id)?;
                    production
                        .record
                        .complete_stage(StageKind::Upload, StageReport::success(0, Some(provider)))?;
                    return Ok(Step::Advanced);
                }
                Ok(None) => token,
                Err(failure) => return Ok(Step::Failed(failure)),
            },
            None => {
                let token = IdempotencyToken::for_record(production.record.id());
                production.record.set_idempotency_token(token.clone())?;
                // Persist the token before the platform can see it.
                self.checkpoints.save(&production.checkpoint()).await?;
                token
            }
        };

        let input = UploadInput { video, script, token };
        let outcome = self.run_stage(&self.stages.upload, &input).await;
        self.stages.upload.forget(&input.token);
        let outcome = outcome?;
        let (upload_id, report) = match settle(StageKind::Upload, outcome, &mut production.ledger_failure) {
            Ok(settled) => settled,
            Err(failure) => return Ok(Step::Failed(failure)),
        };

        production.record.set_upload_id(upload_id)?;
        production.record.complete_stage(StageKind::Upload, report)?;
        Ok(Step::Advanced)
    }

    /// Ask each uploader whether a video carrying `token` already exists.
    async fn find_uploaded(&self, token: &IdempotencyToken) -> Result<Option<(UploadId, String)>, Failure> {
        let upload = &self.stages.upload;
        for (index, provider) in upload.providers().into_iter().enumerate() {
            let run = self
                .executor
                .retry(&provider, || upload.find_by_token(index, token))
                .await;
            match run.result {
                Ok(Some(upload_id)) => return Ok(Some((upload_id, provider))),
                Ok(None) => debug!(provider = %provider, "No earlier upload found"),
                Err(e) => {
                    warn!(provider = %provider, error = %e.kind, "Could not check for an earlier upload");
                    let report = StageReport::failed(run.attempts, Some(provider), StageErrorDetail::from(&e));
                    return Err(Failure {
                        stage: Some((StageKind::Upload, report)),
                        kind: FailureKind::from(&e),
                        message: format!("could not check for an earlier upload: {}", e.message()),
                    });
                }
            }
        }
        Ok(None)
    }

    /// Finalize, append to history, then drop the checkpoint.
    async fn finalize(
        &self,
        mut production: Production,
        failure: Option<Failure>,
    ) -> ReelwrightResult<ProductionRecord> {
        let now = self.clock.now();
        match failure {
            None => production.record.finalize_success(now)?,
            Some(failure) => {
                production
                    .record
                    .finalize_failure(failure.stage, failure.kind, failure.message, now)?
            }
        }

        if production.record.is_success() && *production.record.state() == PipelineState::SkippedUpload {
            self.keep_artifacts(&production).await;
        }

        if let Err(e) = self.history.append(&production.record).await {
            error!(
                record_id = %production.record.id(),
                error = %e,
                "Could not append finalized record, keeping checkpoint for resume"
            );
            return Err(e);
        }
        if let Err(e) = self.checkpoints.remove(production.record.id()).await {
            warn!(record_id = %production.record.id(), error = %e, "Could not remove checkpoint");
        }

        let record = production.record;
        match record.failure() {
            None => info!(
                record_id = %record.id(),
                state = %record.state(),
                upload_id = ?record.upload_id(),
                "Production succeeded"
            ),
            Some(failure) => warn!(
                record_id = %record.id(),
                state = %record.state(),
                stage = ?failure.stage(),
                kind = %failure.kind(),
                attempts = *failure.attempts(),
                message = %failure.message(),
                "Production failed"
            ),
        }
        Ok(record)
    }

    fn kept_artifacts_path(video: &Path) -> PathBuf {
        video.with_extension("artifacts.json")
    }

    /// Keep script and video of a dry run next to the video for a later publish.
    async fn keep_artifacts(&self, production: &Production) {
        let Some(video) = production.artifacts.video.as_ref() else {
            return;
        };
        let kept = ArtifactSet {
            script: production.artifacts.script.clone(),
            audio: None,
            footage: Vec::new(),
            video: Some(video.clone()),
        };
        let path = Self::kept_artifacts_path(video.path());
        let written = match serde_json::to_vec_pretty(&kept) {
            Ok(data) => tokio::fs::write(&path, data).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "Could not keep dry-run artifacts");
        }
    }

    async fn load_kept_artifacts(
        &self,
        source: &ProductionRecord,
        video_path: &Path,
    ) -> ReelwrightResult<ArtifactSet> {
        let path = Self::kept_artifacts_path(video_path);
        let kept = match tokio::fs::read(&path).await {
            Ok(data) => serde_json::from_slice::<ArtifactSet>(&data)
                .map_err(|e| warn!(path = %path.display(), error = %e, "Unreadable dry-run artifacts"))
                .ok(),
            Err(_) => None,
        };
        if let Some(kept) = kept {
            if kept.script.is_some() && kept.video.is_some() {
                return Ok(kept);
            }
        }

        warn!(path = %path.display(), "Dry-run artifacts missing, publishing from the record alone");
        let title = source.title().clone().unwrap_or_default();
        let script = ScriptBuilder::default()
            .title(title)
            .text(String::new())
            .category(source.category().clone())
            .theme(source.theme().clone())
            .build()
            .map_err(|e| InputError::new(format!("cannot rebuild script for {}: {}", source.id(), e)))?;
        Ok(ArtifactSet {
            script: Some(script),
            audio: None,
            footage: Vec::new(),
            video: Some(VideoHandle::new(video_path, 0.0)),
        })
    }
}

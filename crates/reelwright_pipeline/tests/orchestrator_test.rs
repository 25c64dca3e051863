use chrono::Utc;
use reelwright_core::{
    FailureKind, Fingerprint, IdempotencyToken, PipelineState, ProductionRecord,
    ProductionRequestBuilder, RecordId, RecordStatus, StageKind, StageReport, StageStatus,
    SystemClock, TopicCategory, TopicSelection, UploadTemplate, VideoHandle,
};
use reelwright_error::{ReelwrightResult, StageErrorKind, StorageError, StorageErrorKind};
use reelwright_history::{
    ArtifactSet, Checkpoint, CheckpointStore, HistoryStore, InMemoryHistoryStore,
    ThemeSimilarityPolicy,
};
use reelwright_pipeline::{ContentConfig, Orchestrator, OrchestratorBuilder, PipelineConfig, StageSet};
use reelwright_quota::{Period, QuotaLimit, QuotaTracker};
use reelwright_stages::testing::{
    MockBehavior, MockComposer, MockFootageSource, MockScriptGenerator, MockSynthesizer,
    MockUploader, sample_script,
};
use reelwright_stages::{
    AudioStage, ComposeStage, FootageSource, FootageStage, KeywordSafetyPolicy, Pacer,
    RetryPolicy, SafetyMode, ScriptGenerator, ScriptStage, SpeechSynthesizer, StageExecutor,
    UploadStage, Uploader, VideoComposer,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;

/// History that refuses appends while `rejecting` is set.
struct RejectingHistory {
    inner: Arc<InMemoryHistoryStore>,
    rejecting: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl HistoryStore for RejectingHistory {
    async fn append(&self, record: &ProductionRecord) -> ReelwrightResult<RecordId> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(StorageError::new(StorageErrorKind::FileWrite("history: disk full".to_string())).into());
        }
        self.inner.append(record).await
    }

    async fn recent_records(&self, limit: usize) -> ReelwrightResult<Vec<ProductionRecord>> {
        self.inner.recent_records(limit).await
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    rejecting: Arc<AtomicBool>,
    pipeline: PipelineConfig,
    history: Arc<InMemoryHistoryStore>,
    quota: Arc<QuotaTracker>,
    generator: Arc<MockScriptGenerator>,
    synthesizer: Arc<MockSynthesizer>,
    uploader: Arc<MockUploader>,
    orchestrator: Orchestrator,
}

struct Setup {
    generators: Vec<Arc<dyn ScriptGenerator>>,
    synthesizer: Arc<MockSynthesizer>,
    uploader: Arc<MockUploader>,
    limits: Vec<(&'static str, u64)>,
    history: Vec<ProductionRecord>,
    themes: Vec<&'static str>,
    quota: Option<Arc<QuotaTracker>>,
    reject_appends: bool,
}

impl Setup {
    fn new() -> Self {
        Self {
            generators: Vec::new(),
            synthesizer: Arc::new(MockSynthesizer::new_success("google_tts", 42.0)),
            uploader: Arc::new(MockUploader::new_success("youtube")),
            limits: Vec::new(),
            history: Vec::new(),
            themes: vec!["patience", "gratitude"],
            quota: None,
            reject_appends: false,
        }
    }

    fn generators(mut self, generators: Vec<Arc<dyn ScriptGenerator>>) -> Self {
        self.generators = generators;
        self
    }

    fn synthesizer(mut self, synthesizer: MockSynthesizer) -> Self {
        self.synthesizer = Arc::new(synthesizer);
        self
    }

    fn uploader(mut self, uploader: MockUploader) -> Self {
        self.uploader = Arc::new(uploader);
        self
    }

    fn limit(mut self, provider: &'static str, limit: u64) -> Self {
        self.limits.push((provider, limit));
        self
    }

    fn history(mut self, records: Vec<ProductionRecord>) -> Self {
        self.history = records;
        self
    }

    fn themes(mut self, themes: Vec<&'static str>) -> Self {
        self.themes = themes;
        self
    }

    fn quota(mut self, quota: QuotaTracker) -> Self {
        self.quota = Some(Arc::new(quota));
        self
    }

    fn reject_appends(mut self) -> Self {
        self.reject_appends = true;
        self
    }

    fn build(self) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = PipelineConfig::default().rooted_at(dir.path());

        let generator = Arc::new(MockScriptGenerator::new_success(
            "openai",
            sample_script("prophets", "patience"),
        ));
        let generators = if self.generators.is_empty() {
            vec![generator.clone() as Arc<dyn ScriptGenerator>]
        } else {
            self.generators
        };

        let limits: BTreeMap<String, QuotaLimit> = self
            .limits
            .iter()
            .map(|(p, l)| (p.to_string(), QuotaLimit::new(Period::Daily, *l)))
            .collect();
        let quota = self
            .quota
            .unwrap_or_else(|| Arc::new(QuotaTracker::in_memory(limits, Arc::new(SystemClock))));
        let executor = StageExecutor::new(quota.clone(), RetryPolicy::new(3, 1, 5, false), Pacer::unlimited());

        let footage: Arc<dyn FootageSource> = Arc::new(MockFootageSource::new_success("pexels", 3));
        let composer: Arc<dyn VideoComposer> = Arc::new(MockComposer::new_success("ffmpeg"));
        let synthesizer: Arc<dyn SpeechSynthesizer> = self.synthesizer.clone();
        let uploader: Arc<dyn Uploader> = self.uploader.clone();

        let stages = StageSet {
            script: ScriptStage::new(generators, 60),
            audio: AudioStage::new(vec![synthesizer], pipeline.work_dir()),
            footage: FootageStage::new(
                vec![footage],
                Arc::new(KeywordSafetyPolicy::default()),
                SafetyMode::Strict,
                5.0,
                5,
            ),
            compose: ComposeStage::new(vec![composer], pipeline.output_dir()),
            upload: UploadStage::new(vec![uploader], UploadTemplate::default(), 1),
        };

        let history = Arc::new(InMemoryHistoryStore::with_records(self.history));
        let rejecting = Arc::new(AtomicBool::new(self.reject_appends));
        let store: Arc<dyn HistoryStore> = if self.reject_appends {
            Arc::new(RejectingHistory {
                inner: history.clone(),
                rejecting: rejecting.clone(),
            })
        } else {
            history.clone()
        };
        let content = ContentConfig::new(
            vec!["prophets".to_string(), "moral_lessons".to_string()],
            self.themes.iter().map(|t| t.to_string()).collect(),
            60,
        );
        let orchestrator = OrchestratorBuilder::default()
            .content(content)
            .pipeline(pipeline.clone())
            .executor(executor)
            .stages(stages)
            .history(store)
            .checkpoints(CheckpointStore::new(pipeline.checkpoint_dir()))
            .duplicates(Arc::new(ThemeSimilarityPolicy::new(0.6)))
            .build()
            .expect("orchestrator");

        Fixture {
            _dir: dir,
            rejecting,
            pipeline,
            history,
            quota,
            generator,
            synthesizer: self.synthesizer,
            uploader: self.uploader,
            orchestrator,
        }
    }
}

fn request(topic: &str, theme: &str, upload: bool) -> reelwright_core::ProductionRequest {
    ProductionRequestBuilder::default()
        .topic(topic.parse::<TopicSelection>().expect("topic"))
        .theme(Some(theme.to_string()))
        .upload_enabled(upload)
        .build()
        .expect("request")
}

fn past_success(category: &str, theme: &str, fingerprint: Option<Fingerprint>) -> ProductionRecord {
    let mut record = ProductionRecord::new(RecordId::new(), None, TopicCategory::new(category), theme, Utc::now());
    if let Some(fingerprint) = fingerprint {
        record.set_script("earlier", fingerprint).expect("open");
    }
    record.finalize_success(Utc::now()).expect("open");
    record
}

fn stage_status(record: &ProductionRecord, kind: StageKind) -> StageStatus {
    *record.stage(kind).expect("stage present").status()
}

#[tokio::test]
async fn test_produce_uploads_once() {
    let f = Setup::new().limit("youtube", 6).build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert_eq!(*record.status(), RecordStatus::Success);
    assert_eq!(*record.state(), PipelineState::Uploaded);
    assert!(record.upload_id().is_some());
    assert!(record.script_fingerprint().is_some());
    for kind in [StageKind::Script, StageKind::Audio, StageKind::Footage, StageKind::Compose, StageKind::Upload] {
        assert_eq!(stage_status(&record, kind), StageStatus::Success, "{}", kind);
    }

    assert_eq!(f.uploader.call_count(), 1);
    assert_eq!(f.quota.remaining("youtube").await, Some(5));
    let history = f.history.snapshot().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0], record);
    assert!(f.orchestrator.pending().await.expect("checkpoints").is_empty());
}

#[tokio::test]
async fn test_zero_upload_quota_fails_before_upload() {
    let f = Setup::new().limit("youtube", 0).build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert_eq!(*record.status(), RecordStatus::Failed);
    assert_eq!(*record.state(), PipelineState::Composed);
    assert_eq!(record.failure_kind(), Some(FailureKind::QuotaExceeded));
    assert_eq!(stage_status(&record, StageKind::Compose), StageStatus::Success);
    let upload = record.stage(StageKind::Upload).expect("upload");
    assert_eq!(*upload.status(), StageStatus::Failed);
    assert_eq!(*upload.attempts(), 0);
    assert_eq!(f.uploader.call_count(), 0);
    assert!(record.upload_id().is_none());
}

#[tokio::test]
async fn test_duplicate_theme_is_reselected_once() {
    let earlier = past_success("prophets", "patience", None);
    let f = Setup::new().history(vec![earlier]).build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert!(record.is_success());
    assert_eq!(record.theme(), "gratitude");
    assert_eq!(
        f.generator.requests(),
        vec![(TopicCategory::new("prophets"), "gratitude".to_string())]
    );
}

#[tokio::test]
async fn test_duplicate_without_alternative_is_conflict() {
    let earlier = past_success("prophets", "patience", None);
    let f = Setup::new().history(vec![earlier]).themes(vec!["patience"]).build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert_eq!(record.failure_kind(), Some(FailureKind::Conflict));
    assert_eq!(*record.state(), PipelineState::Created);
    assert_eq!(f.generator.call_count(), 0);
    assert_eq!(stage_status(&record, StageKind::Script), StageStatus::Skipped);
    assert_eq!(stage_status(&record, StageKind::Upload), StageStatus::Skipped);
    assert_eq!(f.history.snapshot().await.len(), 2);
}

#[tokio::test]
async fn test_repeated_script_is_conflict() {
    let script = sample_script("prophets", "patience");
    let earlier = past_success("moral_lessons", "honesty", Some(Fingerprint::of(script.text())));
    let f = Setup::new().history(vec![earlier]).build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert_eq!(record.failure_kind(), Some(FailureKind::Conflict));
    assert_eq!(record.failure().as_ref().and_then(|f| *f.stage()), Some(StageKind::Script));
    assert_eq!(f.synthesizer.call_count(), 0);
    assert_eq!(stage_status(&record, StageKind::Audio), StageStatus::Skipped);
}

#[tokio::test]
async fn test_dry_run_skips_upload() {
    let f = Setup::new().build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", false), &CancellationToken::new())
        .await
        .expect("produce");

    assert!(record.is_success());
    assert_eq!(*record.state(), PipelineState::SkippedUpload);
    assert_eq!(stage_status(&record, StageKind::Upload), StageStatus::Skipped);
    assert!(record.upload_id().is_none());
    assert!(record.artifact_path().is_some());
    assert_eq!(f.uploader.call_count(), 0);
}

#[tokio::test]
async fn test_publish_uploads_dry_run_once() {
    let f = Setup::new().build();
    let cancel = CancellationToken::new();
    let dry = f
        .orchestrator
        .produce(&request("prophets", "patience", false), &cancel)
        .await
        .expect("produce");

    let published = f.orchestrator.publish(dry.id(), &cancel).await.expect("publish");
    assert!(published.is_success());
    assert_eq!(published.retry_of().as_ref(), Some(dry.id()));
    assert_eq!(*published.state(), PipelineState::Uploaded);
    assert!(published.upload_id().is_some());
    assert_eq!(published.title(), dry.title());
    assert_eq!(stage_status(&published, StageKind::Script), StageStatus::Skipped);
    assert_eq!(f.uploader.metadata()[0].title(), "A story of patience");

    let again = f.orchestrator.publish(dry.id(), &cancel).await.expect("publish again");
    assert_eq!(again.id(), published.id());
    assert_eq!(again.upload_id(), published.upload_id());
    assert_eq!(f.uploader.call_count(), 1);

    let direct = f.orchestrator.publish(published.id(), &cancel).await.expect("already published");
    assert_eq!(direct.id(), published.id());
    assert_eq!(f.history.snapshot().await.len(), 2);
}

#[tokio::test]
async fn test_publish_refuses_failed_records() {
    let f = Setup::new().limit("youtube", 0).build();
    let cancel = CancellationToken::new();
    let failed = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &cancel)
        .await
        .expect("produce");

    let err = f.orchestrator.publish(failed.id(), &cancel).await.expect_err("not a dry run");
    assert!(err.is_usage());
    let err = f.orchestrator.publish(&RecordId::new(), &cancel).await.expect_err("unknown");
    assert!(err.is_usage());
}

#[tokio::test]
async fn test_resume_with_token_finds_earlier_upload() {
    let f = Setup::new().build();
    let script = sample_script("prophets", "patience");
    let video = VideoHandle::new(f.pipeline.output_dir().join("x.mp4"), 42.0);

    let mut record = ProductionRecord::new(RecordId::new(), None, TopicCategory::new("prophets"), "patience", Utc::now());
    for kind in [StageKind::Script, StageKind::Audio, StageKind::Footage, StageKind::Compose] {
        record.complete_stage(kind, StageReport::success(1, None)).expect("open");
    }
    let token = IdempotencyToken::for_record(record.id());
    record.set_idempotency_token(token.clone()).expect("open");

    // The platform received the upload but the process died before recording it.
    let published = f
        .uploader
        .upload(&video, &UploadTemplate::default().render(&script), &token)
        .await
        .expect("upload");

    let artifacts = ArtifactSet {
        script: Some(script),
        video: Some(video),
        ..ArtifactSet::default()
    };
    CheckpointStore::new(f.pipeline.checkpoint_dir())
        .save(&Checkpoint::new(record.clone(), artifacts))
        .await
        .expect("checkpoint");

    let resumed = f
        .orchestrator
        .resume(record.id(), &CancellationToken::new())
        .await
        .expect("resume");

    assert!(resumed.is_success());
    assert_eq!(resumed.upload_id().as_ref(), Some(&published));
    assert_eq!(f.uploader.call_count(), 1);
    assert_eq!(f.uploader.published_count(), 1);
    assert!(f.orchestrator.pending().await.expect("checkpoints").is_empty());

    let err = f
        .orchestrator
        .resume(record.id(), &CancellationToken::new())
        .await
        .expect_err("finalized");
    assert!(err.is_usage());
}

#[tokio::test]
async fn test_resume_continues_from_last_stage() {
    let f = Setup::new().build();
    let mut record = ProductionRecord::new(RecordId::new(), None, TopicCategory::new("prophets"), "patience", Utc::now());
    record.complete_stage(StageKind::Script, StageReport::success(1, None)).expect("open");
    let artifacts = ArtifactSet {
        script: Some(sample_script("prophets", "patience")),
        ..ArtifactSet::default()
    };
    CheckpointStore::new(f.pipeline.checkpoint_dir())
        .save(&Checkpoint::new(record.clone(), artifacts).with_upload_enabled(false))
        .await
        .expect("checkpoint");

    let resumed = f
        .orchestrator
        .resume(record.id(), &CancellationToken::new())
        .await
        .expect("resume");

    assert_eq!(*resumed.state(), PipelineState::SkippedUpload);
    assert_eq!(f.generator.call_count(), 0);
    assert_eq!(f.synthesizer.call_count(), 1);
    assert_eq!(f.uploader.call_count(), 0);
}

#[tokio::test]
async fn test_resume_unknown_id_is_input_error() {
    let f = Setup::new().build();
    let err = f
        .orchestrator
        .resume(&RecordId::new(), &CancellationToken::new())
        .await
        .expect_err("unknown");
    assert!(err.is_usage());
}

#[tokio::test]
async fn test_lost_upload_response_publishes_once() {
    let f = Setup::new()
        .uploader(MockUploader::new_success("youtube").losing_responses(1))
        .build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert!(record.is_success());
    assert_eq!(*record.stage(StageKind::Upload).expect("upload").attempts(), 2);
    assert_eq!(f.uploader.call_count(), 1);
    assert_eq!(f.uploader.published_count(), 1);
}

#[tokio::test]
async fn test_cancelled_production_runs_no_stage() {
    let f = Setup::new().build();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &cancel)
        .await
        .expect("produce");

    assert_eq!(record.failure_kind(), Some(FailureKind::Cancelled));
    assert_eq!(f.generator.call_count(), 0);
    assert_eq!(f.history.snapshot().await.len(), 1);
}

#[tokio::test]
async fn test_fallback_after_terminal_error() {
    let primary = Arc::new(MockScriptGenerator::new_with_behavior(
        "openai",
        MockBehavior::Error(StageErrorKind::Terminal("HTTP 401".to_string())),
    ));
    let secondary = Arc::new(MockScriptGenerator::new_success(
        "anthropic",
        sample_script("prophets", "patience"),
    ));
    let f = Setup::new()
        .generators(vec![primary.clone() as Arc<dyn ScriptGenerator>, secondary.clone()])
        .build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert!(record.is_success());
    let script = record.stage(StageKind::Script).expect("script");
    assert_eq!(*script.attempts(), 2);
    assert_eq!(script.provider().as_deref(), Some("anthropic"));
    assert_eq!(
        script.error().as_ref().map(|e| *e.kind()),
        Some(FailureKind::Terminal)
    );
    assert_eq!(primary.call_count(), 1);
    assert_eq!(secondary.call_count(), 1);
}

#[tokio::test]
async fn test_no_fallback_after_quota_refusal() {
    let primary = Arc::new(MockScriptGenerator::new_success("openai", sample_script("prophets", "patience")));
    let secondary = Arc::new(MockScriptGenerator::new_success(
        "anthropic",
        sample_script("prophets", "patience"),
    ));
    let f = Setup::new()
        .generators(vec![primary.clone() as Arc<dyn ScriptGenerator>, secondary.clone()])
        .limit("openai", 0)
        .build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert_eq!(record.failure_kind(), Some(FailureKind::QuotaExceeded));
    assert_eq!(primary.call_count(), 0);
    assert_eq!(secondary.call_count(), 0);
}

#[tokio::test]
async fn test_exhausted_retries_skip_later_stages() {
    let f = Setup::new()
        .synthesizer(MockSynthesizer::new_with_behavior(
            "google_tts",
            MockBehavior::Error(StageErrorKind::Transient("HTTP 503".to_string())),
        ))
        .build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert_eq!(record.failure_kind(), Some(FailureKind::Transient));
    assert_eq!(*record.state(), PipelineState::ScriptReady);
    let failure = record.failure().as_ref().expect("failure");
    assert_eq!(*failure.stage(), Some(StageKind::Audio));
    assert_eq!(*failure.attempts(), 3);
    assert_eq!(stage_status(&record, StageKind::Script), StageStatus::Success);
    assert_eq!(stage_status(&record, StageKind::Audio), StageStatus::Failed);
    for kind in [StageKind::Footage, StageKind::Compose, StageKind::Upload] {
        assert_eq!(stage_status(&record, kind), StageStatus::Skipped, "{}", kind);
    }
}

#[tokio::test]
async fn test_unknown_category_is_input_error() {
    let f = Setup::new().build();
    let err = f
        .orchestrator
        .produce(&request("astronomy", "stars", true), &CancellationToken::new())
        .await
        .expect_err("unknown category");
    assert!(err.is_usage());
    assert!(f.history.recent_records(10).await.expect("history").is_empty());
}

#[tokio::test]
async fn test_upload_guard_is_cleared_after_each_production() {
    let f = Setup::new().themes(vec!["patience"]).build();

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("produce");

    assert!(record.upload_id().is_some());
    assert_eq!(f.orchestrator.stages().upload.unsettled(), 0);
}

#[tokio::test]
async fn test_history_append_failure_keeps_checkpoint() {
    let f = Setup::new().reject_appends().build();
    let cancel = CancellationToken::new();

    let err = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &cancel)
        .await
        .expect_err("append refused");
    assert!(!err.is_usage());
    assert!(!err.is_quota_exceeded());
    assert_eq!(f.uploader.published_count(), 1);

    let pending = f.orchestrator.pending().await.expect("checkpoints");
    assert_eq!(pending.len(), 1);
    let checkpoint = &pending[0];
    assert_eq!(*checkpoint.record().state(), PipelineState::Uploaded);
    assert!(checkpoint.record().upload_id().is_some());
    let id = *checkpoint.record().id();

    // Once storage recovers the production finalizes without a second upload.
    f.rejecting.store(false, Ordering::SeqCst);
    let record = f.orchestrator.resume(&id, &cancel).await.expect("resume");
    assert_eq!(*record.status(), RecordStatus::Success);
    assert_eq!(f.uploader.call_count(), 1);
    assert_eq!(f.history.recent_records(10).await.expect("history").len(), 1);
    assert!(f.orchestrator.pending().await.expect("checkpoints").is_empty());
}

#[tokio::test]
async fn test_unwritable_checkpoint_dir_is_storage_failure() {
    let f = Setup::new().build();
    let checkpoint_dir = f.pipeline.checkpoint_dir();
    std::fs::create_dir_all(checkpoint_dir.parent().expect("parent")).expect("mkdir");
    std::fs::write(checkpoint_dir, b"not a directory").expect("block checkpoint dir");

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("finalized");

    assert_eq!(*record.status(), RecordStatus::Failed);
    assert_eq!(record.failure_kind(), Some(FailureKind::StorageFailure));
    assert_eq!(*record.state(), PipelineState::ScriptReady);
    assert_eq!(f.synthesizer.call_count(), 0);
    assert_eq!(f.uploader.call_count(), 0);
    assert_eq!(f.history.recent_records(10).await.expect("history").len(), 1);
}

#[tokio::test]
async fn test_ledger_write_failure_keeps_upload_id() {
    let ledger = tempfile::tempdir().expect("tempdir");
    let limits = BTreeMap::from([("youtube".to_string(), QuotaLimit::new(Period::Daily, 6))]);
    let quota = QuotaTracker::open(
        ledger.path().join("ledger").join("quota.json"),
        limits,
        Arc::new(SystemClock),
    )
    .await
    .expect("open ledger");
    let f = Setup::new().quota(quota).build();
    std::fs::write(ledger.path().join("ledger"), b"not a directory").expect("block ledger dir");

    let record = f
        .orchestrator
        .produce(&request("prophets", "patience", true), &CancellationToken::new())
        .await
        .expect("finalized");

    assert_eq!(f.uploader.published_count(), 1);
    assert_eq!(*record.status(), RecordStatus::Failed);
    assert_eq!(record.failure_kind(), Some(FailureKind::StorageFailure));
    assert_eq!(*record.state(), PipelineState::Uploaded);
    assert!(record.upload_id().is_some());
    assert_eq!(stage_status(&record, StageKind::Upload), StageStatus::Success);

    let stored = f
        .history
        .get(record.id())
        .await
        .expect("history")
        .expect("record appended");
    assert_eq!(stored.upload_id(), record.upload_id());
    assert!(f.orchestrator.pending().await.expect("checkpoints").is_empty());
}

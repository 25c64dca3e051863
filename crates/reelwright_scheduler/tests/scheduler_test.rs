use chrono::{Duration, TimeZone, Utc, Weekday};
use reelwright_core::{
    ContentIdea, FailureKind, ManualClock, ProductionRecord, ProductionRequestBuilder, RecordId,
    SystemClock, TopicCategory, TopicSelection, UploadTemplate,
};
use reelwright_error::{ReelwrightResult, StageErrorKind, StorageError, StorageErrorKind};
use reelwright_history::{
    CheckpointStore, ContentQueue, HistoryStore, InMemoryHistoryStore, ThemeSimilarityPolicy,
};
use reelwright_pipeline::{ContentConfig, Orchestrator, OrchestratorBuilder, PipelineConfig, StageSet};
use reelwright_quota::{Period, QuotaLimit, QuotaTracker};
use reelwright_scheduler::{
    Schedule, ScheduleType, Scheduler, SchedulerConfig, StopReason, TrendRefresher, TrendsConfig,
};
use reelwright_stages::testing::{
    MockBehavior, MockComposer, MockFootageSource, MockIdeaGenerator, MockResponse,
    MockScriptGenerator, MockSynthesizer, MockTrendSource, MockUploader, sample_script,
};
use reelwright_stages::{
    AudioStage, ComposeStage, FootageSource, FootageStage, IdeaGenerator, KeywordSafetyPolicy,
    Pacer, RetryPolicy, SafetyMode, ScriptGenerator, ScriptStage, SpeechSynthesizer,
    StageExecutor, TrendSource, UploadStage, Uploader, VideoComposer,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const THEMES: [&str; 8] = [
    "faith",
    "patience",
    "gratitude",
    "honesty",
    "kindness",
    "forgiveness",
    "perseverance",
    "humility",
];

struct Fixture {
    dir: tempfile::TempDir,
    history: Arc<InMemoryHistoryStore>,
    uploader: Arc<MockUploader>,
    orchestrator: Arc<Orchestrator>,
    scheduler: Scheduler,
}

/// History that cannot write, and optionally cannot read either.
struct FailingHistory {
    inner: Arc<InMemoryHistoryStore>,
    fail_reads: bool,
}

#[async_trait::async_trait]
impl HistoryStore for FailingHistory {
    async fn append(&self, _record: &ProductionRecord) -> ReelwrightResult<RecordId> {
        Err(StorageError::new(StorageErrorKind::FileWrite("history.jsonl: read-only file system".to_string())).into())
    }

    async fn recent_records(&self, limit: usize) -> ReelwrightResult<Vec<ProductionRecord>> {
        if self.fail_reads {
            return Err(StorageError::new(StorageErrorKind::FileRead("history.jsonl: input/output error".to_string())).into());
        }
        self.inner.recent_records(limit).await
    }
}

fn fixture(
    config: SchedulerConfig,
    synthesizer: MockSynthesizer,
    upload_limit: Option<u64>,
    past: Vec<ProductionRecord>,
) -> Fixture {
    fixture_with_store(config, synthesizer, upload_limit, past, |history| {
        history as Arc<dyn HistoryStore>
    })
}

fn fixture_with_store<F>(
    config: SchedulerConfig,
    synthesizer: MockSynthesizer,
    upload_limit: Option<u64>,
    past: Vec<ProductionRecord>,
    store: F,
) -> Fixture
where
    F: FnOnce(Arc<InMemoryHistoryStore>) -> Arc<dyn HistoryStore>,
{
    let dir = tempfile::tempdir().expect("tempdir");
    let pipeline = PipelineConfig::default().rooted_at(dir.path());

    // Distinct scripts so repeated productions never share a fingerprint.
    let scripts = THEMES
        .iter()
        .map(|theme| MockResponse::Success(sample_script("prophets", theme)))
        .collect();
    let generator: Arc<dyn ScriptGenerator> = Arc::new(MockScriptGenerator::new_with_behavior(
        "openai",
        MockBehavior::Sequence(scripts),
    ));

    let limits: BTreeMap<String, QuotaLimit> = upload_limit
        .into_iter()
        .map(|l| ("youtube".to_string(), QuotaLimit::new(Period::Daily, l)))
        .collect();
    let quota = Arc::new(QuotaTracker::in_memory(limits, Arc::new(SystemClock)));
    let executor = StageExecutor::new(quota, RetryPolicy::new(2, 1, 5, false), Pacer::unlimited());

    let uploader = Arc::new(MockUploader::new_success("youtube"));
    let synthesizer: Arc<dyn SpeechSynthesizer> = Arc::new(synthesizer);
    let footage: Arc<dyn FootageSource> = Arc::new(MockFootageSource::new_success("pexels", 3));
    let composer: Arc<dyn VideoComposer> = Arc::new(MockComposer::new_success("ffmpeg"));

    let stages = StageSet {
        script: ScriptStage::new(vec![generator], 60),
        audio: AudioStage::new(vec![synthesizer], pipeline.work_dir()),
        footage: FootageStage::new(
            vec![footage],
            Arc::new(KeywordSafetyPolicy::default()),
            SafetyMode::Strict,
            5.0,
            5,
        ),
        compose: ComposeStage::new(vec![composer], pipeline.output_dir()),
        upload: UploadStage::new(
            vec![uploader.clone() as Arc<dyn Uploader>],
            UploadTemplate::default(),
            1,
        ),
    };

    let history = Arc::new(InMemoryHistoryStore::with_records(past));
    let orchestrator = OrchestratorBuilder::default()
        .content(ContentConfig::new(
            vec!["prophets".to_string()],
            THEMES.iter().map(|t| t.to_string()).collect(),
            60,
        ))
        .pipeline(pipeline.clone())
        .executor(executor)
        .stages(stages)
        .history(store(history.clone()))
        .checkpoints(CheckpointStore::new(pipeline.checkpoint_dir()))
        .duplicates(Arc::new(ThemeSimilarityPolicy::new(0.6)))
        .build()
        .expect("orchestrator");

    let orchestrator = Arc::new(orchestrator);
    Fixture {
        dir,
        history,
        uploader,
        orchestrator: orchestrator.clone(),
        scheduler: Scheduler::new(orchestrator, config),
    }
}

fn healthy(config: SchedulerConfig) -> Fixture {
    fixture(config, MockSynthesizer::new_success("google_tts", 42.0), None, Vec::new())
}

fn success_today(theme: &str) -> ProductionRecord {
    let mut record = ProductionRecord::new(
        RecordId::new(),
        None,
        TopicCategory::new("sahaba"),
        theme,
        Utc::now(),
    );
    record.finalize_success(Utc::now()).expect("open");
    record
}

fn config(max_per_day: usize) -> SchedulerConfig {
    SchedulerConfig::new(max_per_day, 1, ScheduleType::Interval { seconds: 1 })
}

#[tokio::test]
async fn test_batch_runs_sequential_productions() {
    let f = healthy(config(5));

    let report = f
        .scheduler
        .run_batch(2, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(report.records().len(), 2);
    assert_eq!(report.successes(), 2);
    assert_eq!(report.stopped(), &None);
    assert_eq!(f.uploader.published_count(), 2);
    assert_eq!(f.history.recent_records(10).await.expect("history").len(), 2);
}

#[tokio::test]
async fn test_batch_stops_at_daily_ceiling() {
    let f = healthy(config(2));

    let report = f
        .scheduler
        .run_batch(5, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(report.successes(), 2);
    assert_eq!(report.records().len(), 2);
    assert_eq!(report.stopped(), &Some(StopReason::DailyCeiling { max: 2 }));
}

#[tokio::test]
async fn test_ceiling_counts_earlier_successes_today() {
    let f = fixture(
        config(2),
        MockSynthesizer::new_success("google_tts", 42.0),
        None,
        vec![success_today("courage"), success_today("mercy")],
    );

    let report = f
        .scheduler
        .run_batch(1, &CancellationToken::new())
        .await
        .expect("batch");

    assert!(report.records().is_empty());
    assert_eq!(report.stopped(), &Some(StopReason::DailyCeiling { max: 2 }));
}

#[tokio::test]
async fn test_ceiling_resets_on_a_new_day() {
    let f = fixture(
        config(2),
        MockSynthesizer::new_success("google_tts", 42.0),
        None,
        vec![success_today("courage"), success_today("mercy")],
    );
    let tomorrow = ManualClock::new(Utc::now() + Duration::days(1));
    let scheduler = f.scheduler.with_clock(Arc::new(tomorrow));

    let report = scheduler
        .run_batch(1, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(report.records().len(), 1);
    assert_eq!(report.stopped(), &None);
}

#[tokio::test]
async fn test_quota_exhaustion_ends_batch() {
    let f = fixture(
        config(5),
        MockSynthesizer::new_success("google_tts", 42.0),
        Some(0),
        Vec::new(),
    );

    let report = f
        .scheduler
        .run_batch(3, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(report.records().len(), 1);
    assert_eq!(report.records()[0].failure_kind(), Some(FailureKind::QuotaExceeded));
    assert_eq!(report.stopped(), &Some(StopReason::QuotaExceeded));
    assert_eq!(f.uploader.call_count(), 0);
}

#[tokio::test]
async fn test_failed_production_does_not_stop_batch() {
    let f = fixture(
        config(5),
        MockSynthesizer::new_with_behavior(
            "google_tts",
            MockBehavior::Error(StageErrorKind::Terminal("voice rejected".into())),
        ),
        None,
        Vec::new(),
    );

    let report = f
        .scheduler
        .run_batch(2, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(report.records().len(), 2);
    assert_eq!(report.successes(), 0);
    assert_eq!(report.stopped(), &None);
    for record in report.records() {
        assert_eq!(record.failure_kind(), Some(FailureKind::Terminal));
    }
}

#[tokio::test]
async fn test_cancelled_batch_runs_nothing() {
    let f = healthy(config(5));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = f.scheduler.run_batch(3, &cancel).await.expect("batch");

    assert!(report.records().is_empty());
    assert_eq!(report.stopped(), &Some(StopReason::Cancelled));
}

#[tokio::test]
async fn test_periodic_runs_until_cancelled() {
    let f = healthy(config(5));
    let scheduler = Arc::new(f.scheduler);
    let history = f.history.clone();
    let cancel = CancellationToken::new();

    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let produced = history.recent_records(10).await.expect("history").len();
                if produced >= 1 {
                    cancel.cancel();
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            }
        })
    };

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        scheduler.run_periodic(&ScheduleType::Interval { seconds: 1 }, 1, &cancel),
    )
    .await
    .expect("stopped after cancellation");
    outcome.expect("periodic run");
    watcher.await.expect("watcher");

    assert_eq!(f.history.recent_records(10).await.expect("history").len(), 1);
}

#[tokio::test]
async fn test_periodic_rejects_invalid_schedule() {
    let f = healthy(config(5));
    let err = f
        .scheduler
        .run_periodic(
            &ScheduleType::Cron {
                expression: "every tuesday".to_string(),
            },
            1,
            &CancellationToken::new(),
        )
        .await
        .expect_err("invalid cron");
    assert!(err.is_usage());
}

#[test]
fn test_daily_schedule_next_run() {
    let schedule = ScheduleType::Daily {
        at: "09:00".to_string(),
    };
    let before = Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap();
    assert_eq!(
        schedule.next_execution(before),
        Some(Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap())
    );

    let exactly = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
    assert_eq!(
        schedule.next_execution(exactly),
        Some(Utc.with_ymd_and_hms(2026, 5, 5, 9, 0, 0).unwrap())
    );
}

#[test]
fn test_weekly_schedule_next_run() {
    let schedule = ScheduleType::Weekly {
        weekday: Weekday::Sun,
        at: "18:30".to_string(),
    };
    // 2026-05-04 is a Monday.
    let monday = Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap();
    assert_eq!(
        schedule.next_execution(monday),
        Some(Utc.with_ymd_and_hms(2026, 5, 10, 18, 30, 0).unwrap())
    );

    let sunday_evening = Utc.with_ymd_and_hms(2026, 5, 10, 19, 0, 0).unwrap();
    assert_eq!(
        schedule.next_execution(sunday_evening),
        Some(Utc.with_ymd_and_hms(2026, 5, 17, 18, 30, 0).unwrap())
    );
}

#[test]
fn test_interval_and_cron_schedules() {
    let now = Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap();
    assert_eq!(
        ScheduleType::Interval { seconds: 90 }.next_execution(now),
        Some(now + Duration::seconds(90))
    );

    let cron = ScheduleType::Cron {
        expression: "0 15 10 * * *".to_string(),
    };
    assert_eq!(
        cron.next_execution(now),
        Some(Utc.with_ymd_and_hms(2026, 5, 4, 10, 15, 0).unwrap())
    );
}

#[test]
fn test_schedule_validation() {
    assert!(ScheduleType::default().validate().is_ok());
    assert!(ScheduleType::Daily { at: "25:00".to_string() }.validate().is_err());
    assert!(ScheduleType::Interval { seconds: 0 }.validate().is_err());
    assert!(SchedulerConfig::new(3, 0, ScheduleType::default()).validate().is_err());
}

#[test]
fn test_schedule_config_from_toml_shape() {
    let config: SchedulerConfig = serde_json::from_value(serde_json::json!({
        "max_per_day": 2,
        "schedule": {"type": "weekly", "weekday": "Sunday", "at": "09:00"}
    }))
    .expect("config");
    assert_eq!(*config.max_per_day(), 2);
    assert_eq!(*config.batch_size(), 1);
    assert_eq!(
        config.schedule(),
        &ScheduleType::Weekly {
            weekday: Weekday::Sun,
            at: "09:00".to_string()
        }
    );
}

fn failing_history(fail_reads: bool) -> Fixture {
    fixture_with_store(
        config(5),
        MockSynthesizer::new_success("google_tts", 42.0),
        None,
        Vec::new(),
        move |inner| Arc::new(FailingHistory { inner, fail_reads }) as Arc<dyn HistoryStore>,
    )
}

#[tokio::test]
async fn test_unreadable_history_stops_batch() {
    let f = failing_history(true);

    let report = f
        .scheduler
        .run_batch(3, &CancellationToken::new())
        .await
        .expect("batch report");

    assert!(report.records().is_empty());
    assert!(matches!(report.stopped(), Some(StopReason::StorageFailure(_))));
    assert_eq!(f.uploader.call_count(), 0);
}

#[tokio::test]
async fn test_history_append_failure_stops_batch() {
    let f = failing_history(false);

    let report = f
        .scheduler
        .run_batch(3, &CancellationToken::new())
        .await
        .expect("batch report");

    assert!(report.records().is_empty());
    assert!(matches!(report.stopped(), Some(StopReason::StorageFailure(_))));
    // Only the first production ran.
    assert_eq!(f.uploader.published_count(), 1);
}

#[tokio::test]
async fn test_periodic_run_ends_on_storage_failure() {
    let f = failing_history(true);

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(10),
        f.scheduler
            .run_periodic(&ScheduleType::Interval { seconds: 1 }, 1, &CancellationToken::new()),
    )
    .await
    .expect("stopped on its own");

    let err = outcome.expect_err("storage failure");
    assert!(!err.is_usage());
    assert_eq!(f.uploader.call_count(), 0);
}

fn refresher_for(
    f: &Fixture,
    source: Option<Arc<dyn TrendSource>>,
    generators: Vec<Arc<dyn IdeaGenerator>>,
) -> TrendRefresher {
    let config = TrendsConfig::new(
        vec!["stories".to_string()],
        vec!["Patience in Islam".to_string(), "Importance of Prayer".to_string()],
        3,
        "content_queue.json",
    )
    .rooted_at(f.dir.path());
    let queue = Arc::new(ContentQueue::new(config.queue_path()));
    TrendRefresher::new(f.orchestrator.clone(), queue, config)
        .with_source(source)
        .with_generators(generators)
}

#[tokio::test]
async fn test_batch_takes_queued_ideas_first() {
    let f = healthy(config(5));
    let queue = Arc::new(ContentQueue::new(f.dir.path().join("content_queue.json")));
    queue
        .extend(vec![
            ContentIdea::new(TopicCategory::new("prophets"), "Story of Yusuf"),
            ContentIdea::new(TopicCategory::new("sahaba"), "honesty"),
        ])
        .await
        .expect("queue");
    let scheduler = f.scheduler.with_queue(queue.clone());

    let report = scheduler
        .run_batch(2, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(report.successes(), 2);
    assert_eq!(report.records()[0].theme(), "Story of Yusuf");
    // The sahaba idea is not producible here, so the second run picks a configured theme.
    assert!(THEMES.contains(&report.records()[1].theme().as_str()));
    assert!(queue.ideas().await.expect("queue").is_empty());
}

#[tokio::test]
async fn test_named_request_leaves_queue_alone() {
    let f = healthy(config(5));
    let queue = Arc::new(ContentQueue::new(f.dir.path().join("content_queue.json")));
    queue
        .extend(vec![ContentIdea::new(TopicCategory::new("prophets"), "Story of Yusuf")])
        .await
        .expect("queue");
    let request = ProductionRequestBuilder::default()
        .topic(TopicSelection::Named(TopicCategory::new("prophets")))
        .theme(Some("faith".to_string()))
        .build()
        .expect("request");
    let scheduler = f.scheduler.with_queue(queue.clone()).with_request(request);

    let report = scheduler
        .run_batch(1, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(report.records()[0].theme(), "faith");
    assert_eq!(queue.ideas().await.expect("queue").len(), 1);
}

#[tokio::test]
async fn test_unreadable_queue_stops_batch() {
    let f = healthy(config(5));
    std::fs::write(f.dir.path().join("blocked"), "not a directory").expect("write");
    let queue = Arc::new(ContentQueue::new(f.dir.path().join("blocked").join("queue.json")));
    let scheduler = f.scheduler.with_queue(queue);

    let report = scheduler
        .run_batch(2, &CancellationToken::new())
        .await
        .expect("batch");

    assert!(report.records().is_empty());
    assert!(matches!(report.stopped(), Some(StopReason::StorageFailure(_))));
    assert_eq!(f.uploader.published_count(), 0);
}

#[tokio::test]
async fn test_refresh_queues_ideas_from_live_trends() {
    let f = healthy(config(5));
    let source = Arc::new(MockTrendSource::new_success(
        "youtube_trends",
        vec!["Story of Yusuf".to_string(), "Night prayer".to_string()],
    ));
    let generator = Arc::new(MockIdeaGenerator::new_success("openai"));
    let refresher = refresher_for(
        &f,
        Some(source.clone() as Arc<dyn TrendSource>),
        vec![generator.clone() as Arc<dyn IdeaGenerator>],
    );

    let report = refresher.refresh().await.expect("refresh");
    assert!(*report.live());
    assert_eq!(*report.trends(), 2);
    assert_eq!(*report.added(), 2);
    assert_eq!(*report.queued(), 2);
    assert_eq!(generator.trends()[0][0], "Story of Yusuf");

    // The same trends again add nothing new.
    let report = refresher.refresh().await.expect("refresh");
    assert_eq!(*report.added(), 0);
    assert_eq!(*report.queued(), 2);

    let ideas = refresher.queue().ideas().await.expect("queue");
    assert!(ideas.iter().all(|i| i.topic().as_str() == "prophets"));
}

#[tokio::test]
async fn test_refresh_falls_back_when_trend_source_fails() {
    let f = healthy(config(5));
    let source = Arc::new(MockTrendSource::new_with_behavior(
        "youtube_trends",
        MockBehavior::Error(StageErrorKind::Transient("503".to_string())),
    ));
    let generator = Arc::new(MockIdeaGenerator::new_success("openai"));
    let refresher = refresher_for(
        &f,
        Some(source.clone() as Arc<dyn TrendSource>),
        vec![generator.clone() as Arc<dyn IdeaGenerator>],
    );

    let report = refresher.refresh().await.expect("refresh");
    assert!(!*report.live());
    assert_eq!(*report.added(), 2);
    assert_eq!(source.call_count(), 2);
    assert_eq!(
        generator.trends()[0],
        vec!["Patience in Islam".to_string(), "Importance of Prayer".to_string()]
    );

    // No source at all behaves the same way.
    let offline = refresher.queue().clone();
    let report = TrendRefresher::new(f.orchestrator.clone(), offline, TrendsConfig::default())
        .with_generators(vec![generator.clone() as Arc<dyn IdeaGenerator>])
        .refresh()
        .await
        .expect("refresh");
    assert!(!*report.live());
}

#[tokio::test]
async fn test_refresh_falls_through_idea_generators() {
    let f = healthy(config(5));
    let failing = Arc::new(MockIdeaGenerator::new_with_behavior(
        "openai",
        MockBehavior::Error(StageErrorKind::Terminal("401".to_string())),
    ));
    let working = Arc::new(MockIdeaGenerator::new_success("anthropic"));
    let refresher = refresher_for(
        &f,
        None,
        vec![
            failing.clone() as Arc<dyn IdeaGenerator>,
            working.clone() as Arc<dyn IdeaGenerator>,
        ],
    );

    let report = refresher.refresh().await.expect("refresh");
    assert_eq!(*report.added(), 2);
    assert_eq!(failing.call_count(), 1);
    assert_eq!(working.call_count(), 1);
}

#[tokio::test]
async fn test_refresh_fails_when_no_generator_succeeds() {
    let f = healthy(config(5));
    let failing = Arc::new(MockIdeaGenerator::new_with_behavior(
        "openai",
        MockBehavior::Error(StageErrorKind::Terminal("401".to_string())),
    ));
    let refresher = refresher_for(&f, None, vec![failing as Arc<dyn IdeaGenerator>]);

    assert!(refresher.refresh().await.is_err());
    assert!(refresher.queue().ideas().await.expect("queue").is_empty());
    assert!(refresher.refresh().await.is_err());

    let none = refresher_for(&f, None, Vec::new());
    assert!(none.refresh().await.is_err());
}

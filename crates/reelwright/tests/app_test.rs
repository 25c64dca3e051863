use reelwright::{
    ExitStatus, FailureKind, PipelineState, ProductionRequest, ProductionRequestBuilder,
    ProviderSet, Reelwright, ReelwrightConfig, ReelwrightError, StageError, StopReason,
    TopicSelection,
};
use reelwright_stages::testing::{
    MockComposer, MockFootageSource, MockIdeaGenerator, MockScriptGenerator, MockSynthesizer,
    MockTrendSource, MockUploader, sample_script,
};
use reelwright_stages::{
    FootageSource, IdeaGenerator, ScriptGenerator, SpeechSynthesizer, TrendSource, Uploader,
    VideoComposer,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn config(root: &Path, overrides: &str) -> ReelwrightConfig {
    let base = r#"
[retry]
max_attempts = 2
base_delay_ms = 1
max_delay_ms = 5
jitter = false
"#;
    ReelwrightConfig::from_toml_str(&format!("{}\n{}", base, overrides))
        .expect("config")
        .rooted_at(root)
}

fn providers() -> (ProviderSet, Arc<MockUploader>) {
    let uploader = Arc::new(MockUploader::new_success("youtube"));
    let set = ProviderSet {
        script: vec![Arc::new(MockScriptGenerator::new_success(
            "openai",
            sample_script("prophets", "patience"),
        )) as Arc<dyn ScriptGenerator>],
        audio: vec![Arc::new(MockSynthesizer::new_success("google_tts", 42.0)) as Arc<dyn SpeechSynthesizer>],
        footage: vec![Arc::new(MockFootageSource::new_success("pexels", 3)) as Arc<dyn FootageSource>],
        compose: vec![Arc::new(MockComposer::new_success("ffmpeg")) as Arc<dyn VideoComposer>],
        upload: vec![uploader.clone() as Arc<dyn Uploader>],
        trends: None,
        ideas: vec![Arc::new(MockIdeaGenerator::new_success("openai")) as Arc<dyn IdeaGenerator>],
    };
    (set, uploader)
}

fn request(topic: &str, theme: &str) -> ProductionRequest {
    ProductionRequestBuilder::default()
        .topic(topic.parse::<TopicSelection>().expect("topic"))
        .theme(Some(theme.to_string()))
        .build()
        .expect("request")
}

#[tokio::test]
async fn test_produce_publishes_and_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (set, uploader) = providers();
    let app = Reelwright::with_providers(config(dir.path(), ""), set)
        .await
        .expect("app");

    let record = app
        .produce(&request("prophets", "patience"), &CancellationToken::new())
        .await
        .expect("produce");

    assert_eq!(*record.state(), PipelineState::Uploaded);
    assert!(record.upload_id().is_some());
    assert_eq!(ExitStatus::for_record(&record), ExitStatus::Success);
    assert_eq!(ExitStatus::for_record(&record).code(), 0);
    assert_eq!(uploader.published_count(), 1);

    let youtube = app
        .quota_report()
        .await
        .into_iter()
        .find(|row| row.provider() == "youtube")
        .expect("youtube row");
    assert_eq!(*youtube.consumed(), 1);
    assert_eq!(*youtube.remaining(), 5);
    drop(app);

    // History and ledger survive a restart.
    let (set, _) = providers();
    let reopened = Reelwright::with_providers(config(dir.path(), ""), set)
        .await
        .expect("reopen");
    let history = reopened.history(10).await.expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id(), record.id());
    let youtube = reopened
        .quota_report()
        .await
        .into_iter()
        .find(|row| row.provider() == "youtube")
        .expect("youtube row");
    assert_eq!(*youtube.consumed(), 1);
}

#[tokio::test]
async fn test_zero_upload_quota_exits_with_quota_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (set, uploader) = providers();
    let app = Reelwright::with_providers(
        config(dir.path(), "[quota.youtube]\nperiod = \"daily\"\nlimit = 0\n"),
        set,
    )
    .await
    .expect("app");

    let record = app
        .produce(&request("prophets", "patience"), &CancellationToken::new())
        .await
        .expect("produce");

    assert_eq!(*record.state(), PipelineState::Composed);
    assert_eq!(record.failure_kind(), Some(FailureKind::QuotaExceeded));
    assert_eq!(ExitStatus::for_record(&record).code(), 2);
    assert_eq!(uploader.call_count(), 0);
}

#[tokio::test]
async fn test_trend_refresh_feeds_scheduled_batch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut set, _) = providers();
    set.trends = Some(Arc::new(MockTrendSource::new_success(
        "youtube_trends",
        vec!["Story of Yusuf".to_string(), "Night prayer".to_string()],
    )) as Arc<dyn TrendSource>);
    let app = Reelwright::with_providers(config(dir.path(), ""), set)
        .await
        .expect("app");

    let report = app.refresh_trends().await.expect("refresh");
    assert!(*report.live());
    assert_eq!(*report.added(), 2);
    assert!(dir.path().join("data").join("content_queue.json").exists());

    let batch = app.run_batch(1, &CancellationToken::new()).await.expect("batch");
    assert_eq!(batch.records()[0].theme(), "Story of Yusuf");
    assert_eq!(batch.records()[0].category().as_str(), "prophets");

    let left = app.queued_ideas().await.expect("queue");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].theme(), "Night prayer");
}

#[tokio::test]
async fn test_unknown_category_is_usage_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (set, _) = providers();
    let app = Reelwright::with_providers(config(dir.path(), ""), set)
        .await
        .expect("app");

    let err = app
        .produce(&request("astronomy", "stars"), &CancellationToken::new())
        .await
        .expect_err("unknown category");

    assert_eq!(ExitStatus::for_error(&err).code(), 3);
    assert!(app.history(10).await.expect("history").is_empty());
}

#[tokio::test]
async fn test_batch_respects_configured_ceiling() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (set, _) = providers();
    let app = Reelwright::with_providers(config(dir.path(), "[scheduler]\nmax_per_day = 1\n"), set)
        .await
        .expect("app");

    let batch = app
        .run_batch(3, &CancellationToken::new())
        .await
        .expect("batch");

    assert_eq!(batch.records().len(), 1);
    assert_eq!(batch.stopped(), &Some(StopReason::DailyCeiling { max: 1 }));
    assert_eq!(ExitStatus::for_batch(&batch), ExitStatus::Success);
}

#[tokio::test]
async fn test_dry_run_then_publish() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (set, uploader) = providers();
    let app = Reelwright::with_providers(config(dir.path(), ""), set)
        .await
        .expect("app");

    let dry = ProductionRequestBuilder::default()
        .topic(TopicSelection::Random)
        .upload_enabled(false)
        .build()
        .expect("request");
    let cancel = CancellationToken::new();
    let draft = app.produce(&dry, &cancel).await.expect("dry run");
    assert_eq!(*draft.state(), PipelineState::SkippedUpload);
    assert_eq!(uploader.call_count(), 0);

    let published = app.publish(draft.id(), &cancel).await.expect("publish");
    assert_eq!(*published.state(), PipelineState::Uploaded);
    assert_eq!(published.retry_of().as_ref(), Some(draft.id()));
    assert_eq!(uploader.published_count(), 1);
}

#[test]
fn test_exit_status_for_errors() {
    let usage: ReelwrightError = reelwright::ConfigError::new("bad").into();
    assert_eq!(ExitStatus::for_error(&usage), ExitStatus::Usage);

    let quota: ReelwrightError = StageError::quota_exceeded("youtube daily limit").into();
    assert_eq!(ExitStatus::for_error(&quota).code(), 2);

    let transient: ReelwrightError = StageError::transient("reset").into();
    assert_eq!(ExitStatus::for_error(&transient), ExitStatus::Failed);
}

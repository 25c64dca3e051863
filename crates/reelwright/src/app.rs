//! Wiring from configuration to a running pipeline.

use crate::ReelwrightConfig;
use derive_getters::Getters;
use reelwright_core::{
    Clock, ContentIdea, ProductionRecord, ProductionRequest, RecordId, SystemClock,
};
use reelwright_error::{ConfigError, ReelwrightResult};
use reelwright_history::{
    CheckpointStore, ContentQueue, HistoryStore, JsonlHistoryStore, ThemeSimilarityPolicy,
};
use reelwright_pipeline::{Orchestrator, OrchestratorBuilder, StageSet};
use reelwright_providers::ProviderSet;
use reelwright_quota::{Period, QuotaTracker};
use reelwright_scheduler::{BatchReport, RefreshReport, Scheduler, TrendRefresher};
use reelwright_stages::{
    AudioStage, ComposeStage, FootageStage, Pacer, ScriptStage, StageExecutor, UploadStage,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// One provider's line in the quota report.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize)]
pub struct QuotaRow {
    provider: String,
    period: Period,
    consumed: u64,
    limit: u64,
    remaining: u64,
}

/// A configured pipeline with its stores.
pub struct Reelwright {
    config: ReelwrightConfig,
    quota: Arc<QuotaTracker>,
    history: Arc<dyn HistoryStore>,
    orchestrator: Arc<Orchestrator>,
    scheduler: Scheduler,
    refresher: TrendRefresher,
}

impl Reelwright {
    /// Build providers from configuration and open the stores.
    ///
    /// # Errors
    ///
    /// Configuration errors for missing providers or API keys, storage errors
    /// for an unreadable quota ledger.
    #[instrument(skip(config))]
    pub async fn open(config: ReelwrightConfig) -> ReelwrightResult<Self> {
        let target_words =
            (f64::from(*config.content().length_seconds()) * ScriptStage::WORDS_PER_SECOND).round() as u32;
        let providers = config.providers().build(target_words)?;
        Self::with_providers(config, providers).await
    }

    /// Open the stores around already-built providers.
    pub async fn with_providers(
        config: ReelwrightConfig,
        providers: ProviderSet,
    ) -> ReelwrightResult<Self> {
        Self::with_clock(config, providers, Arc::new(SystemClock)).await
    }

    /// Like [`Reelwright::with_providers`] with an explicit time source.
    pub async fn with_clock(
        config: ReelwrightConfig,
        providers: ProviderSet,
        clock: Arc<dyn Clock>,
    ) -> ReelwrightResult<Self> {
        config.validate()?;
        let ProviderSet {
            script,
            audio,
            footage,
            compose,
            upload,
            trends,
            ideas,
        } = providers;

        let quota = Arc::new(
            QuotaTracker::open(
                config.quota_store().path(),
                config.quota().clone(),
                clock.clone(),
            )
            .await?,
        );
        let executor = StageExecutor::new(
            quota.clone(),
            config.retry().clone(),
            Pacer::new(config.pacing().clone()),
        );

        let pipeline = config.pipeline();
        let stages = StageSet {
            script: ScriptStage::new(script, *config.content().length_seconds()),
            audio: AudioStage::new(audio, pipeline.work_dir()),
            footage: FootageStage::new(
                footage,
                Arc::new(config.safety().clone()),
                *pipeline.safety_mode(),
                *pipeline.min_clip_secs(),
                *pipeline.max_clips(),
            ),
            compose: ComposeStage::new(compose, pipeline.output_dir()),
            upload: UploadStage::new(
                upload,
                config.upload().clone(),
                *pipeline.upload_units(),
            ),
        };

        let history: Arc<dyn HistoryStore> =
            Arc::new(JsonlHistoryStore::new(config.history().path()));
        let orchestrator = OrchestratorBuilder::default()
            .content(config.content().clone())
            .pipeline(pipeline.clone())
            .executor(executor)
            .stages(stages)
            .history(history.clone())
            .checkpoints(CheckpointStore::new(pipeline.checkpoint_dir()))
            .duplicates(Arc::new(ThemeSimilarityPolicy::new(
                *pipeline.similarity_threshold(),
            )))
            .clock(clock.clone())
            .build()
            .map_err(|e| ConfigError::new(format!("Failed to assemble pipeline: {}", e)))?;
        let orchestrator = Arc::new(orchestrator);

        let queue = Arc::new(ContentQueue::new(config.trends().queue_path()));
        let refresher =
            TrendRefresher::new(orchestrator.clone(), queue.clone(), config.trends().clone())
                .with_source(trends)
                .with_generators(ideas);
        let scheduler = Scheduler::new(orchestrator.clone(), config.scheduler().clone())
            .with_queue(queue)
            .with_clock(clock);

        debug!(history = %config.history().path().display(), "Pipeline ready");
        Ok(Self {
            config,
            quota,
            history,
            orchestrator,
            scheduler,
            refresher,
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &ReelwrightConfig {
        &self.config
    }

    /// The production state machine.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run one production.
    pub async fn produce(
        &self,
        request: &ProductionRequest,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<ProductionRecord> {
        self.orchestrator.produce(request, cancel).await
    }

    /// Continue an interrupted production from its checkpoint.
    pub async fn resume(
        &self,
        id: &RecordId,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<ProductionRecord> {
        self.orchestrator.resume(id, cancel).await
    }

    /// Upload a finished dry run.
    pub async fn publish(
        &self,
        id: &RecordId,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<ProductionRecord> {
        self.orchestrator.publish(id, cancel).await
    }

    /// Run up to `count` productions now.
    pub async fn run_batch(
        &self,
        count: usize,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<BatchReport> {
        self.scheduler.run_batch(count, cancel).await
    }

    /// Run batches on the configured schedule until cancelled.
    pub async fn run_periodic(
        &self,
        count: usize,
        cancel: &CancellationToken,
    ) -> ReelwrightResult<()> {
        info!(schedule = ?self.config.scheduler().schedule(), count, "Starting periodic scheduler");
        self.scheduler
            .run_periodic(self.config.scheduler().schedule(), count, cancel)
            .await
    }

    /// Queue new ideas drawn from current trends.
    pub async fn refresh_trends(&self) -> ReelwrightResult<RefreshReport> {
        self.refresher.refresh().await
    }

    /// Ideas waiting in the content queue, oldest first.
    pub async fn queued_ideas(&self) -> ReelwrightResult<Vec<ContentIdea>> {
        self.refresher.queue().ideas().await
    }

    /// Most recent records, newest first.
    pub async fn history(&self, limit: usize) -> ReelwrightResult<Vec<ProductionRecord>> {
        self.history.recent_records(limit).await
    }

    /// Consumption per metered provider.
    pub async fn quota_report(&self) -> Vec<QuotaRow> {
        self.quota
            .snapshot()
            .await
            .iter()
            .map(|(provider, entry)| QuotaRow {
                provider: provider.clone(),
                period: *entry.period(),
                consumed: *entry.consumed(),
                limit: *entry.limit(),
                remaining: entry.remaining(),
            })
            .collect()
    }
}

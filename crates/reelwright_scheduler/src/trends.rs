//! Trend refresh: popular titles in, queued content ideas out.

use derive_getters::Getters;
use reelwright_core::ContentIdea;
use reelwright_error::{ReelwrightResult, StageError};
use reelwright_history::ContentQueue;
use reelwright_pipeline::Orchestrator;
use reelwright_stages::{IdeaGenerator, TrendSource};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Trend refresh settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct TrendsConfig {
    /// Search queries sent to the trend source.
    #[serde(default = "default_queries")]
    queries: Vec<String>,
    /// Topics used when the source is missing, fails or finds nothing.
    #[serde(default = "default_fallback")]
    fallback: Vec<String>,
    /// Ideas requested per refresh.
    #[serde(default = "default_ideas_per_refresh")]
    ideas_per_refresh: usize,
    /// Queue file.
    #[serde(default = "default_queue_path")]
    queue_path: PathBuf,
}

fn default_queries() -> Vec<String> {
    ["قصص إسلامية مؤثرة", "محاضرات دينية مؤثرة", "قصة نبي", "تفسير آية مؤثرة"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_fallback() -> Vec<String> {
    ["Patience in Islam", "Story of Prophet Yusuf", "Importance of Prayer"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_ideas_per_refresh() -> usize {
    3
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("data/content_queue.json")
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            queries: default_queries(),
            fallback: default_fallback(),
            ideas_per_refresh: default_ideas_per_refresh(),
            queue_path: default_queue_path(),
        }
    }
}

impl TrendsConfig {
    /// Settings from explicit values.
    pub fn new(
        queries: Vec<String>,
        fallback: Vec<String>,
        ideas_per_refresh: usize,
        queue_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            queries,
            fallback,
            ideas_per_refresh,
            queue_path: queue_path.into(),
        }
    }

    /// Resolve a relative queue path against `root`.
    pub fn rooted_at(mut self, root: impl AsRef<Path>) -> Self {
        self.queue_path = root.as_ref().join(&self.queue_path);
        self
    }
}

/// Outcome of one refresh.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize)]
pub struct RefreshReport {
    /// Trends handed to the idea generator.
    trends: usize,
    /// Whether those trends came from the live source.
    live: bool,
    /// New ideas queued.
    added: usize,
    /// Ideas waiting after the refresh.
    queued: usize,
}

/// Fetches trends, asks a model for ideas and queues them for the scheduler.
///
/// Trend fetching never fails a refresh: without a source, or when it errors
/// or finds nothing, the configured fallback topics are used instead. Idea
/// generators are tried in order until one succeeds. Ideas for categories
/// the pipeline does not produce are dropped.
pub struct TrendRefresher {
    orchestrator: Arc<Orchestrator>,
    queue: Arc<ContentQueue>,
    config: TrendsConfig,
    source: Option<Arc<dyn TrendSource>>,
    generators: Vec<Arc<dyn IdeaGenerator>>,
}

impl TrendRefresher {
    /// Refresher feeding `queue` with ideas for `orchestrator`'s categories.
    pub fn new(orchestrator: Arc<Orchestrator>, queue: Arc<ContentQueue>, config: TrendsConfig) -> Self {
        Self {
            orchestrator,
            queue,
            config,
            source: None,
            generators: Vec::new(),
        }
    }

    /// Where live trends come from.
    pub fn with_source(mut self, source: Option<Arc<dyn TrendSource>>) -> Self {
        self.source = source;
        self
    }

    /// Idea generators in fallback order.
    pub fn with_generators(mut self, generators: Vec<Arc<dyn IdeaGenerator>>) -> Self {
        self.generators = generators;
        self
    }

    /// Queue being fed.
    pub fn queue(&self) -> &Arc<ContentQueue> {
        &self.queue
    }

    async fn fetch_trends(&self) -> (Vec<String>, bool) {
        if let Some(source) = &self.source {
            let run = self
                .orchestrator
                .executor()
                .retry(source.name(), || source.trending_titles(&self.config.queries))
                .await;
            match run.result {
                Ok(titles) if !titles.is_empty() => {
                    info!(provider = source.name(), trends = titles.len(), "Fetched live trends");
                    return (titles, true);
                }
                Ok(_) => warn!(provider = source.name(), "Trend source found nothing"),
                Err(e) => warn!(provider = source.name(), error = %e, "Trend fetch failed"),
            }
        }
        warn!("No live trends, using fallback topics");
        (self.config.fallback.clone(), false)
    }

    /// Queue new ideas drawn from current trends.
    ///
    /// # Errors
    ///
    /// Returns the last generator error when every idea generator fails, or
    /// a storage error when the queue cannot be written.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> ReelwrightResult<RefreshReport> {
        let (trends, live) = self.fetch_trends().await;
        if trends.is_empty() {
            warn!("No trends and no fallback topics, nothing to queue");
            return Ok(RefreshReport {
                trends: 0,
                live,
                added: 0,
                queued: self.queue.ideas().await?.len(),
            });
        }

        let categories = self.orchestrator.content().categories();
        let count = self.config.ideas_per_refresh;
        let executor = self.orchestrator.executor();

        let mut ideas: Option<Vec<ContentIdea>> = None;
        let mut last_error = None;
        for generator in &self.generators {
            let run = executor
                .retry(generator.name(), || generator.generate_ideas(&trends, &categories, count))
                .await;
            match run.result {
                Ok(billed) => {
                    debug!(provider = generator.name(), cost = billed.cost, ideas = billed.value.len(), "Ideas generated");
                    ideas = Some(billed.value);
                    break;
                }
                Err(e) => {
                    warn!(provider = generator.name(), error = %e, "Idea generation failed");
                    last_error = Some(e);
                }
            }
        }
        let Some(ideas) = ideas else {
            return Err(last_error
                .unwrap_or_else(|| StageError::terminal("no idea generator configured"))
                .into());
        };

        let (usable, rejected): (Vec<_>, Vec<_>) = ideas
            .into_iter()
            .partition(|idea| categories.contains(idea.topic()));
        for idea in &rejected {
            warn!(topic = %idea.topic(), theme = %idea.theme(), "Dropping idea for an unconfigured category");
        }

        let added = self.queue.extend(usable).await?;
        let queued = self.queue.ideas().await?.len();
        info!(trends = trends.len(), live, added, queued, "Content queue refreshed");
        Ok(RefreshReport {
            trends: trends.len(),
            live,
            added,
            queued,
        })
    }
}

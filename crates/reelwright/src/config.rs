//! Layered configuration.
//!
//! Sources, later ones overriding earlier ones:
//! 1. Bundled defaults (`reelwright.toml` shipped with the crate)
//! 2. `~/.config/reelwright/reelwright.toml`
//! 3. `./reelwright.toml`
//! 4. A file named on the command line
//! 5. `REELWRIGHT_<SECTION>__<KEY>` environment variables
//!
//! Tables merge key by key; provider lists are replaced as a whole.

use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use reelwright_core::UploadTemplate;
use reelwright_error::{ConfigError, ReelwrightError, ReelwrightResult};
use reelwright_pipeline::{ContentConfig, PipelineConfig};
use reelwright_providers::ProvidersConfig;
use reelwright_quota::QuotaLimit;
use reelwright_scheduler::{SchedulerConfig, TrendsConfig};
use reelwright_stages::{KeywordSafetyPolicy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Bundled default configuration.
pub const DEFAULT_CONFIG: &str = include_str!("../reelwright.toml");

/// History file location.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// JSON-lines history file.
    #[serde(default = "default_history_path")]
    path: PathBuf,
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/history.jsonl")
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
        }
    }
}

/// Quota ledger location.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct QuotaStoreConfig {
    /// JSON ledger file.
    #[serde(default = "default_quota_path")]
    path: PathBuf,
}

fn default_quota_path() -> PathBuf {
    PathBuf::from("data/quota.json")
}

impl Default for QuotaStoreConfig {
    fn default() -> Self {
        Self {
            path: default_quota_path(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    level: String,
    /// Emit JSON lines instead of plain text.
    #[serde(default)]
    json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Complete Reelwright configuration.
///
/// Loaded once at startup and handed to every component that needs it.
///
/// # Example
///
/// ```no_run
/// use reelwright::ReelwrightConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ReelwrightConfig::load(None)?;
/// println!("{} videos per day at most", config.scheduler().max_per_day());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Getters, Serialize, Deserialize)]
pub struct ReelwrightConfig {
    /// Topics, themes and narration length.
    #[serde(default)]
    content: ContentConfig,
    /// Directories, duplicate detection and stage settings.
    #[serde(default)]
    pipeline: PipelineConfig,
    /// Retry attempts and backoff.
    #[serde(default)]
    retry: RetryPolicy,
    /// Budget per provider.
    #[serde(default)]
    quota: BTreeMap<String, QuotaLimit>,
    /// Requests per minute per provider.
    #[serde(default)]
    pacing: BTreeMap<String, u32>,
    /// History file.
    #[serde(default)]
    history: HistoryConfig,
    /// Quota ledger file.
    #[serde(default)]
    quota_store: QuotaStoreConfig,
    /// Daily ceiling and periodic schedule.
    #[serde(default)]
    scheduler: SchedulerConfig,
    /// Trend refresh and the content queue.
    #[serde(default)]
    trends: TrendsConfig,
    /// Providers per stage, in fallback order.
    #[serde(default)]
    providers: ProvidersConfig,
    /// Upload metadata templates.
    #[serde(default)]
    upload: UploadTemplate,
    /// Footage query policy.
    #[serde(default)]
    safety: KeywordSafetyPolicy,
    /// Log output.
    #[serde(default)]
    logging: LoggingConfig,
}

fn build_error(e: config::ConfigError) -> ReelwrightError {
    ConfigError::new(format!("Failed to build configuration: {}", e)).into()
}

fn parse_error(e: config::ConfigError) -> ReelwrightError {
    ConfigError::new(format!("Failed to parse configuration: {}", e)).into()
}

impl ReelwrightConfig {
    /// Load every layer, with `explicit` (from `--config`) above the
    /// discovered files, then validate.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a file is unreadable, a value has
    /// the wrong shape, or validation fails. A missing `explicit` file is an
    /// error; missing discovered files are skipped.
    #[instrument]
    pub fn load(explicit: Option<&Path>) -> ReelwrightResult<Self> {
        debug!("Loading configuration");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(config_dir) = dirs::config_dir() {
            let user = config_dir.join("reelwright").join("reelwright.toml");
            builder = builder.add_source(File::from(user).required(false));
        }
        builder = builder.add_source(File::with_name("reelwright").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("REELWRIGHT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder
            .build()
            .map_err(build_error)?
            .try_deserialize()
            .map_err(parse_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Bundled defaults overlaid with a single TOML document, without
    /// consulting the filesystem or environment.
    ///
    /// # Errors
    ///
    /// Same as [`ReelwrightConfig::load`].
    pub fn from_toml_str(overrides: &str) -> ReelwrightResult<Self> {
        let config: Self = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(overrides, FileFormat::Toml))
            .build()
            .map_err(build_error)?
            .try_deserialize()
            .map_err(parse_error)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content.topics().is_empty() {
            return Err(ConfigError::for_setting("content.topics", "must list at least one category"));
        }
        if self.content.themes().is_empty() {
            return Err(ConfigError::for_setting("content.themes", "must list at least one theme"));
        }
        if *self.content.length_seconds() == 0 {
            return Err(ConfigError::for_setting("content.length_seconds", "must be positive"));
        }
        let threshold = *self.pipeline.similarity_threshold();
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::for_setting(
                "pipeline.similarity_threshold",
                format!("must be between 0 and 1, got {}", threshold),
            ));
        }
        if *self.pipeline.max_clips() == 0 {
            return Err(ConfigError::for_setting("pipeline.max_clips", "must be at least 1"));
        }
        if *self.retry.max_attempts() == 0 {
            return Err(ConfigError::for_setting("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms() > self.retry.max_delay_ms() {
            return Err(ConfigError::for_setting(
                "retry.base_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if *self.trends.ideas_per_refresh() == 0 {
            return Err(ConfigError::for_setting("trends.ideas_per_refresh", "must be at least 1"));
        }
        self.scheduler.validate()
    }

    /// Replace the content section.
    pub fn with_content(mut self, content: ContentConfig) -> Self {
        self.content = content;
        self
    }

    /// Replace the pipeline section.
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the provider budgets.
    pub fn with_quota(mut self, quota: BTreeMap<String, QuotaLimit>) -> Self {
        self.quota = quota;
        self
    }

    /// Replace the scheduler section.
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Put history, ledger, queue and pipeline paths under `root`.
    pub fn rooted_at(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.pipeline = self.pipeline.rooted_at(root);
        self.trends = self.trends.rooted_at(root);
        self.history.path = root.join(&self.history.path);
        self.quota_store.path = root.join(&self.quota_store.path);
        self
    }
}

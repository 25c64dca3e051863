//! Provider selection from configuration.
//!
//! Each stage lists its providers in fallback order as tagged tables:
//!
//! ```toml
//! [[providers.script]]
//! kind = "openai"
//! model = "gpt-4o-mini"
//!
//! [[providers.script]]
//! kind = "anthropic"
//! model = "claude-3-haiku-20240307"
//! ```

use crate::http::api_key_from_env;
use crate::{
    AccessTokenProvider, AnthropicScriptGenerator, EnvTokenProvider, FfmpegComposer,
    GoogleTtsSynthesizer, LocalFootageSource, OpenAiScriptGenerator, PexelsFootageSource,
    RenderSettings, StaticScriptGenerator, StaticTokenProvider, VoiceSettings, YouTubeTrendSource,
    YouTubeUploader,
};
use derive_getters::Getters;
use reelwright_error::ConfigError;
use reelwright_stages::{
    FootageSource, IdeaGenerator, ScriptGenerator, SpeechSynthesizer, TrendSource, Uploader,
    VideoComposer,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Script generator choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptProviderConfig {
    /// OpenAI chat completions.
    #[serde(rename = "openai")]
    OpenAi {
        /// Quota and log name.
        #[serde(default)]
        name: Option<String>,
        /// Model id.
        model: String,
        /// Variable holding the API key.
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        /// Alternative endpoint.
        #[serde(default)]
        base_url: Option<String>,
    },
    /// Anthropic messages.
    Anthropic {
        /// Quota and log name.
        #[serde(default)]
        name: Option<String>,
        /// Model id.
        model: String,
        /// Variable holding the API key.
        #[serde(default = "default_anthropic_key_env")]
        api_key_env: String,
        /// Alternative endpoint.
        #[serde(default)]
        base_url: Option<String>,
    },
    /// Fixed text, for offline rehearsals.
    Static {
        /// Quota and log name.
        #[serde(default)]
        name: Option<String>,
        /// Title; `{theme}` is substituted.
        title: String,
        /// Story; `{theme}` and `{category}` are substituted.
        text: String,
        /// Footage keywords.
        #[serde(default)]
        visual_keywords: Vec<String>,
    },
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

/// Speech synthesizer choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioProviderConfig {
    /// Google Cloud Text-to-Speech.
    GoogleTts {
        /// Quota and log name.
        #[serde(default)]
        name: Option<String>,
        /// Variable holding the API key.
        #[serde(default = "default_google_key_env")]
        api_key_env: String,
        /// Voice settings.
        #[serde(flatten)]
        voice: VoiceSettings,
    },
}

fn default_google_key_env() -> String {
    "GOOGLE_TTS_API_KEY".to_string()
}

/// Footage source choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FootageProviderConfig {
    /// Pexels video search.
    Pexels {
        /// Quota and log name.
        #[serde(default)]
        name: Option<String>,
        /// Variable holding the API key.
        #[serde(default = "default_pexels_key_env")]
        api_key_env: String,
        /// Where clips are downloaded.
        #[serde(default = "default_footage_dir")]
        download_dir: PathBuf,
    },
    /// A local directory of clips.
    Local {
        /// Quota and log name.
        #[serde(default)]
        name: Option<String>,
        /// Directory of `.mp4` files.
        dir: PathBuf,
        /// Assumed clip length in seconds.
        #[serde(default = "default_clip_secs")]
        clip_secs: f64,
    },
}

fn default_pexels_key_env() -> String {
    "PEXELS_API_KEY".to_string()
}

fn default_footage_dir() -> PathBuf {
    PathBuf::from("assets/footage")
}

fn default_clip_secs() -> f64 {
    10.0
}

/// Composer choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComposeProviderConfig {
    /// The `ffmpeg` binary.
    Ffmpeg {
        /// Log name.
        #[serde(default)]
        name: Option<String>,
        /// Binary to run.
        #[serde(default = "default_ffmpeg")]
        binary: String,
        /// Render settings.
        #[serde(flatten)]
        settings: RenderSettings,
    },
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

/// Where upload credentials come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum TokenSourceConfig {
    /// Read from an environment variable at each call.
    Env {
        /// Variable name.
        #[serde(default = "default_youtube_token_env")]
        var: String,
    },
    /// Fixed token, for tests and short-lived runs.
    Static {
        /// The token.
        token: String,
    },
}

fn default_youtube_token_env() -> String {
    "YOUTUBE_ACCESS_TOKEN".to_string()
}

impl Default for TokenSourceConfig {
    fn default() -> Self {
        Self::Env {
            var: default_youtube_token_env(),
        }
    }
}

/// Uploader choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadProviderConfig {
    /// YouTube Data API.
    #[serde(rename = "youtube")]
    YouTube {
        /// Quota and log name.
        #[serde(default)]
        name: Option<String>,
        /// Credential source.
        #[serde(default)]
        token: TokenSourceConfig,
    },
}

/// Trend source choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrendProviderConfig {
    /// YouTube search ordered by views.
    #[serde(rename = "youtube")]
    YouTube {
        /// Log name.
        #[serde(default)]
        name: Option<String>,
        /// Variable holding the API key.
        #[serde(default = "default_youtube_key_env")]
        api_key_env: String,
        /// Titles per search query.
        #[serde(default = "default_trend_results")]
        max_results: u32,
        /// How far back a video may have been published.
        #[serde(default = "default_trend_window_days")]
        window_days: u32,
    },
}

fn default_youtube_key_env() -> String {
    "YOUTUBE_API_KEY".to_string()
}

fn default_trend_results() -> u32 {
    5
}

fn default_trend_window_days() -> u32 {
    7
}

/// Providers per stage, in fallback order.
#[derive(Debug, Clone, Default, PartialEq, Getters, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Script generators.
    #[serde(default)]
    script: Vec<ScriptProviderConfig>,
    /// Speech synthesizers.
    #[serde(default)]
    audio: Vec<AudioProviderConfig>,
    /// Footage sources.
    #[serde(default)]
    footage: Vec<FootageProviderConfig>,
    /// Composers.
    #[serde(default)]
    compose: Vec<ComposeProviderConfig>,
    /// Uploaders.
    #[serde(default)]
    upload: Vec<UploadProviderConfig>,
    /// Where trending titles come from; none means fallback topics only.
    #[serde(default)]
    trends: Option<TrendProviderConfig>,
}

/// Collaborators resolved from [`ProvidersConfig`].
#[derive(Debug, Clone, Default)]
pub struct ProviderSet {
    /// Script generators in fallback order.
    pub script: Vec<Arc<dyn ScriptGenerator>>,
    /// Speech synthesizers in fallback order.
    pub audio: Vec<Arc<dyn SpeechSynthesizer>>,
    /// Footage sources in fallback order.
    pub footage: Vec<Arc<dyn FootageSource>>,
    /// Composers in fallback order.
    pub compose: Vec<Arc<dyn VideoComposer>>,
    /// Uploaders in fallback order.
    pub upload: Vec<Arc<dyn Uploader>>,
    /// Trending title source, when one is configured and has credentials.
    pub trends: Option<Arc<dyn TrendSource>>,
    /// Idea generators, the script generators in the same order.
    pub ideas: Vec<Arc<dyn IdeaGenerator>>,
}

fn named(name: &Option<String>, default: &str) -> String {
    name.clone().unwrap_or_else(|| default.to_string())
}

impl ProvidersConfig {
    /// Instantiate every configured provider.
    ///
    /// `target_words` sizes script prompts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a stage has no provider or a required
    /// API key variable is unset. An upload list may be empty when uploads
    /// are never requested; the orchestrator then reports a terminal error
    /// on upload.
    pub fn build(&self, target_words: u32) -> Result<ProviderSet, ConfigError> {
        let mut set = ProviderSet::default();

        for provider in &self.script {
            let (generator, ideas): (Arc<dyn ScriptGenerator>, Arc<dyn IdeaGenerator>) = match provider {
                ScriptProviderConfig::OpenAi {
                    name,
                    model,
                    api_key_env,
                    base_url,
                } => {
                    let mut g = OpenAiScriptGenerator::new(
                        named(name, "openai"),
                        api_key_from_env(api_key_env)?,
                        model,
                        target_words,
                    );
                    if let Some(url) = base_url {
                        g = g.with_base_url(url);
                    }
                    let g = Arc::new(g);
                    (g.clone(), g)
                }
                ScriptProviderConfig::Anthropic {
                    name,
                    model,
                    api_key_env,
                    base_url,
                } => {
                    let mut g = AnthropicScriptGenerator::new(
                        named(name, "anthropic"),
                        api_key_from_env(api_key_env)?,
                        model,
                        target_words,
                    );
                    if let Some(url) = base_url {
                        g = g.with_base_url(url);
                    }
                    let g = Arc::new(g);
                    (g.clone(), g)
                }
                ScriptProviderConfig::Static {
                    name,
                    title,
                    text,
                    visual_keywords,
                } => {
                    let g = Arc::new(StaticScriptGenerator::new(
                        named(name, "static"),
                        title,
                        text,
                        visual_keywords.clone(),
                    ));
                    (g.clone(), g)
                }
            };
            set.script.push(generator);
            set.ideas.push(ideas);
        }

        for provider in &self.audio {
            let synthesizer: Arc<dyn SpeechSynthesizer> = match provider {
                AudioProviderConfig::GoogleTts {
                    name,
                    api_key_env,
                    voice,
                } => Arc::new(GoogleTtsSynthesizer::new(
                    named(name, "google_tts"),
                    api_key_from_env(api_key_env)?,
                    voice.clone(),
                )),
            };
            set.audio.push(synthesizer);
        }

        for provider in &self.footage {
            let source: Arc<dyn FootageSource> = match provider {
                FootageProviderConfig::Pexels {
                    name,
                    api_key_env,
                    download_dir,
                } => Arc::new(PexelsFootageSource::new(
                    named(name, "pexels"),
                    api_key_from_env(api_key_env)?,
                    download_dir,
                )),
                FootageProviderConfig::Local {
                    name,
                    dir,
                    clip_secs,
                } => Arc::new(LocalFootageSource::new(named(name, "local_footage"), dir, *clip_secs)),
            };
            set.footage.push(source);
        }

        for provider in &self.compose {
            let composer: Arc<dyn VideoComposer> = match provider {
                ComposeProviderConfig::Ffmpeg {
                    name,
                    binary,
                    settings,
                } => Arc::new(FfmpegComposer::new(named(name, "ffmpeg"), binary, settings.clone())),
            };
            set.compose.push(composer);
        }

        for provider in &self.upload {
            let uploader: Arc<dyn Uploader> = match provider {
                UploadProviderConfig::YouTube { name, token } => {
                    let tokens: Arc<dyn AccessTokenProvider> = match token {
                        TokenSourceConfig::Env { var } => Arc::new(EnvTokenProvider::new(var)),
                        TokenSourceConfig::Static { token } => Arc::new(StaticTokenProvider::new(token)),
                    };
                    Arc::new(YouTubeUploader::new(named(name, "youtube"), tokens))
                }
            };
            set.upload.push(uploader);
        }

        if let Some(TrendProviderConfig::YouTube {
            name,
            api_key_env,
            max_results,
            window_days,
        }) = &self.trends
        {
            // Trends are optional: without a key the refresh uses fallback topics.
            match api_key_from_env(api_key_env) {
                Ok(key) => {
                    set.trends = Some(Arc::new(YouTubeTrendSource::new(
                        named(name, "youtube_trends"),
                        key,
                        *max_results,
                        *window_days,
                    )));
                }
                Err(e) => warn!(error = %e, "Trend source disabled"),
            }
        }

        for (stage, empty) in [
            ("script", set.script.is_empty()),
            ("audio", set.audio.is_empty()),
            ("footage", set.footage.is_empty()),
            ("compose", set.compose.is_empty()),
        ] {
            if empty {
                return Err(ConfigError::for_setting(format!("providers.{}", stage), "lists no provider"));
            }
        }
        debug!(
            script = set.script.len(),
            audio = set.audio.len(),
            footage = set.footage.len(),
            compose = set.compose.len(),
            upload = set.upload.len(),
            trends = set.trends.is_some(),
            "Providers resolved"
        );
        Ok(set)
    }
}

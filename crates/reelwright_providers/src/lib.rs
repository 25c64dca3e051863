//! Concrete collaborators for the Reelwright pipeline.
//!
//! Thin adapters over provider HTTP APIs and the `ffmpeg` binary. Every
//! adapter reports failures through [`classify_status`] /
//! [`classify_transport`], so the rest of the pipeline only ever sees
//! transient, terminal or quota errors.
//!
//! | Stage | Adapters |
//! |---|---|
//! | script | [`OpenAiScriptGenerator`], [`AnthropicScriptGenerator`], [`StaticScriptGenerator`] |
//! | audio | [`GoogleTtsSynthesizer`] |
//! | footage | [`PexelsFootageSource`], [`LocalFootageSource`] |
//! | compose | [`FfmpegComposer`] |
//! | upload | [`YouTubeUploader`] |
//! | trends | [`YouTubeTrendSource`] |
//!
//! The script generators double as idea generators for the trend refresh.
//! [`ProvidersConfig::build`] turns configuration into trait objects.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod compose;
mod factory;
mod footage;
mod http;
mod script;
mod trends;
mod tts;
mod youtube;

pub use compose::{FfmpegComposer, RenderSettings, ffmpeg_args, subtitle_srt};
pub use factory::{
    AudioProviderConfig, ComposeProviderConfig, FootageProviderConfig, ProviderSet,
    ProvidersConfig, ScriptProviderConfig, TokenSourceConfig, TrendProviderConfig,
    UploadProviderConfig,
};
pub use footage::{
    ALLOWED_DOWNLOAD_HOSTS, LocalFootageSource, PexelsFootageSource, is_allowed_download,
};
pub use http::{classify_status, classify_transport};
pub use script::{
    AnthropicScriptGenerator, OpenAiScriptGenerator, ParsedStory, StaticScriptGenerator,
    parse_story, story_prompts, topic_brief,
};
pub use trends::{YouTubeTrendSource, idea_prompts, parse_ideas};
pub use tts::{GoogleTtsSynthesizer, VoiceSettings, estimate_narration_secs};
pub use youtube::{
    AccessTokenProvider, EnvTokenProvider, StaticTokenProvider, YouTubeUploader, upload_tags,
};

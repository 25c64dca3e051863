//! Google Cloud Text-to-Speech adapter.

use crate::http::{classify_transport, decode_json};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use derive_getters::Getters;
use reelwright_core::{AudioHandle, Billed};
use reelwright_error::StageError;
use reelwright_stages::SpeechSynthesizer;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

const GOOGLE_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Arabic narration runs at about this many characters per second at rate 1.0.
const CHARS_PER_SECOND: f64 = 16.0;

/// Estimated narration length; the API does not report duration.
///
/// # Examples
///
/// ```
/// use reelwright_providers::estimate_narration_secs;
///
/// assert_eq!(estimate_narration_secs(160, 1.0), 10.0);
/// assert_eq!(estimate_narration_secs(160, 0.5), 20.0);
/// ```
pub fn estimate_narration_secs(characters: usize, speaking_rate: f64) -> f64 {
    let rate = if speaking_rate > 0.0 { speaking_rate } else { 1.0 };
    characters as f64 / (CHARS_PER_SECOND * rate)
}

/// Voice settings.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// BCP-47 language code.
    #[serde(default = "default_language_code")]
    language_code: String,
    /// Voice name, e.g. `ar-XA-Wavenet-B`.
    #[serde(default = "default_voice_name")]
    voice_name: String,
    /// 0.25 to 4.0.
    #[serde(default = "default_speaking_rate")]
    speaking_rate: f64,
    /// Semitones, -20.0 to 20.0.
    #[serde(default)]
    pitch: f64,
}

fn default_language_code() -> String {
    "ar-XA".to_string()
}

fn default_voice_name() -> String {
    "ar-XA-Wavenet-B".to_string()
}

fn default_speaking_rate() -> f64 {
    0.9
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language_code: default_language_code(),
            voice_name: default_voice_name(),
            speaking_rate: default_speaking_rate(),
            pitch: 0.0,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f64,
    pitch: f64,
    effects_profile_id: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: AudioConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

/// Google TTS `text:synthesize`, billed per input character.
#[derive(Debug, Clone)]
pub struct GoogleTtsSynthesizer {
    client: Client,
    name: String,
    api_key: String,
    base_url: String,
    voice: VoiceSettings,
}

impl GoogleTtsSynthesizer {
    /// Creates a new synthesizer.
    pub fn new(name: impl Into<String>, api_key: impl Into<String>, voice: VoiceSettings) -> Self {
        Self {
            client: Client::new(),
            name: name.into(),
            api_key: api_key.into(),
            base_url: GOOGLE_TTS_URL.to_string(),
            voice,
        }
    }

    /// Point at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTtsSynthesizer {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, text), fields(provider = %self.name, chars = text.chars().count()))]
    async fn synthesize(&self, text: &str, output: &Path) -> Result<Billed<AudioHandle>, StageError> {
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.voice.language_code,
                name: &self.voice.voice_name,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: self.voice.speaking_rate,
                pitch: self.voice.pitch,
                effects_profile_id: vec!["small-bluetooth-speaker-class-device"],
            },
        };

        let response = self
            .client
            .post(&self.base_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport(&self.name, &e))?;
        let body: SynthesizeResponse = decode_json(&self.name, response).await?;

        let audio = STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| StageError::terminal(format!("{} returned undecodable audio: {}", self.name, e)))?;
        if audio.is_empty() {
            return Err(StageError::terminal(format!("{} returned no audio", self.name)));
        }
        tokio::fs::write(output, &audio)
            .await
            .map_err(|e| StageError::terminal(format!("{}: {}", output.display(), e)))?;

        let characters = text.chars().count();
        let duration = estimate_narration_secs(characters, self.voice.speaking_rate);
        debug!(bytes = audio.len(), duration, "Narration written");
        Ok(Billed::new(AudioHandle::new(output, duration), characters as u64))
    }
}
